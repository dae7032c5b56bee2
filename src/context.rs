use crate::error::{PositionError, Result};
use crate::utils::{
    first_of_previous_month, last_day_of_month, parse_target_month, quarter_of_month, short_year,
};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Immutable facts about the reporting run, derived once from the target month.
///
/// The long-age column name lives here as well: it depends on the run year and
/// may be refined from the manual-adjustment source, but it is settled before
/// any derivation starts and every component reads it from this value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeContext {
    /// Last day of the target month; "as of" date for elapsed-day counts.
    pub ref_date: NaiveDate,
    pub current_year: i32,
    pub current_month: u32,
    pub current_quarter: u32,
    /// `yymm`, e.g. `2510`.
    pub current_month_str: String,
    /// `yymmA`, written into the `Period` column of the position frame.
    pub current_period: String,
    /// `YYYY-MM`, written into the lead-time bucket extracts.
    pub current_period_tm: String,
    pub long_age_column: String,
}

impl RuntimeContext {
    pub fn for_month(month: NaiveDate) -> Result<Self> {
        let year = month.year();
        let month_no = month.month();
        let ref_date = last_day_of_month(year, month_no).ok_or_else(|| {
            PositionError::InvalidTargetMonth(month.format("%Y-%m").to_string())
        })?;
        let current_month_str = format!("{:02}{:02}", short_year(year), month_no);

        Ok(Self {
            ref_date,
            current_year: year,
            current_month: month_no,
            current_quarter: quarter_of_month(month_no),
            current_period: format!("{}A", current_month_str),
            current_period_tm: format!("{:04}-{:02}", year, month_no),
            current_month_str,
            long_age_column: Self::default_long_age_column(year),
        })
    }

    /// Resolves the reporting month from configuration. Without an explicit
    /// target, the month before `today` is reported.
    pub fn from_target_month(target_month: Option<&str>, today: NaiveDate) -> Result<Self> {
        let month = match target_month.map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => parse_target_month(text)?,
            None => first_of_previous_month(today).ok_or_else(|| {
                PositionError::InvalidTargetMonth(today.format("%Y-%m-%d").to_string())
            })?,
        };
        Self::for_month(month)
    }

    pub fn with_long_age_column(mut self, column: impl Into<String>) -> Self {
        self.long_age_column = column.into();
        self
    }

    /// `"yy long aged"` for the year before the run year.
    pub fn default_long_age_column(current_year: i32) -> String {
        format!("{:02} long aged", short_year(current_year - 1))
    }

    /// Cell value that marks a contract as long-aged in the long-age column.
    pub fn long_age_flag(&self) -> String {
        format!("Y{}", self.long_age_column)
    }

    /// Monthly balance history columns: last December, then every month of the
    /// run year, as `(column, year, month)`.
    pub fn monthly_balance_columns(&self) -> Vec<(String, i32, u32)> {
        let previous_year = self.current_year - 1;
        std::iter::once((previous_year, 12))
            .chain((1..=12).map(|m| (self.current_year, m)))
            .map(|(y, m)| (format!("Y{:02}{:02}A Balance", short_year(y), m), y, m))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_target_month() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let ctx = RuntimeContext::from_target_month(Some("202510"), today).unwrap();
        assert_eq!(ctx.ref_date, NaiveDate::from_ymd_opt(2025, 10, 31).unwrap());
        assert_eq!(ctx.current_year, 2025);
        assert_eq!(ctx.current_month, 10);
        assert_eq!(ctx.current_quarter, 4);
        assert_eq!(ctx.current_month_str, "2510");
        assert_eq!(ctx.current_period, "2510A");
        assert_eq!(ctx.current_period_tm, "2025-10");
        assert_eq!(ctx.long_age_column, "24 long aged");
        assert_eq!(ctx.long_age_flag(), "Y24 long aged");
    }

    #[test]
    fn test_context_defaults_to_previous_month() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let ctx = RuntimeContext::from_target_month(None, today).unwrap();
        assert_eq!(ctx.current_period_tm, "2025-12");
        assert_eq!(ctx.ref_date, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn test_monthly_balance_columns() {
        let month = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let cols = RuntimeContext::for_month(month).unwrap().monthly_balance_columns();
        assert_eq!(cols.len(), 13);
        assert_eq!(cols[0], ("Y2412A Balance".to_string(), 2024, 12));
        assert_eq!(cols[3], ("Y2503A Balance".to_string(), 2025, 3));
        assert_eq!(cols[12].0, "Y2512A Balance");
    }

    #[test]
    fn test_long_age_column_override() {
        let month = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let ctx = RuntimeContext::for_month(month)
            .unwrap()
            .with_long_age_column("2024 long aged");
        assert_eq!(ctx.long_age_flag(), "Y2024 long aged");
    }
}
