use crate::dates::{normalize_text, NormalizedDate};
use crate::error::{PositionError, Result};
use chrono::{Datelike, Months, NaiveDate};
use std::ops::RangeInclusive;

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

pub fn first_of_previous_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Calendar quarter (1-4) of a month number.
pub fn quarter_of_month(month: u32) -> u32 {
    (month.saturating_sub(1)) / 3 + 1
}

pub fn quarter_of(date: NaiveDate) -> u32 {
    quarter_of_month(date.month())
}

/// Months belonging to a calendar quarter, e.g. Q2 -> 4..=6.
pub fn quarter_months(quarter: u32) -> RangeInclusive<u32> {
    let start = (quarter.clamp(1, 4) - 1) * 3 + 1;
    start..=start + 2
}

/// Whole days from `start` to `end` (negative when `end` is earlier).
pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Two-digit year used in period labels (`2025` -> `25`).
pub fn short_year(year: i32) -> i32 {
    year.rem_euclid(100)
}

/// Parses a reporting month into the first day of that month.
///
/// Accepts `YYYY-MM`, `YYYY/MM` and `YYYYMM`; anything else is handed to the
/// date normalizer and its month is used.
pub fn parse_target_month(text: &str) -> Result<NaiveDate> {
    let trimmed = text.trim();

    for sep in ['-', '/'] {
        if let Some((y, m)) = trimmed.split_once(sep) {
            if let Some(date) = year_month(y, m) {
                return Ok(date);
            }
        }
    }

    if trimmed.len() == 6 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        if let Some(date) = year_month(&trimmed[..4], &trimmed[4..]) {
            return Ok(date);
        }
    }

    match normalize_text(trimmed) {
        NormalizedDate::Date(d) => NaiveDate::from_ymd_opt(d.year(), d.month(), 1)
            .ok_or_else(|| PositionError::InvalidTargetMonth(text.to_string())),
        _ => Err(PositionError::InvalidTargetMonth(text.to_string())),
    }
}

fn year_month(year: &str, month: &str) -> Option<NaiveDate> {
    if year.len() != 4 || month.is_empty() || month.len() > 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2),
            NaiveDate::from_ymd_opt(2023, 2, 28)
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            last_day_of_month(2025, 12),
            NaiveDate::from_ymd_opt(2025, 12, 31)
        );
        assert_eq!(last_day_of_month(2025, 13), None);
    }

    #[test]
    fn test_first_of_previous_month() {
        let jan = NaiveDate::from_ymd_opt(2025, 1, 17).unwrap();
        assert_eq!(
            first_of_previous_month(jan),
            NaiveDate::from_ymd_opt(2024, 12, 1)
        );
    }

    #[test]
    fn test_quarters() {
        assert_eq!(quarter_of_month(1), 1);
        assert_eq!(quarter_of_month(3), 1);
        assert_eq!(quarter_of_month(4), 2);
        assert_eq!(quarter_of_month(12), 4);
        assert_eq!(quarter_months(3), 7..=9);
    }

    #[test]
    fn test_parse_target_month_formats() {
        let oct = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        assert_eq!(parse_target_month("2025-10").unwrap(), oct);
        assert_eq!(parse_target_month("2025/10").unwrap(), oct);
        assert_eq!(parse_target_month("202510").unwrap(), oct);
        assert_eq!(parse_target_month("2025-10-17").unwrap(), oct);
        assert!(parse_target_month("not a month").is_err());
        assert!(parse_target_month("2025-13").is_err());
    }
}
