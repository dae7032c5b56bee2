//! Milestone indicators, lead times and lead-time buckets.
//!
//! A milestone (DEL/DAC, PAC, FAC) is `Actual` exactly when its actual date is
//! known, otherwise `Planned`. Nothing is persisted: the indicator is recomputed
//! from the dates on every run.

use crate::columns::MilestoneColumns;
use crate::table::RowRef;
use crate::utils::days_between;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Items older than this many days are chased in the aging reports.
pub const LEAD_TIME_THRESHOLD_DAYS: i64 = 185;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Indicator {
    Planned,
    Actual,
}

impl Indicator {
    pub fn from_actual(actual: Option<NaiveDate>) -> Self {
        if actual.is_some() {
            Indicator::Actual
        } else {
            Indicator::Planned
        }
    }

    /// Single-letter code used in the report (`P` / `A`).
    pub fn code(self) -> &'static str {
        match self {
            Indicator::Planned => "P",
            Indicator::Actual => "A",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MilestoneDates {
    pub previous: Option<NaiveDate>,
    pub current: Option<NaiveDate>,
    pub actual: Option<NaiveDate>,
}

impl MilestoneDates {
    pub fn from_row(row: &RowRef<'_>, cols: &MilestoneColumns) -> Self {
        Self {
            previous: row.date(cols.date_previous),
            current: row.date(cols.date_current),
            actual: row.date(cols.date_actual),
        }
    }

    pub fn indicator(&self) -> Indicator {
        Indicator::from_actual(self.actual)
    }

    /// Actual date when known, planned date otherwise.
    pub fn effective(&self) -> Option<NaiveDate> {
        self.actual.or(self.current)
    }

    /// Days the planned date moved since the previous period (positive means
    /// slipped later).
    pub fn slip_days(&self) -> Option<i64> {
        Some(days_between(self.previous?, self.current?))
    }
}

/// DEL lead time, counted from first delivery.
pub fn del_lead_time(first_delivery: Option<NaiveDate>, del: &MilestoneDates) -> Option<i64> {
    let start = first_delivery?;
    Some(days_between(start, del.effective()?))
}

/// Lead time of `successor` measured from `predecessor` (PAC from DEL, FAC
/// from PAC).
///
/// An actual successor behind a planned predecessor is inconsistent and has no
/// lead time. Otherwise actual dates are preferred on both sides, falling back
/// to the current planned dates.
pub fn successor_lead_time(
    predecessor: &MilestoneDates,
    successor: &MilestoneDates,
) -> Option<i64> {
    match (predecessor.indicator(), successor.indicator()) {
        (Indicator::Planned, Indicator::Actual) => None,
        (Indicator::Actual, Indicator::Actual) => {
            Some(days_between(predecessor.actual?, successor.actual?))
        }
        (pred, Indicator::Planned) => {
            let end = successor.current?;
            let start = match pred {
                Indicator::Actual => predecessor.actual?,
                Indicator::Planned => predecessor.current?,
            };
            Some(days_between(start, end))
        }
    }
}

/// Days from the milestone's effective date to the reporting date.
pub fn days_elapsed(ref_date: NaiveDate, dates: &MilestoneDates) -> Option<i64> {
    Some(days_between(dates.effective()?, ref_date))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadTimeBucket {
    UnderFourMonths,
    FourToFiveMonths,
    FiveToSixMonths,
    OverSixMonths,
    OverTwelveMonths,
}

impl LeadTimeBucket {
    pub const ALL: [LeadTimeBucket; 5] = [
        LeadTimeBucket::UnderFourMonths,
        LeadTimeBucket::FourToFiveMonths,
        LeadTimeBucket::FiveToSixMonths,
        LeadTimeBucket::OverSixMonths,
        LeadTimeBucket::OverTwelveMonths,
    ];

    pub fn classify(days: f64) -> Option<Self> {
        if days.is_nan() {
            return None;
        }
        Some(if days <= 125.0 {
            LeadTimeBucket::UnderFourMonths
        } else if days <= 155.0 {
            LeadTimeBucket::FourToFiveMonths
        } else if days <= 185.0 {
            LeadTimeBucket::FiveToSixMonths
        } else if days <= 365.0 {
            LeadTimeBucket::OverSixMonths
        } else {
            LeadTimeBucket::OverTwelveMonths
        })
    }

    /// Milestone-prefixed label, e.g. `PAC 4~5 months`.
    pub fn label(self, prefix: &str) -> String {
        let suffix = match self {
            LeadTimeBucket::UnderFourMonths => "<4 months",
            LeadTimeBucket::FourToFiveMonths => " 4~5 months",
            LeadTimeBucket::FiveToSixMonths => " 5~6 months",
            LeadTimeBucket::OverSixMonths => ">6 months",
            LeadTimeBucket::OverTwelveMonths => ">12 months",
        };
        format!("{}{}", prefix, suffix)
    }

    pub fn labels(prefix: &str) -> Vec<String> {
        Self::ALL.iter().map(|b| b.label(prefix)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    fn planned(current: Option<NaiveDate>) -> MilestoneDates {
        MilestoneDates {
            current,
            ..Default::default()
        }
    }

    fn actual(current: Option<NaiveDate>, actual: Option<NaiveDate>) -> MilestoneDates {
        MilestoneDates {
            current,
            actual,
            ..Default::default()
        }
    }

    #[test]
    fn test_indicator_follows_actual_date() {
        assert_eq!(planned(d(2025, 1, 1)).indicator(), Indicator::Planned);
        assert_eq!(actual(None, d(2025, 1, 1)).indicator(), Indicator::Actual);
        assert_eq!(Indicator::Actual.code(), "A");
    }

    #[test]
    fn test_del_lead_time_fallback() {
        let first = d(2025, 1, 1);
        assert_eq!(del_lead_time(first, &actual(d(2025, 3, 1), d(2025, 2, 1))), Some(31));
        assert_eq!(del_lead_time(first, &planned(d(2025, 3, 2))), Some(60));
        assert_eq!(del_lead_time(first, &planned(None)), None);
        assert_eq!(del_lead_time(None, &actual(None, d(2025, 2, 1))), None);
    }

    #[test]
    fn test_pac_from_actual_del_and_planned_pac() {
        let del = actual(d(2025, 1, 10), d(2025, 1, 1));
        let pac = planned(d(2025, 4, 11));
        assert_eq!(successor_lead_time(&del, &pac), Some(100));
    }

    #[test]
    fn test_planned_predecessor_with_actual_successor_is_missing() {
        let del = planned(d(2025, 1, 1));
        let pac = actual(d(2025, 4, 1), d(2025, 4, 1));
        assert_eq!(successor_lead_time(&del, &pac), None);
    }

    #[test]
    fn test_both_actual_uses_actual_dates() {
        let pac = actual(d(2025, 1, 1), d(2025, 2, 1));
        let fac = actual(d(2025, 9, 1), d(2025, 3, 3));
        assert_eq!(successor_lead_time(&pac, &fac), Some(30));
    }

    #[test]
    fn test_both_planned_uses_current_dates() {
        let pac = planned(d(2025, 1, 1));
        let fac = planned(d(2025, 1, 31));
        assert_eq!(successor_lead_time(&pac, &fac), Some(30));
        assert_eq!(successor_lead_time(&planned(None), &fac), None);
        assert_eq!(successor_lead_time(&pac, &planned(None)), None);
    }

    #[test]
    fn test_days_elapsed_prefers_actual() {
        let ref_date = d(2025, 10, 31).unwrap();
        assert_eq!(days_elapsed(ref_date, &actual(d(2025, 1, 1), d(2025, 10, 1))), Some(30));
        assert_eq!(days_elapsed(ref_date, &planned(d(2025, 10, 30))), Some(1));
        assert_eq!(days_elapsed(ref_date, &planned(None)), None);
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(LeadTimeBucket::classify(125.0), Some(LeadTimeBucket::UnderFourMonths));
        assert_eq!(LeadTimeBucket::classify(126.0), Some(LeadTimeBucket::FourToFiveMonths));
        assert_eq!(LeadTimeBucket::classify(155.0), Some(LeadTimeBucket::FourToFiveMonths));
        assert_eq!(LeadTimeBucket::classify(185.0), Some(LeadTimeBucket::FiveToSixMonths));
        assert_eq!(LeadTimeBucket::classify(186.0), Some(LeadTimeBucket::OverSixMonths));
        assert_eq!(LeadTimeBucket::classify(365.0), Some(LeadTimeBucket::OverSixMonths));
        assert_eq!(LeadTimeBucket::classify(366.0), Some(LeadTimeBucket::OverTwelveMonths));
        assert_eq!(LeadTimeBucket::classify(-20.0), Some(LeadTimeBucket::UnderFourMonths));
        assert_eq!(LeadTimeBucket::classify(f64::NAN), None);
    }

    #[test]
    fn test_bucket_labels() {
        assert_eq!(
            LeadTimeBucket::labels("PAC"),
            vec![
                "PAC<4 months",
                "PAC 4~5 months",
                "PAC 5~6 months",
                "PAC>6 months",
                "PAC>12 months"
            ]
        );
    }
}
