//! Robust normalisation of heterogeneous date cells.
//!
//! Source workbooks mix ISO strings, `MM/DD/YYYY` and `DD/MM/YYYY` text, typed
//! dates and free text. Strategies run in a fixed order and the first success
//! wins:
//!
//! 1. numeric pattern (`digits . / - space` only) with a year-first then
//!    year-last split,
//! 2. general calendar formats (ISO date-times, RFC 3339/2822, month names),
//! 3. month-first then day-first parsing of the separator-normalised text,
//! 4. reconstruction from exactly three numeric components.
//!
//! Text that hits the numeric pattern but does not form a calendar date stops
//! at step 1 as [`NormalizedDate::Invalid`].

use crate::table::{Column, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const MISSING_SENTINELS: [&str; 7] = ["", "nan", "nat", "none", "null", "<na>", "n/a"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%B %d, %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d-%b-%Y",
    "%d-%B-%Y",
    "%d-%b-%y",
    "%Y-%b-%d",
    "%A, %B %d, %Y",
    "%a, %d %b %Y",
];

const MONTH_FIRST_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%m/%d/%y",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%b/%d/%Y",
    "%B/%d/%Y",
];

const DAY_FIRST_FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%d/%m/%y",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%b/%Y",
    "%d/%B/%Y",
    "%d/%b/%y",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedDate {
    Date(NaiveDate),
    Missing,
    /// The text looked like a date but is not one. Distinct from `Missing` so
    /// callers can tell blank cells from garbage.
    Invalid,
}

impl NormalizedDate {
    pub fn date(self) -> Option<NaiveDate> {
        match self {
            NormalizedDate::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            NormalizedDate::Date(d) => Value::Date(d),
            NormalizedDate::Missing => Value::Missing,
            NormalizedDate::Invalid => Value::InvalidDate,
        }
    }
}

pub fn normalize(value: &Value) -> NormalizedDate {
    match value {
        Value::Date(d) => NormalizedDate::Date(*d),
        Value::Missing => NormalizedDate::Missing,
        Value::InvalidDate => NormalizedDate::Invalid,
        Value::Number(n) if n.is_nan() => NormalizedDate::Missing,
        Value::Number(n) => normalize_text(&n.to_string()),
        Value::Text(s) => normalize_text(s),
    }
}

pub fn normalize_column(column: &Column) -> Column {
    column.iter().map(|v| normalize(v).into_value()).collect()
}

pub fn normalize_text(raw: &str) -> NormalizedDate {
    let text = raw.trim();
    if is_missing_sentinel(text) {
        return NormalizedDate::Missing;
    }

    if let Some(result) = parse_numeric(text) {
        return result;
    }

    if let Some(date) = parse_calendar(text) {
        return NormalizedDate::Date(date);
    }

    let normalized = text.replace(['.', '-'], "/");

    if let Some(date) = parse_dual_order(&normalized) {
        return NormalizedDate::Date(date);
    }

    if let Some(date) = parse_components(&normalized) {
        return NormalizedDate::Date(date);
    }

    NormalizedDate::Invalid
}

fn is_missing_sentinel(text: &str) -> bool {
    let lowered = text.to_lowercase();
    MISSING_SENTINELS.contains(&lowered.as_str())
}

/// `None` means the text is not purely numeric and later strategies should
/// try; `Some(Invalid)` ends the search.
fn parse_numeric(text: &str) -> Option<NormalizedDate> {
    let numeric = text
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '.' | '/' | '-'));
    if !numeric {
        return None;
    }

    let parts: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || matches!(c, '.' | '/' | '-'))
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 {
        return Some(NormalizedDate::Invalid);
    }

    Some(
        date_from_parts(&parts)
            .map(NormalizedDate::Date)
            .unwrap_or(NormalizedDate::Invalid),
    )
}

/// Year-first when the first part has four digits, then year-last (read as
/// month/day/year) when the last part does.
fn date_from_parts(parts: &[&str]) -> Option<NaiveDate> {
    let numbers: Vec<u32> = parts
        .iter()
        .map(|p| p.parse::<u32>())
        .collect::<Result<_, _>>()
        .ok()?;

    let mut candidates: Vec<(u32, u32, u32)> = Vec::with_capacity(2);
    if parts[0].len() == 4 {
        candidates.push((numbers[0], numbers[1], numbers[2]));
    }
    if parts[2].len() == 4 {
        candidates.push((numbers[2], numbers[0], numbers[1]));
    }

    candidates
        .into_iter()
        .find_map(|(y, m, d)| NaiveDate::from_ymd_opt(y as i32, m, d))
}

fn parse_calendar(text: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.date_naive());
    }
    parse_with_formats(text, DATETIME_FORMATS, DATE_FORMATS)
}

fn parse_dual_order(normalized: &str) -> Option<NaiveDate> {
    parse_with_formats(normalized, MONTH_FIRST_FORMATS, &[])
        .or_else(|| parse_with_formats(normalized, DAY_FIRST_FORMATS, &[]))
}

/// Tries every format both as a date-time and as a plain date.
fn parse_with_formats(
    text: &str,
    datetime_formats: &[&str],
    date_formats: &[&str],
) -> Option<NaiveDate> {
    for fmt in datetime_formats.iter().chain(date_formats) {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Some(d);
        }
    }
    None
}

fn parse_components(normalized: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = normalized
        .split(|c: char| !c.is_ascii_digit())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 {
        return None;
    }
    date_from_parts(&parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NormalizedDate {
        NormalizedDate::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_iso_dates_round_trip() {
        for (y, m, d) in [(2024, 3, 15), (1999, 12, 31), (2024, 2, 29), (2030, 1, 1)] {
            let text = format!("{:04}-{:02}-{:02}", y, m, d);
            assert_eq!(normalize_text(&text), ymd(y, m, d), "{}", text);
        }
    }

    #[test]
    fn test_year_first_wins() {
        assert_eq!(normalize_text("2024/03/15"), ymd(2024, 3, 15));
        assert_eq!(normalize_text("2024.03.05"), ymd(2024, 3, 5));
    }

    #[test]
    fn test_year_last_reads_month_first() {
        assert_eq!(normalize_text("03/15/2024"), ymd(2024, 3, 15));
        assert_eq!(normalize_text("3-5-2024"), ymd(2024, 3, 5));
    }

    #[test]
    fn test_numeric_pattern_without_valid_split_is_invalid() {
        assert_eq!(normalize_text("15/03/2024"), NormalizedDate::Invalid);
        assert_eq!(normalize_text("20240315"), NormalizedDate::Invalid);
        assert_eq!(normalize_text("12/13/14"), NormalizedDate::Invalid);
        assert_eq!(normalize_text("2024/02/30"), NormalizedDate::Invalid);
    }

    #[test]
    fn test_missing_sentinels() {
        for text in ["", "   ", "nan", "NaT", "None", "null", "NULL", "<NA>", "N/A", "n/a"] {
            assert_eq!(normalize_text(text), NormalizedDate::Missing, "{:?}", text);
        }
        assert_eq!(normalize(&Value::Missing), NormalizedDate::Missing);
    }

    #[test]
    fn test_calendar_formats() {
        assert_eq!(normalize_text("15 Mar 2024"), ymd(2024, 3, 15));
        assert_eq!(normalize_text("March 15, 2024"), ymd(2024, 3, 15));
        assert_eq!(normalize_text("2024-03-15T08:30:00"), ymd(2024, 3, 15));
        assert_eq!(normalize_text("2024-03-15 08:30:00"), ymd(2024, 3, 15));
        assert_eq!(normalize_text("2024-03-15T08:30:00+08:00"), ymd(2024, 3, 15));
    }

    #[test]
    fn test_dual_order_fallback() {
        assert_eq!(normalize_text("03/15/2024 10:30"), ymd(2024, 3, 15));
        assert_eq!(normalize_text("15.03.2024 10:30"), ymd(2024, 3, 15));
    }

    #[test]
    fn test_component_reconstruction() {
        assert_eq!(normalize_text("2024年3月15日"), ymd(2024, 3, 15));
    }

    #[test]
    fn test_free_text_is_invalid() {
        assert_eq!(normalize_text("soon"), NormalizedDate::Invalid);
        assert_eq!(normalize(&Value::Number(45000.0)), NormalizedDate::Invalid);
    }

    #[test]
    fn test_typed_dates_pass_through() {
        let d = NaiveDate::from_ymd_opt(2025, 10, 31).unwrap();
        assert_eq!(normalize(&Value::Date(d)), NormalizedDate::Date(d));
        assert_eq!(NormalizedDate::Invalid.into_value(), Value::InvalidDate);
    }
}
