//! Manual adjustments keyed by contract.
//!
//! Three independent maps come out of the manual-adjustment sheets, and each
//! has its own precedence when it meets a computed value:
//!
//! - **balance**: a present entry replaces the computed amount to add,
//!   otherwise the computed amount stands;
//! - **status**: contracts without an entry read as `0`;
//! - **long-age**: there is no computed value at all, so contracts without an
//!   entry (or runs without a map) read as missing.

use crate::columns::{manual, out};
use crate::error::Result;
use crate::ingestion::{contract_map, ContractMap};
use crate::table::{Column, Frame, Value};
use log::{debug, warn};

/// A contract-keyed override. Sources without usable rows produce no map
/// rather than an empty one.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideMap(ContractMap);

impl OverrideMap {
    /// `None` when the source is absent, empty, lacks either column, or has
    /// no rows with a value.
    pub fn from_source(
        source: Option<&Frame>,
        key_column: &str,
        value_column: &str,
    ) -> Option<Self> {
        let frame = source.filter(|f| !f.is_empty())?;
        if !frame.has_column(key_column) || !frame.has_column(value_column) {
            warn!(
                "Manual adjustment source lacks '{}' or '{}'; override disabled",
                key_column, value_column
            );
            return None;
        }
        contract_map(frame, key_column, value_column).map(OverrideMap)
    }

    pub fn get(&self, contract: &str) -> Option<&Value> {
        self.0.get(contract)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for OverrideMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        OverrideMap(iter.into_iter().filter(|(_, v)| !v.is_na()).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedOverrides {
    pub balance: Option<OverrideMap>,
    pub status: Option<OverrideMap>,
    pub long_age: Option<OverrideMap>,
}

impl ResolvedOverrides {
    pub fn is_empty(&self) -> bool {
        self.balance.is_none() && self.status.is_none() && self.long_age.is_none()
    }
}

pub fn build_overrides(
    balance: Option<&Frame>,
    status: Option<&Frame>,
    long_age: Option<&Frame>,
    long_age_column: &str,
) -> ResolvedOverrides {
    let resolved = ResolvedOverrides {
        balance: OverrideMap::from_source(balance, manual::BALANCE_CONTRACT_ID, manual::BALANCE),
        status: OverrideMap::from_source(status, manual::CONTRACT_ID, manual::CONTRACT_STATUS),
        long_age: OverrideMap::from_source(long_age, manual::CONTRACT_ID, long_age_column),
    };
    debug!(
        "Manual overrides: balance={:?} status={:?} long_age={:?}",
        resolved.balance.as_ref().map(OverrideMap::len),
        resolved.status.as_ref().map(OverrideMap::len),
        resolved.long_age.as_ref().map(OverrideMap::len)
    );
    resolved
}

/// Override wins over the computed amount when it has an entry.
pub fn apply_balance_override(
    contract: Option<&str>,
    base: Value,
    map: Option<&OverrideMap>,
) -> Value {
    match (map, contract) {
        (Some(map), Some(contract)) => map.get(contract).cloned().unwrap_or(base),
        _ => base,
    }
}

/// Mapped status, or `0` for contracts the map does not mention.
pub fn apply_status_override(contract: Option<&str>, map: Option<&OverrideMap>) -> Value {
    map.zip(contract)
        .and_then(|(map, contract)| map.get(contract).cloned())
        .unwrap_or(Value::Number(0.0))
}

/// Mapped long-age flag; missing everywhere else.
pub fn apply_long_age_override(contract: Option<&str>, map: Option<&OverrideMap>) -> Value {
    map.zip(contract)
        .and_then(|(map, contract)| map.get(contract).cloned())
        .unwrap_or_default()
}

/// Picks the long-age column of the manual sheet: a year-qualified
/// `"... long aged"` column first, then a bare `"long aged"`, then the first
/// column that is not a contract identifier.
pub fn detect_long_age_column(source: Option<&Frame>) -> Option<String> {
    let frame = source.filter(|f| !f.is_empty())?;
    let names = frame.column_names();
    let normalized = |name: &str| name.trim().to_lowercase();

    names
        .iter()
        .find(|name| {
            let n = normalized(name.as_str());
            n.ends_with(manual::LONG_AGED_SUFFIX) && n != manual::LONG_AGED_SUFFIX
        })
        .or_else(|| {
            names
                .iter()
                .find(|name| normalized(name.as_str()) == manual::LONG_AGED_SUFFIX)
        })
        .or_else(|| {
            names.iter().find(|name| {
                let n = normalized(name.as_str());
                n != "contract no" && n != "contract"
            })
        })
        .cloned()
}

/// Re-applies the balance and status overrides to an already derived frame.
/// Returns the frame unchanged when neither map is present.
pub fn reapply_manual_adjustments(frame: &Frame, overrides: &ResolvedOverrides) -> Result<Frame> {
    let mut adjusted = frame.clone();

    if let Some(balance) = overrides.balance.as_ref() {
        let column: Column = frame
            .rows()
            .map(|row| {
                let contract = row.get(out::CONTRACT_NO).as_key();
                apply_balance_override(
                    contract.as_deref(),
                    row.get(out::AMT_TO_ADD_TOTAL).clone(),
                    Some(balance),
                )
            })
            .collect();
        adjusted = adjusted.with_replaced(out::AMT_TO_ADD_TOTAL, column)?;
    }

    if let Some(status) = overrides.status.as_ref() {
        let column: Column = frame
            .rows()
            .map(|row| {
                let contract = row.get(out::CONTRACT_NO).as_key();
                apply_status_override(contract.as_deref(), Some(status))
            })
            .collect();
        adjusted = adjusted.with_replaced(out::PO_CLOSED, column)?;
    }

    Ok(adjusted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, Value)]) -> OverrideMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_balance_override_wins_when_present() {
        let m = map(&[("C1", Value::Number(42.0))]);
        let base = Value::Number(7.0);
        assert_eq!(
            apply_balance_override(Some("C1"), base.clone(), Some(&m)),
            Value::Number(42.0)
        );
        assert_eq!(apply_balance_override(Some("C2"), base.clone(), Some(&m)), base);
        assert_eq!(apply_balance_override(Some("C1"), base.clone(), None), base);
    }

    #[test]
    fn test_status_absence_is_neutral_default() {
        let m = map(&[("C1", Value::text("Close"))]);
        assert_eq!(apply_status_override(Some("C1"), Some(&m)), Value::text("Close"));
        assert_eq!(apply_status_override(Some("C2"), Some(&m)), Value::Number(0.0));
        assert_eq!(apply_status_override(Some("C1"), None), Value::Number(0.0));
    }

    #[test]
    fn test_long_age_absence_is_missing() {
        let m = map(&[("C1", Value::text("Y24 long aged"))]);
        assert_eq!(apply_long_age_override(Some("C1"), Some(&m)), Value::text("Y24 long aged"));
        assert_eq!(apply_long_age_override(Some("C2"), Some(&m)), Value::Missing);
        assert_eq!(apply_long_age_override(Some("C1"), None), Value::Missing);
    }

    #[test]
    fn test_build_overrides_absent_for_incomplete_sources() {
        let balance = Frame::from_rows(
            &["Contract", "Balance"],
            vec![
                vec![Value::text("C1"), Value::Number(10.0)],
                vec![Value::text("C1"), Value::Number(11.0)],
            ],
        )
        .unwrap();
        let status_wrong_columns = Frame::from_rows(
            &["Contract No", "Status"],
            vec![vec![Value::text("C1"), Value::text("Close")]],
        )
        .unwrap();
        let long_age_all_missing = Frame::from_rows(
            &["Contract No", "24 long aged"],
            vec![vec![Value::text("C1"), Value::Missing]],
        )
        .unwrap();

        let resolved = build_overrides(
            Some(&balance),
            Some(&status_wrong_columns),
            Some(&long_age_all_missing),
            "24 long aged",
        );
        assert_eq!(resolved.balance.as_ref().and_then(|m| m.get("C1")), Some(&Value::Number(11.0)));
        assert!(resolved.status.is_none());
        assert!(resolved.long_age.is_none());

        assert!(build_overrides(None, None, None, "24 long aged").is_empty());
    }

    #[test]
    fn test_detect_long_age_column() {
        let year_qualified = Frame::from_rows(
            &["Contract No", "long aged", "24 Long Aged "],
            vec![vec![Value::Missing]],
        )
        .unwrap();
        assert_eq!(
            detect_long_age_column(Some(&year_qualified)).as_deref(),
            Some("24 Long Aged ")
        );

        let bare =
            Frame::from_rows(&["Contract No", "Long aged"], vec![vec![Value::Missing]]).unwrap();
        assert_eq!(detect_long_age_column(Some(&bare)).as_deref(), Some("Long aged"));

        let fallback = Frame::from_rows(&["contract", "Flag"], vec![vec![Value::Missing]]).unwrap();
        assert_eq!(detect_long_age_column(Some(&fallback)).as_deref(), Some("Flag"));

        let only_ids = Frame::from_rows(&["Contract No"], vec![vec![Value::Missing]]).unwrap();
        assert_eq!(detect_long_age_column(Some(&only_ids)), None);
        assert_eq!(detect_long_age_column(None), None);
    }

    #[test]
    fn test_reapply_manual_adjustments() {
        let frame = Frame::from_rows(
            &["Contract No", "Amt to add-Total", "PO closed"],
            vec![
                vec![Value::text("C1"), Value::Number(5.0), Value::Number(0.0)],
                vec![Value::text("C2"), Value::Number(6.0), Value::text("Open")],
            ],
        )
        .unwrap();

        let untouched = reapply_manual_adjustments(&frame, &ResolvedOverrides::default()).unwrap();
        assert_eq!(untouched, frame);

        let overrides = ResolvedOverrides {
            balance: Some(map(&[("C2", Value::Number(60.0))])),
            status: Some(map(&[("C1", Value::text("Close"))])),
            long_age: None,
        };
        let adjusted = reapply_manual_adjustments(&frame, &overrides).unwrap();
        assert_eq!(adjusted.value(0, "Amt to add-Total"), &Value::Number(5.0));
        assert_eq!(adjusted.value(1, "Amt to add-Total"), &Value::Number(60.0));
        assert_eq!(adjusted.value(0, "PO closed"), &Value::text("Close"));
        assert_eq!(adjusted.value(1, "PO closed"), &Value::Number(0.0));
        assert_eq!(frame.value(1, "Amt to add-Total"), &Value::Number(6.0));
    }
}
