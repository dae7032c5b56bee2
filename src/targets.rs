//! Quarter target and target-balance carry-forward.
//!
//! Only the current quarter ever reads the fresh target table. Every other
//! quarter repeats what the prior-period snapshot carried, so a quarter's
//! figures freeze as soon as it stops being current.

use crate::columns::out;
use crate::ingestion::{contract_map, ContractMap};
use crate::table::{Frame, Value};
use log::warn;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuarterTarget {
    pub target: Value,
    pub balance: Value,
}

#[derive(Debug, Clone, Default)]
pub struct QuarterTargets {
    current_quarter: u32,
    current: Option<ContractMap>,
    carried_targets: [Option<ContractMap>; 4],
    carried_balances: [Option<ContractMap>; 4],
}

impl QuarterTargets {
    pub fn new(
        current_quarter: u32,
        current: Option<ContractMap>,
        snapshot: Option<&Frame>,
    ) -> Self {
        let mut targets = Self {
            current_quarter,
            current,
            ..Default::default()
        };

        let Some(snapshot) = snapshot else {
            return targets;
        };
        if !snapshot.has_column(out::CONTRACT_NO) {
            warn!(
                "Prior snapshot has no '{}' column; quarter targets will not carry forward",
                out::CONTRACT_NO
            );
            return targets;
        }

        for quarter in 1..=4u32 {
            let slot = (quarter - 1) as usize;
            targets.carried_targets[slot] =
                contract_map(snapshot, out::CONTRACT_NO, &out::quarter_target(quarter));
            targets.carried_balances[slot] = contract_map(
                snapshot,
                out::CONTRACT_NO,
                &out::quarter_target_balance(quarter),
            );
        }
        targets
    }

    /// Builds the fresh target map from the target table (keyed by
    /// `target_key`, values in `value_column`) and the carried maps from the
    /// prior snapshot.
    pub fn from_sources(
        current_quarter: u32,
        target_table: Option<&Frame>,
        target_key: &str,
        value_column: &str,
        snapshot: Option<&Frame>,
    ) -> Self {
        let current = target_table.and_then(|table| {
            if !table.has_column(target_key) || !table.has_column(value_column) {
                warn!(
                    "Target table lacks '{}' or '{}'; Q{} target falls back to the snapshot",
                    target_key, value_column, current_quarter
                );
                return None;
            }
            contract_map(table, target_key, value_column)
        });
        Self::new(current_quarter, current, snapshot)
    }

    pub fn current_quarter(&self) -> u32 {
        self.current_quarter
    }

    /// Target and balance for one contract and quarter. `landing` is the
    /// quarter's landing-to-date, used only when a fresh target applies.
    pub fn resolve(
        &self,
        contract: Option<&str>,
        quarter: u32,
        landing: Option<f64>,
    ) -> QuarterTarget {
        let Some(contract) = contract else {
            return QuarterTarget::default();
        };

        if quarter == self.current_quarter {
            if let Some(target) = self.current.as_ref().and_then(|m| m.get(contract)) {
                let balance = match (target.as_f64(), landing) {
                    (Some(t), Some(l)) => Value::Number(t - l),
                    _ => Value::Missing,
                };
                return QuarterTarget {
                    target: target.clone(),
                    balance,
                };
            }
        }

        let slot = match quarter {
            1..=4 => (quarter - 1) as usize,
            _ => return QuarterTarget::default(),
        };
        let carried = |maps: &[Option<ContractMap>; 4]| {
            maps[slot]
                .as_ref()
                .and_then(|m| m.get(contract))
                .cloned()
                .unwrap_or_default()
        };
        QuarterTarget {
            target: carried(&self.carried_targets),
            balance: carried(&self.carried_balances),
        }
    }
}
