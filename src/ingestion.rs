use crate::allocation::PaymentTerms;
use crate::columns::ledger;
use crate::error::{PositionError, Result};
use crate::table::{Frame, Value};
use log::debug;
use std::collections::HashMap;

/// Contract identifier to a single value, built from two columns of a table.
pub type ContractMap = HashMap<String, Value>;

/// Rejects a source table whose join key column is absent.
pub fn require_join_key(frame: &Frame, table: &str, column: &str) -> Result<()> {
    if frame.has_column(column) {
        Ok(())
    } else {
        Err(PositionError::MissingJoinKey {
            table: table.to_string(),
            column: column.to_string(),
        })
    }
}

/// Builds a contract-keyed map from `key_column` to `value_column`.
///
/// Rows with a missing key or value are dropped and later rows overwrite
/// earlier ones. Returns `None` when either column is absent or nothing is
/// left, never an empty map.
pub fn contract_map(frame: &Frame, key_column: &str, value_column: &str) -> Option<ContractMap> {
    let keys = frame.column(key_column)?;
    let values = frame.column(value_column)?;

    let map: ContractMap = keys
        .iter()
        .zip(values)
        .filter(|(_, value)| !value.is_na())
        .filter_map(|(key, value)| Some((key.as_key()?, value.clone())))
        .collect();

    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

/// Row positions of a table by contract identifier. A duplicated identifier
/// resolves to its last row.
#[derive(Debug, Clone, Default)]
pub struct ContractIndex {
    rows: HashMap<String, usize>,
}

impl ContractIndex {
    pub fn build(frame: &Frame, key_column: &str) -> Self {
        let rows = frame
            .column(key_column)
            .map(|keys| {
                keys.iter()
                    .enumerate()
                    .filter_map(|(idx, key)| Some((key.as_key()?, idx)))
                    .collect()
            })
            .unwrap_or_default();
        Self { rows }
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.rows.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A source table together with its contract index.
#[derive(Debug, Clone)]
pub struct KeyedTable {
    name: &'static str,
    frame: Frame,
    index: ContractIndex,
}

impl KeyedTable {
    pub fn new(name: &'static str, frame: Frame, key_column: &str) -> Self {
        let index = ContractIndex::build(&frame, key_column);
        debug!(
            "Indexed {} rows of '{}' into {} contracts",
            frame.len(),
            name,
            index.len()
        );
        Self { name, frame, index }
    }

    /// Like [`KeyedTable::new`] but fails when the key column is absent.
    pub fn with_required_key(name: &'static str, frame: Frame, key_column: &str) -> Result<Self> {
        require_join_key(&frame, name, key_column)?;
        Ok(Self::new(name, frame, key_column))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.frame.has_column(column)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.position(key).is_some()
    }

    /// Cell for a contract; a miss on either the contract or the column reads
    /// as `Missing`.
    pub fn lookup(&self, key: Option<&str>, column: &str) -> Value {
        key.and_then(|k| self.index.position(k))
            .map(|row| self.frame.value(row, column).clone())
            .unwrap_or_default()
    }
}

/// Sums `Collection` per `CCLMID` for a raw, unaggregated ledger. Contracts
/// keep the order of their first appearance; non-numeric amounts are skipped.
pub fn aggregate_collections(raw_ledger: &Frame) -> Result<Frame> {
    require_join_key(raw_ledger, "collections", ledger::CONTRACT_ID)?;

    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, f64> = HashMap::new();
    for row in raw_ledger.rows() {
        let Some(key) = row.get(ledger::CONTRACT_ID).as_key() else {
            continue;
        };
        let amount = row.num(ledger::COLLECTION).unwrap_or(0.0);
        match totals.get_mut(&key) {
            Some(total) => *total += amount,
            None => {
                totals.insert(key.clone(), amount);
                order.push(key);
            }
        }
    }

    let rows = order
        .into_iter()
        .map(|key| {
            let total = totals.get(&key).copied().unwrap_or(0.0);
            vec![Value::Text(key), Value::Number(total)]
        })
        .collect();
    Frame::from_rows(&[ledger::CONTRACT_ID, ledger::COLLECTION], rows)
}

/// Payment terms from a `;`-separated cell. Anything unreadable is all zero.
pub fn payment_terms(value: &Value) -> PaymentTerms {
    match value.to_display_string() {
        Some(text) => PaymentTerms::parse(&text),
        None => PaymentTerms::default(),
    }
}

/// Keeps the part of a province label after the first `-`, e.g.
/// `"CN-Guangdong"` becomes `"Guangdong"`.
pub fn normalize_province(value: &Value) -> Value {
    match value {
        Value::Text(s) => match s.split_once('-') {
            Some((_, rest)) => Value::text(rest.trim()),
            None => Value::text(s.trim()),
        },
        other => other.clone(),
    }
}

/// Numeric cell with missing and unparsable values read as zero.
pub fn number_or_zero(value: &Value) -> Value {
    Value::Number(value.as_f64().unwrap_or(0.0))
}
