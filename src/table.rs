//! Column-oriented tables used for both the loaded sources and the derived
//! position frame.
//!
//! A [`Frame`] is an ordered set of named, equal-length [`Column`]s. Columns are
//! only ever added, never overwritten in place, which lets the derivation engine
//! treat the growing result as an append-only accumulator.

use crate::error::{PositionError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

static MISSING: Value = Value::Missing;

/// A single cell.
///
/// `InvalidDate` is what the date normalizer produces for text that looked like
/// a date but could not be read as one. Every accessor treats it as "not a
/// date", so it flows through arithmetic exactly like `Missing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Missing,
    Number(f64),
    Text(String),
    Date(NaiveDate),
    InvalidDate,
}

pub type Column = Vec<Value>;

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// True for anything that carries no usable value: `Missing`, `InvalidDate`
    /// and NaN numbers.
    pub fn is_na(&self) -> bool {
        match self {
            Value::Missing | Value::InvalidDate => true,
            Value::Number(n) => n.is_nan(),
            Value::Text(_) | Value::Date(_) => false,
        }
    }

    /// Numeric view with coercion: numbers pass through, text is trimmed and
    /// parsed, anything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) if !n.is_nan() => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Normalised lookup key for contract identifiers. Integral numbers lose
    /// their fractional part so `1001.0` and `"1001"` join.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Value::Number(n) if n.is_finite() => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(n.to_string())
                }
            }
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            _ => None,
        }
    }

    /// String rendering of a present value, used where the report compares
    /// values as text regardless of their stored type.
    pub fn to_display_string(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Number(_) | Value::Date(_) => self.as_key(),
            _ => None,
        }
    }

    pub fn text_eq(&self, expected: &str) -> bool {
        matches!(self, Value::Text(s) if s == expected)
    }

    pub(crate) fn rounded(&self, decimals: i32) -> Value {
        match self {
            Value::Number(n) if n.is_finite() => {
                let factor = 10f64.powi(decimals);
                let scaled = (n * factor).round() / factor;
                if scaled.is_finite() {
                    Value::Number(scaled)
                } else {
                    Value::Number(*n)
                }
            }
            other => other.clone(),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Missing)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    len: usize,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty frame with a fixed row count, ready to receive columns.
    pub fn with_len(len: usize) -> Self {
        Self {
            len,
            ..Self::default()
        }
    }

    pub fn from_columns(columns: Vec<(String, Column)>) -> Result<Self> {
        let len = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        let mut frame = Self::with_len(len);
        for (name, column) in columns {
            frame.push_column(name, column)?;
        }
        Ok(frame)
    }

    /// Builds a frame from row-major data. Short rows are padded with
    /// `Missing`, extra cells are ignored.
    pub fn from_rows<S: AsRef<str>>(headers: &[S], rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut columns: Vec<Column> = vec![Vec::with_capacity(rows.len()); headers.len()];
        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.push(cells.next().unwrap_or(Value::Missing));
            }
        }
        let mut frame = Self::new();
        frame.len = columns.first().map(Vec::len).unwrap_or(0);
        for (name, column) in headers.iter().zip(columns) {
            frame.push_column(name.as_ref(), column)?;
        }
        Ok(frame)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    /// Cell accessor; unknown columns and out-of-range rows read as `Missing`.
    pub fn value(&self, row: usize, name: &str) -> &Value {
        self.column(name)
            .and_then(|c| c.get(row))
            .unwrap_or(&MISSING)
    }

    pub fn row(&self, idx: usize) -> RowRef<'_> {
        RowRef {
            frame: self,
            idx,
            scope: None,
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        (0..self.len).map(move |idx| self.row(idx))
    }

    /// View of this frame restricted to the columns `scope` allows.
    pub fn scoped<'a>(&'a self, scope: &'a ReadScope) -> ScopedFrame<'a> {
        ScopedFrame { frame: self, scope }
    }

    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(PositionError::DuplicateColumn { column: name });
        }
        if column.len() != self.len {
            return Err(PositionError::ColumnLengthMismatch {
                column: name,
                expected: self.len,
                actual: column.len(),
            });
        }
        self.index.insert(name.clone(), self.names.len());
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Appends a batch of new columns. Either all of them are added or, on the
    /// first conflict, none are.
    pub fn merge(&mut self, delta: Vec<(String, Column)>) -> Result<()> {
        for (i, (name, column)) in delta.iter().enumerate() {
            if self.index.contains_key(name) || delta[..i].iter().any(|(n, _)| n == name) {
                return Err(PositionError::DuplicateColumn {
                    column: name.clone(),
                });
            }
            if column.len() != self.len {
                return Err(PositionError::ColumnLengthMismatch {
                    column: name.clone(),
                    expected: self.len,
                    actual: column.len(),
                });
            }
        }
        for (name, column) in delta {
            self.push_column(name, column)?;
        }
        Ok(())
    }

    /// Returns a copy of this frame with one column's contents swapped out.
    pub fn with_replaced(&self, name: &str, column: Column) -> Result<Frame> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| PositionError::MissingColumn(name.to_string()))?;
        if column.len() != self.len {
            return Err(PositionError::ColumnLengthMismatch {
                column: name.to_string(),
                expected: self.len,
                actual: column.len(),
            });
        }
        let mut out = self.clone();
        out.columns[idx] = column;
        Ok(out)
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        let idx = *self.index.get(name)?;
        self.columns.get_mut(idx)
    }

    pub(crate) fn columns_mut(&mut self) -> impl Iterator<Item = &mut Column> {
        self.columns.iter_mut()
    }

    pub fn select_rows(&self, rows: &[usize]) -> Frame {
        let columns = self
            .columns
            .iter()
            .map(|c| rows.iter().map(|&r| c[r].clone()).collect())
            .collect();
        Frame {
            names: self.names.clone(),
            columns,
            index: self.index.clone(),
            len: rows.len(),
        }
    }

    pub fn filter_rows<F>(&self, predicate: F) -> Frame
    where
        F: Fn(RowRef<'_>) -> bool,
    {
        let rows: Vec<usize> = self
            .rows()
            .filter(|r| predicate(*r))
            .map(|r| r.idx)
            .collect();
        self.select_rows(&rows)
    }

    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Frame> {
        let mut out = Frame::with_len(self.len);
        for name in names {
            let name = name.as_ref();
            let column = self
                .column(name)
                .ok_or_else(|| PositionError::MissingColumn(name.to_string()))?;
            out.push_column(name, column.clone())?;
        }
        Ok(out)
    }

    /// Stacks frames vertically. All frames must share the first frame's
    /// column list, in the same order.
    pub fn concat(frames: &[Frame]) -> Result<Frame> {
        let Some(first) = frames.first() else {
            return Ok(Frame::new());
        };
        let mut out = Frame::with_len(frames.iter().map(Frame::len).sum());
        for name in &first.names {
            let mut column = Vec::with_capacity(out.len);
            for frame in frames {
                let part = frame
                    .column(name)
                    .ok_or_else(|| PositionError::MissingColumn(name.clone()))?;
                column.extend(part.iter().cloned());
            }
            out.push_column(name.clone(), column)?;
        }
        Ok(out)
    }

    /// Row records keyed by column name, in column order.
    pub fn to_records(&self) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
        let mut records = Vec::with_capacity(self.len);
        for row in 0..self.len {
            let mut record = serde_json::Map::new();
            for (name, column) in self.names.iter().zip(&self.columns) {
                record.insert(name.clone(), serde_json::to_value(&column[row])?);
            }
            records.push(record);
        }
        Ok(records)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_records()?)?)
    }
}

/// The columns one rule may read. A read of any other column through a scoped
/// view yields `Missing` and is recorded, so the caller can reject the rule.
#[derive(Debug, Default)]
pub struct ReadScope {
    allowed: HashSet<String>,
    undeclared: RefCell<Option<String>>,
}

impl ReadScope {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: columns.into_iter().map(Into::into).collect(),
            undeclared: RefCell::new(None),
        }
    }

    fn permits(&self, name: &str) -> bool {
        if self.allowed.contains(name) {
            return true;
        }
        let mut undeclared = self.undeclared.borrow_mut();
        if undeclared.is_none() {
            *undeclared = Some(name.to_string());
        }
        false
    }

    /// First column read outside the scope, if any.
    pub fn undeclared(&self) -> Option<String> {
        self.undeclared.borrow().clone()
    }
}

/// A frame as seen by a single rule.
#[derive(Debug, Clone, Copy)]
pub struct ScopedFrame<'a> {
    frame: &'a Frame,
    scope: &'a ReadScope,
}

impl<'a> ScopedFrame<'a> {
    pub fn len(&self) -> usize {
        self.frame.len
    }

    pub fn is_empty(&self) -> bool {
        self.frame.len == 0
    }

    pub fn rows(&self) -> impl Iterator<Item = RowRef<'a>> {
        let frame = self.frame;
        let scope = self.scope;
        (0..frame.len).map(move |idx| RowRef {
            frame,
            idx,
            scope: Some(scope),
        })
    }
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    frame: &'a Frame,
    idx: usize,
    scope: Option<&'a ReadScope>,
}

impl<'a> RowRef<'a> {
    pub fn index(&self) -> usize {
        self.idx
    }

    pub fn get(&self, name: &str) -> &'a Value {
        match self.scope {
            Some(scope) if !scope.permits(name) => &MISSING,
            _ => self.frame.value(self.idx, name),
        }
    }

    pub fn num(&self, name: &str) -> Option<f64> {
        self.get(name).as_f64()
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        self.get(name).as_date()
    }

    pub fn text(&self, name: &str) -> Option<&'a str> {
        self.get(name).as_text()
    }

    pub fn is(&self, name: &str, expected: &str) -> bool {
        self.get(name).text_eq(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::from_rows(
            &["Contract No", "Value"],
            vec![
                vec![Value::text("C1"), Value::Number(10.0)],
                vec![Value::text("C2"), Value::Number(20.0)],
                vec![Value::text("C3")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_rows_pads_short_rows() {
        let frame = sample();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.value(2, "Value"), &Value::Missing);
        assert_eq!(frame.value(0, "Unknown"), &Value::Missing);
    }

    #[test]
    fn test_merge_rejects_overwrite() {
        let mut frame = sample();
        let err = frame
            .merge(vec![("Value".to_string(), vec![Value::Missing; 3])])
            .unwrap_err();
        assert!(matches!(err, PositionError::DuplicateColumn { .. }));
        assert_eq!(frame.width(), 2);
    }

    #[test]
    fn test_merge_rejects_wrong_length() {
        let mut frame = sample();
        let err = frame
            .merge(vec![("Extra".to_string(), vec![Value::Missing; 2])])
            .unwrap_err();
        assert!(matches!(err, PositionError::ColumnLengthMismatch { .. }));
    }

    #[test]
    fn test_key_normalisation() {
        assert_eq!(Value::Number(1001.0).as_key().as_deref(), Some("1001"));
        assert_eq!(Value::text("  C-9 ").as_key().as_deref(), Some("C-9"));
        assert_eq!(Value::text("   ").as_key(), None);
        assert_eq!(Value::Missing.as_key(), None);
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::text(" 12.5 ").as_f64(), Some(12.5));
        assert_eq!(Value::text("abc").as_f64(), None);
        assert_eq!(Value::Number(f64::NAN).as_f64(), None);
        assert!(Value::InvalidDate.is_na());
    }

    #[test]
    fn test_select_and_concat() {
        let frame = sample();
        let picked = frame.select_rows(&[2, 0]);
        assert_eq!(picked.value(0, "Contract No"), &Value::text("C3"));

        let stacked = Frame::concat(&[frame.clone(), picked]).unwrap();
        assert_eq!(stacked.len(), 5);
        assert_eq!(stacked.value(4, "Value"), &Value::Number(10.0));

        assert!(frame.select_columns(&["Nope"]).is_err());
    }

    #[test]
    fn test_scoped_rows_record_undeclared_reads() {
        let frame = sample();
        let scope = ReadScope::new(["Value"]);
        let view = frame.scoped(&scope);

        let row = view.rows().next().unwrap();
        assert_eq!(row.get("Value"), &Value::Number(10.0));
        assert_eq!(scope.undeclared(), None);

        assert_eq!(row.get("Contract No"), &Value::Missing);
        assert_eq!(scope.undeclared().as_deref(), Some("Contract No"));
        assert_eq!(frame.row(0).get("Contract No"), &Value::text("C1"));
    }

    #[test]
    fn test_records_render_missing_as_null() {
        let records = sample().to_records().unwrap();
        assert_eq!(records[2]["Value"], serde_json::Value::Null);
        assert_eq!(records[0]["Contract No"], serde_json::json!("C1"));
    }
}
