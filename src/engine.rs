//! Rule groups, plan validation and evaluation of the position frame.
//!
//! A [`DerivationPlan`] is an ordered list of [`RuleGroup`]s. Every rule names
//! the columns it reads; a plan is only constructed when each of those columns
//! is produced by a strictly earlier group. Evaluation starts from an empty
//! frame with one row per contract and merges each group's new columns into
//! it. Merging never replaces an existing column.
//!
//! Rules see the frame through a [`ReadScope`] holding only their declared
//! reads; reading anything else fails the evaluation with
//! [`PositionError::DependencyViolation`].

use crate::columns::{billing, ledger, master, out, target};
use crate::context::RuntimeContext;
use crate::error::{PositionError, Result};
use crate::ingestion::{require_join_key, KeyedTable};
use crate::overrides::ResolvedOverrides;
use crate::schema::SourceTables;
use crate::table::{Column, Frame, ReadScope, RowRef, ScopedFrame, Value};
use crate::targets::QuarterTargets;
use log::{debug, warn};
use std::collections::HashSet;

/// Decimal places every numeric output is rounded to.
pub const ROUND_DECIMALS: i32 = 10;

/// Rows whose amount to add falls below this are treated as unreliable.
pub const NEGATIVE_MASK_THRESHOLD: f64 = -10.0;

/// Amount columns blanked for unreliable rows.
pub const MASKED_AMOUNT_COLUMNS: [&str; 5] = [
    out::ACC_COLLECTION,
    out::AMT_TO_ADD_TOTAL,
    out::DEL_AMT_TO_ADD,
    out::PAC_AMT_TO_ADD,
    out::FAC_AMT_TO_ADD,
];

/// Everything a rule may consult besides the frame under construction.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub runtime: RuntimeContext,
    /// Current-period contract master; one output row per master row.
    pub master: Frame,
    pub previous_master: KeyedTable,
    pub collections: KeyedTable,
    pub billing: KeyedTable,
    /// Previous run's frame, when one was supplied with a `Contract No` column.
    pub snapshot: Option<KeyedTable>,
    pub targets: QuarterTargets,
    pub overrides: ResolvedOverrides,
}

impl RunContext {
    /// Validates join keys and indexes the sources. A missing join key on the
    /// master, previous master, ledger or billing table is fatal; the target
    /// table and the snapshot only lose their effect.
    pub fn new(
        sources: &SourceTables,
        runtime: RuntimeContext,
        overrides: ResolvedOverrides,
        target_value_column: &str,
    ) -> Result<Self> {
        require_join_key(&sources.current_master, "current master", master::CONTRACT_ID)?;
        let previous_master = KeyedTable::with_required_key(
            "previous master",
            sources.previous_master.clone(),
            master::CONTRACT_ID,
        )?;
        let collections = KeyedTable::with_required_key(
            "collections",
            sources.collections.clone(),
            ledger::CONTRACT_ID,
        )?;
        let billing_table = KeyedTable::with_required_key(
            "billing",
            sources.billing.clone(),
            billing::CONTRACT_ID,
        )?;

        report_missing_columns("current master", &sources.current_master, MASTER_COLUMNS);
        report_missing_columns(
            "previous master",
            &sources.previous_master,
            &[
                master::DAC_DATE_PREVIOUS,
                master::PAC_DATE_PREVIOUS,
                master::FAC_DATE_PREVIOUS,
            ],
        );
        report_missing_columns("collections", &sources.collections, &[ledger::COLLECTION]);
        report_missing_columns("billing", &sources.billing, BILLING_COLUMNS);

        let snapshot = match &sources.last_snapshot {
            Some(frame) if frame.has_column(out::CONTRACT_NO) => Some(KeyedTable::new(
                "prior snapshot",
                frame.clone(),
                out::CONTRACT_NO,
            )),
            Some(_) => {
                warn!(
                    "Prior snapshot has no '{}' column; carried values will be missing",
                    out::CONTRACT_NO
                );
                None
            }
            None => None,
        };

        let targets = QuarterTargets::from_sources(
            runtime.current_quarter,
            sources.targets.as_ref(),
            target::CONTRACT_ID,
            target_value_column,
            sources.last_snapshot.as_ref(),
        );

        Ok(Self {
            runtime,
            master: sources.current_master.clone(),
            previous_master,
            collections,
            billing: billing_table,
            snapshot,
            targets,
            overrides,
        })
    }

    pub fn row_count(&self) -> usize {
        self.master.len()
    }

    /// Value carried by the previous run for a contract, `Missing` without a
    /// snapshot.
    pub fn snapshot_value(&self, contract: Option<&str>, column: &str) -> Value {
        self.snapshot
            .as_ref()
            .map(|s| s.lookup(contract, column))
            .unwrap_or_default()
    }
}

const MASTER_COLUMNS: &[&str] = &[
    master::CONTRACT_NAME,
    master::CATEGORY_1,
    master::CATEGORY_2,
    master::CUSTOMER_UNIT,
    master::PROVINCE,
    master::OEF_VALUE,
    master::FIRST_DELIVERY_DATE,
    master::DAC_DATE_CURRENT,
    master::DAC_DATE_ACTUAL,
    master::PAC_DATE_CURRENT,
    master::PAC_DATE_ACTUAL,
    master::FAC_DATE_CURRENT,
    master::FAC_DATE_ACTUAL,
];

const BILLING_COLUMNS: &[&str] = &[
    billing::UNBILLED_TOTAL,
    billing::BILLED_TOTAL,
    billing::BILLED_NOT_DUE,
    billing::BILLED_OVERDUE,
    billing::PAYMENT_TERM,
    billing::BILLED_DEL,
    billing::BILLED_PAC,
    billing::BILLED_FAC,
    billing::BILLED_ACT,
    billing::TOTAL_AR,
];

fn report_missing_columns(table: &str, frame: &Frame, expected: &[&str]) {
    for column in expected {
        if !frame.has_column(column) {
            warn!(
                "Source '{}' has no '{}' column; derived values depending on it will be missing",
                table, column
            );
        }
    }
}

pub type RowFn = Box<dyn Fn(RowRef<'_>, &RunContext) -> Value>;
pub type BatchFn = Box<dyn Fn(ScopedFrame<'_>, &RunContext) -> Column>;

pub enum RuleKind {
    /// Computes one cell from the row built so far.
    PerRow(RowFn),
    /// Computes a whole column, for rules that aggregate across rows.
    Batch(BatchFn),
}

/// One output column and how to compute it.
pub struct Rule {
    output: String,
    reads: Vec<String>,
    kind: RuleKind,
}

impl Rule {
    pub fn per_row<F>(output: impl Into<String>, reads: &[&str], f: F) -> Self
    where
        F: Fn(RowRef<'_>, &RunContext) -> Value + 'static,
    {
        Self {
            output: output.into(),
            reads: reads.iter().map(|r| r.to_string()).collect(),
            kind: RuleKind::PerRow(Box::new(f)),
        }
    }

    pub fn batch<F>(output: impl Into<String>, reads: &[&str], f: F) -> Self
    where
        F: Fn(ScopedFrame<'_>, &RunContext) -> Column + 'static,
    {
        Self {
            output: output.into(),
            reads: reads.iter().map(|r| r.to_string()).collect(),
            kind: RuleKind::Batch(Box::new(f)),
        }
    }

    /// A column holding the same value on every row.
    pub fn constant(output: impl Into<String>, value: Value) -> Self {
        Self::per_row(output, &[], move |_, _| value.clone())
    }

    /// Adds reads whose names are only known at run time.
    pub fn also_reads<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reads.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn reads(&self) -> &[String] {
        &self.reads
    }

    fn evaluate(&self, group: &str, frame: &Frame, ctx: &RunContext) -> Result<Column> {
        let scope = ReadScope::new(self.reads.iter().cloned());
        let view = frame.scoped(&scope);
        let column: Column = match &self.kind {
            RuleKind::PerRow(f) => view.rows().map(|row| f(row, ctx)).collect(),
            RuleKind::Batch(f) => f(view, ctx),
        };

        match scope.undeclared() {
            Some(undeclared) => Err(PositionError::DependencyViolation {
                group: group.to_string(),
                rule: self.output.clone(),
                column: undeclared,
            }),
            None => Ok(column),
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            RuleKind::PerRow(_) => "per_row",
            RuleKind::Batch(_) => "batch",
        };
        f.debug_struct("Rule")
            .field("output", &self.output)
            .field("reads", &self.reads)
            .field("kind", &kind)
            .finish()
    }
}

/// Rules evaluated together against the same accumulated frame. Rules in a
/// group cannot see each other's output.
#[derive(Debug)]
pub struct RuleGroup {
    name: String,
    rules: Vec<Rule>,
}

impl RuleGroup {
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    fn evaluate(&self, frame: &Frame, ctx: &RunContext) -> Result<Vec<(String, Column)>> {
        self.rules
            .iter()
            .map(|rule| Ok((rule.output.clone(), rule.evaluate(&self.name, frame, ctx)?)))
            .collect()
    }
}

#[derive(Debug)]
pub struct DerivationPlan {
    groups: Vec<RuleGroup>,
}

impl DerivationPlan {
    /// Checks that every read refers to a strictly earlier group and that no
    /// output is produced twice.
    pub fn new(groups: Vec<RuleGroup>) -> Result<Self> {
        validate_groups(&groups)?;
        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[RuleGroup] {
        &self.groups
    }

    /// Output columns in the order they appear in the evaluated frame.
    pub fn output_columns(&self) -> Vec<&str> {
        self.groups
            .iter()
            .flat_map(|g| g.rules.iter().map(Rule::output))
            .collect()
    }

    /// Evaluates all groups in order. The result is not yet rounded or
    /// masked; see [`post_process`]. A rule that reads a column it did not
    /// declare fails the whole evaluation.
    pub fn evaluate(&self, ctx: &RunContext) -> Result<Frame> {
        let mut frame = Frame::with_len(ctx.row_count());
        for group in &self.groups {
            let delta = group.evaluate(&frame, ctx)?;
            debug!(
                "Rule group '{}' produced {} columns over {} rows",
                group.name,
                delta.len(),
                frame.len()
            );
            frame.merge(delta)?;
        }
        Ok(frame)
    }
}

fn validate_groups(groups: &[RuleGroup]) -> Result<()> {
    let mut produced: HashSet<&str> = HashSet::new();

    for group in groups {
        for rule in &group.rules {
            if let Some(missing) = rule.reads.iter().find(|r| !produced.contains(r.as_str())) {
                return Err(PositionError::DependencyViolation {
                    group: group.name.clone(),
                    rule: rule.output.clone(),
                    column: missing.clone(),
                });
            }
        }

        let mut in_group: HashSet<&str> = HashSet::new();
        for rule in &group.rules {
            if produced.contains(rule.output.as_str()) || !in_group.insert(rule.output.as_str()) {
                return Err(PositionError::DuplicateColumn {
                    column: rule.output.clone(),
                });
            }
        }
        produced.extend(in_group);
    }

    Ok(())
}

/// Rounds every number to [`ROUND_DECIMALS`] places, then blanks the amount
/// columns of rows whose amount to add is below [`NEGATIVE_MASK_THRESHOLD`].
pub fn post_process(mut frame: Frame) -> Frame {
    for column in frame.columns_mut() {
        for cell in column.iter_mut() {
            if matches!(cell, Value::Number(_)) {
                *cell = cell.rounded(ROUND_DECIMALS);
            }
        }
    }

    let masked_rows: Vec<usize> = frame
        .rows()
        .filter(|row| {
            row.num(out::AMT_TO_ADD_TOTAL)
                .map(|total| total < NEGATIVE_MASK_THRESHOLD)
                .unwrap_or(false)
        })
        .map(|row| row.index())
        .collect();

    if !masked_rows.is_empty() {
        debug!("Masking amount columns on {} rows", masked_rows.len());
        for name in MASKED_AMOUNT_COLUMNS {
            if let Some(column) = frame.column_mut(name) {
                for &row in &masked_rows {
                    column[row] = Value::Missing;
                }
            }
        }
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn context() -> RunContext {
        let sources = SourceTables {
            current_master: Frame::from_rows(
                &["CCLM ID", "Cont Value"],
                vec![
                    vec![Value::text("C1"), Value::Number(100.0)],
                    vec![Value::text("C2"), Value::Number(250.0)],
                ],
            )
            .unwrap(),
            previous_master: Frame::from_rows(&["CCLM ID"], vec![]).unwrap(),
            collections: Frame::from_rows(&["CCLMID"], vec![]).unwrap(),
            billing: Frame::from_rows(&["Contract No."], vec![]).unwrap(),
            ..Default::default()
        };
        let month = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let runtime = RuntimeContext::for_month(month).unwrap();
        RunContext::new(&sources, runtime, ResolvedOverrides::default(), "Q4F9RES").unwrap()
    }

    fn master_value(column: &'static str) -> Rule {
        Rule::per_row(column, &[], move |row, ctx| {
            ctx.master.value(row.index(), column).clone()
        })
    }

    #[test]
    fn test_plan_rejects_sibling_reads() {
        let err = DerivationPlan::new(vec![RuleGroup::new(
            "base",
            vec![
                master_value("Cont Value"),
                Rule::per_row("Double", &["Cont Value"], |_, _| Value::Missing),
            ],
        )])
        .unwrap_err();
        match err {
            PositionError::DependencyViolation { group, rule, column } => {
                assert_eq!(group, "base");
                assert_eq!(rule, "Double");
                assert_eq!(column, "Cont Value");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_plan_rejects_reads_of_later_groups() {
        let err = DerivationPlan::new(vec![
            RuleGroup::new("first", vec![Rule::per_row("A", &["B"], |_, _| Value::Missing)]),
            RuleGroup::new("second", vec![Rule::constant("B", Value::Number(1.0))]),
        ])
        .unwrap_err();
        assert!(matches!(err, PositionError::DependencyViolation { .. }));
    }

    #[test]
    fn test_plan_rejects_duplicate_outputs() {
        let err = DerivationPlan::new(vec![
            RuleGroup::new("first", vec![Rule::constant("A", Value::Number(1.0))]),
            RuleGroup::new("second", vec![Rule::constant("A", Value::Number(2.0))]),
        ])
        .unwrap_err();
        assert!(matches!(err, PositionError::DuplicateColumn { .. }));
    }

    #[test]
    fn test_evaluate_reads_earlier_groups() {
        let plan = DerivationPlan::new(vec![
            RuleGroup::new("base", vec![master_value("Cont Value")]),
            RuleGroup::new(
                "derived",
                vec![
                    Rule::per_row("Double", &["Cont Value"], |row, _| {
                        row.num("Cont Value").map(|v| v * 2.0).into()
                    }),
                    Rule::batch("Total", &["Cont Value"], |frame, _| {
                        let total: f64 = frame.rows().filter_map(|r| r.num("Cont Value")).sum();
                        vec![Value::Number(total); frame.len()]
                    }),
                ],
            ),
        ])
        .unwrap();

        assert_eq!(plan.output_columns(), vec!["Cont Value", "Double", "Total"]);

        let frame = plan.evaluate(&context()).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.value(1, "Double"), &Value::Number(500.0));
        assert_eq!(frame.value(0, "Total"), &Value::Number(350.0));
    }

    #[test]
    fn test_undeclared_read_fails_evaluation() {
        let plan = DerivationPlan::new(vec![RuleGroup::new(
            "first",
            vec![
                Rule::constant("A", Value::Number(1.0)),
                Rule::per_row("B", &[], |row, _| row.get("A").clone()),
            ],
        )])
        .unwrap();

        match plan.evaluate(&context()).unwrap_err() {
            PositionError::DependencyViolation { group, rule, column } => {
                assert_eq!(group, "first");
                assert_eq!(rule, "B");
                assert_eq!(column, "A");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_batch_rule_sees_only_declared_reads() {
        let plan = DerivationPlan::new(vec![
            RuleGroup::new("base", vec![master_value("Cont Value")]),
            RuleGroup::new(
                "derived",
                vec![Rule::batch("Total", &[], |frame, _| {
                    let total: f64 = frame.rows().filter_map(|r| r.num("Cont Value")).sum();
                    vec![Value::Number(total); frame.len()]
                })],
            ),
        ])
        .unwrap();

        let err = plan.evaluate(&context()).unwrap_err();
        assert!(matches!(
            err,
            PositionError::DependencyViolation { ref column, .. } if column == "Cont Value"
        ));
    }

    #[test]
    fn test_batch_rule_with_wrong_length_fails() {
        let plan = DerivationPlan::new(vec![RuleGroup::new(
            "broken",
            vec![Rule::batch("Short", &[], |_, _| vec![Value::Missing])],
        )])
        .unwrap();
        let err = plan.evaluate(&context()).unwrap_err();
        assert!(matches!(err, PositionError::ColumnLengthMismatch { .. }));
    }

    #[test]
    fn test_post_process_rounds_and_masks() {
        let frame = Frame::from_rows(
            &["Acc Collection", "Amt to add-Total", "DEL amt to add", "Label"],
            vec![
                vec![
                    Value::Number(0.1 + 0.2),
                    Value::Number(5.0),
                    Value::Number(1.0 / 3.0),
                    Value::text("keep"),
                ],
                vec![
                    Value::Number(400.0),
                    Value::Number(-10.5),
                    Value::Number(-10.5),
                    Value::text("keep"),
                ],
                vec![
                    Value::Number(400.0),
                    Value::Number(-10.0),
                    Value::Number(0.0),
                    Value::text("keep"),
                ],
            ],
        )
        .unwrap();

        let processed = post_process(frame);
        assert_eq!(processed.value(0, "Acc Collection"), &Value::Number(0.3));
        assert_eq!(processed.value(0, "DEL amt to add"), &Value::Number(0.3333333333));
        assert_eq!(processed.value(1, "Acc Collection"), &Value::Missing);
        assert_eq!(processed.value(1, "Amt to add-Total"), &Value::Missing);
        assert_eq!(processed.value(1, "DEL amt to add"), &Value::Missing);
        assert_eq!(processed.value(1, "Label"), &Value::text("keep"));
        assert_eq!(processed.value(2, "Amt to add-Total"), &Value::Number(-10.0));
    }

    #[test]
    fn test_missing_join_key_is_fatal() {
        let sources = SourceTables {
            current_master: Frame::from_rows(&["CCLM ID"], vec![]).unwrap(),
            previous_master: Frame::from_rows(&["CCLM ID"], vec![]).unwrap(),
            collections: Frame::from_rows(&["Contract"], vec![]).unwrap(),
            billing: Frame::from_rows(&["Contract No."], vec![]).unwrap(),
            ..Default::default()
        };
        let runtime =
            RuntimeContext::for_month(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()).unwrap();
        let err = RunContext::new(&sources, runtime, ResolvedOverrides::default(), "Q4F9RES")
            .unwrap_err();
        match err {
            PositionError::MissingJoinKey { table, column } => {
                assert_eq!(table, "collections");
                assert_eq!(column, "CCLMID");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
