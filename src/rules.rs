//! The fixed, dependency-ordered rule groups that derive the position frame.
//!
//! Missing inputs propagate: arithmetic on a missing operand is missing, and a
//! flag whose condition cannot be evaluated takes its "not flagged" branch.
//! Lookups into the ledger and billing tables read as missing for contracts
//! those tables do not list.

use crate::allocation::{allocate, Allocation, PaymentTerms};
use crate::columns::{
    billing, ledger, master, out, AgingColumns, MilestoneColumns, DEL_COLUMNS, FAC_AGING,
    FAC_COLUMNS, PAC_AGING, PAC_COLUMNS,
};
use crate::context::RuntimeContext;
use crate::dates::normalize;
use crate::engine::{DerivationPlan, Rule, RuleGroup, RunContext};
use crate::error::Result;
use crate::ingestion::{normalize_province, number_or_zero, payment_terms, KeyedTable};
use crate::milestone::{
    days_elapsed, del_lead_time, successor_lead_time, Indicator, LeadTimeBucket, MilestoneDates,
    LEAD_TIME_THRESHOLD_DAYS,
};
use crate::overrides::{apply_balance_override, apply_long_age_override, apply_status_override};
use crate::table::{Column, RowRef, Value};
use crate::targets::QuarterTarget;
use crate::utils::{days_between, quarter_months, quarter_of};
use chrono::Datelike;
use std::collections::HashMap;

/// Amounts above this count as "having value".
pub const HAS_VALUE_THRESHOLD: f64 = 10.0;

const DELAY_FILTER_WINDOW_DAYS: i64 = 45_000;
const CHANGE_ICON_WINDOW_DAYS: i64 = 40_000;

const YES: &str = "Yes";
const HAS_AR: &str = "has AR";
const NO_AR: &str = "no AR";
const OTHERS: &str = "Others";
const FIVE_GC: &str = "5GC";
const NON_FIVE_GC: &str = "non-5GC";
const COM_TO_ACTION: &str = "COM to action";
const DEL_ADVANCE: &str = "DEL Advance";

/// The full derivation for one run. Column names that depend on the run
/// (monthly balances, the long-age column) are fixed here.
pub fn standard_plan(runtime: &RuntimeContext) -> Result<DerivationPlan> {
    DerivationPlan::new(vec![
        identity_group(),
        terms_group(),
        balance_group(),
        allocation_group(),
        indicator_group(),
        lead_time_group(),
        aging_group(),
        filter_group(&runtime.long_age_column),
        balance_history_group(runtime),
        quarter_target_group(),
        compliance_group(runtime),
        cpm_flag_group(),
        cpm_amount_group(),
        milestone_period_group(),
        quarter_split_group(),
        residual_group(),
        billing_group(),
        bucket_group(),
    ])
}

// Row helpers

fn contract_of(row: &RowRef<'_>) -> Option<String> {
    row.get(out::CONTRACT_NO).as_key()
}

fn master_cell<'a>(row: &RowRef<'_>, ctx: &'a RunContext, column: &str) -> &'a Value {
    ctx.master.value(row.index(), column)
}

fn master_key(row: &RowRef<'_>, ctx: &RunContext) -> Option<String> {
    master_cell(row, ctx, master::CONTRACT_ID).as_key()
}

fn flag(condition: bool, label: &str) -> Value {
    if condition {
        Value::text(label)
    } else {
        Value::Missing
    }
}

fn exceeds(row: &RowRef<'_>, column: &str, threshold: f64) -> bool {
    row.num(column).is_some_and(|v| v > threshold)
}

/// Days from the date in `from` to the date in `to`.
fn span(row: &RowRef<'_>, from: &str, to: &str) -> Option<i64> {
    Some(days_between(row.date(from)?, row.date(to)?))
}

fn days_value(days: Option<i64>) -> Value {
    days.map(|d| d as f64).into()
}

fn sum_of(row: &RowRef<'_>, columns: &[&str]) -> Value {
    columns
        .iter()
        .map(|c| row.num(c))
        .sum::<Option<f64>>()
        .into()
}

fn difference(row: &RowRef<'_>, minuend: &str, subtrahends: &[&str]) -> Value {
    let Some(mut value) = row.num(minuend) else {
        return Value::Missing;
    };
    for column in subtrahends {
        match row.num(column) {
            Some(v) => value -= v,
            None => return Value::Missing,
        }
    }
    Value::Number(value)
}

fn is_planned(row: &RowRef<'_>, milestone: MilestoneColumns) -> bool {
    row.is(milestone.indicator, Indicator::Planned.code())
}

fn is_actual(row: &RowRef<'_>, milestone: MilestoneColumns) -> bool {
    row.is(milestone.indicator, Indicator::Actual.code())
}

fn date_columns(milestone: MilestoneColumns) -> [&'static str; 3] {
    [
        milestone.date_previous,
        milestone.date_current,
        milestone.date_actual,
    ]
}

#[derive(Debug, Clone, Copy)]
enum Joined {
    Collections,
    Billing,
}

impl Joined {
    fn table(self, ctx: &RunContext) -> &KeyedTable {
        match self {
            Joined::Collections => &ctx.collections,
            Joined::Billing => &ctx.billing,
        }
    }
}

/// Numeric cell of a joined table; missing for contracts the table does not
/// list and for a column the table lacks, zero for listed contracts with an
/// unreadable cell.
fn joined_number(table: &KeyedTable, contract: Option<&str>, column: &str) -> Value {
    match contract {
        Some(key) if table.contains(key) && table.has_column(column) => {
            number_or_zero(&table.lookup(Some(key), column))
        }
        _ => Value::Missing,
    }
}

// Rule constructors

fn passthrough(output: &'static str, source: &'static str) -> Rule {
    Rule::per_row(output, &[], move |row, ctx| master_cell(&row, ctx, source).clone())
}

fn master_number(output: &'static str, source: &'static str) -> Rule {
    Rule::per_row(output, &[], move |row, ctx| {
        if ctx.master.has_column(source) {
            number_or_zero(master_cell(&row, ctx, source))
        } else {
            Value::Missing
        }
    })
}

fn master_date(output: &'static str, source: &'static str) -> Rule {
    Rule::per_row(output, &[], move |row, ctx| {
        normalize(master_cell(&row, ctx, source)).into_value()
    })
}

fn previous_date(output: &'static str, source: &'static str) -> Rule {
    Rule::per_row(output, &[], move |row, ctx| {
        let key = master_key(&row, ctx);
        normalize(&ctx.previous_master.lookup(key.as_deref(), source)).into_value()
    })
}

fn joined_source(output: &'static str, joined: Joined, source: &'static str) -> Rule {
    Rule::per_row(output, &[], move |row, ctx| {
        let key = master_key(&row, ctx);
        joined_number(joined.table(ctx), key.as_deref(), source)
    })
}

fn joined_by_contract(output: &'static str, joined: Joined, source: &'static str) -> Rule {
    Rule::per_row(output, &[out::CONTRACT_NO], move |row, ctx| {
        joined_number(joined.table(ctx), contract_of(&row).as_deref(), source)
    })
}

// Groups

fn identity_group() -> RuleGroup {
    RuleGroup::new(
        "identity",
        vec![
            Rule::per_row(out::PERIOD, &[], |_, ctx| {
                Value::text(ctx.runtime.current_period.clone())
            }),
            Rule::per_row(out::CONTRACT_NO, &[], |row, ctx| {
                master_key(&row, ctx).map(Value::Text).unwrap_or_default()
            }),
            passthrough(out::CONTRACT_NAME, master::CONTRACT_NAME),
            passthrough(out::CONTRACT_TYPE, master::CONTRACT_TYPE),
            passthrough(out::MARK, master::MARK),
            passthrough(out::CATEGORY_1, master::CATEGORY_1),
            passthrough(out::CATEGORY_2, master::CATEGORY_2),
            passthrough(out::PREVIOUS_VERSION_MARK, master::PREVIOUS_VERSION_MARK),
            passthrough(out::CATEGORY_FA, master::CATEGORY_FA),
            passthrough(out::CATEGORY_PO, master::CATEGORY_PO),
            passthrough(out::CONTRACT_YEAR, master::CONTRACT_YEAR),
            passthrough(out::SCENARIO, master::SCENARIO),
            passthrough(out::PROJECT_DEFINITION, master::PROJECT_DEFINITION),
            passthrough(out::LE, master::LE),
            passthrough(out::BD, master::CUSTOMER_UNIT),
            Rule::per_row(out::PROVINCE, &[], |row, ctx| {
                normalize_province(master_cell(&row, ctx, master::PROVINCE))
            }),
            passthrough(out::PSP, master::PSP),
            passthrough(out::CPM, master::CPM),
            passthrough(out::CPM_DELEGATION, master::CPM_DELEGATION),
            passthrough(out::CPM_LM_SIGNUM, master::CPM_LM_SIGNUM),
            passthrough(out::SITE, master::SITE),
            passthrough(out::CATEGORY, master::CATEGORY),
            master_number(out::CV_COMBO, master::CONT_VALUE),
            master_number(out::CV_OEF, master::OEF_VALUE),
            master_date(out::PD_CREATION_DATE, master::PD_CREATION_DATE),
            master_date(out::ES_APPROVED_DATE, master::ES_APPROVED_DATE),
            master_date(out::SIGNED_DATE, master::SIGNED_DATE),
            master_date(out::FIRST_DELIVERY_DATE, master::FIRST_DELIVERY_DATE),
            master_date(out::LAST_OA_DATE, master::LAST_OA_DATE),
            master_date(out::LAST_POD_DATE, master::LAST_POD_DATE),
            previous_date(DEL_COLUMNS.date_previous, master::DAC_DATE_PREVIOUS),
            master_date(DEL_COLUMNS.date_current, master::DAC_DATE_CURRENT),
            master_date(DEL_COLUMNS.date_actual, master::DAC_DATE_ACTUAL),
            master_number(DEL_COLUMNS.value, master::DAC_VALUE),
            master_date(out::PAC_BASELINE, master::PAC_BASELINE),
            passthrough(out::PAC_OR_CUTOVER, master::PAC_OR_CUTOVER),
            previous_date(PAC_COLUMNS.date_previous, master::PAC_DATE_PREVIOUS),
            master_date(PAC_COLUMNS.date_current, master::PAC_DATE_CURRENT),
            master_date(PAC_COLUMNS.date_actual, master::PAC_DATE_ACTUAL),
            master_number(PAC_COLUMNS.value, master::PAC_VALUE),
            master_date(out::FAC_BASELINE, master::FAC_BASELINE),
            previous_date(FAC_COLUMNS.date_previous, master::FAC_DATE_PREVIOUS),
            master_date(FAC_COLUMNS.date_current, master::FAC_DATE_CURRENT),
            master_date(FAC_COLUMNS.date_actual, master::FAC_DATE_ACTUAL),
            master_number(FAC_COLUMNS.value, master::FAC_VALUE),
            master_number(out::ACC_COLLECTION_COMBO, master::ACC_COLLECTION),
            master_number(out::ACC_COLLECTION_PCT, master::ACC_COLLECTION_PCT),
            passthrough(out::HAVE_PO, master::HAVE_PO),
            passthrough(out::UPDATED_ON, master::UPDATED_ON),
            passthrough(out::EARLY_COLLECTION, master::EARLY_COLLECTION),
            passthrough(out::BACK_STOP, master::BACK_STOP),
            passthrough(out::ALERT_MESSAGE, master::ALERT_MESSAGE),
            passthrough(out::REASON, master::REASON),
            passthrough(out::CPM_COMMENTS, master::CPM_COMMENTS),
            joined_source(out::UNBILLED, Joined::Billing, billing::UNBILLED_TOTAL),
            joined_source(out::BILLED, Joined::Billing, billing::BILLED_TOTAL),
            joined_source(out::BILLED_NOT_DUE, Joined::Billing, billing::BILLED_NOT_DUE),
            joined_source(out::BILLED_OVERDUE, Joined::Billing, billing::BILLED_OVERDUE),
            Rule::per_row(out::PAYTERM, &[], |row, ctx| {
                let key = master_key(&row, ctx);
                match key.as_deref() {
                    Some(k)
                        if ctx.billing.contains(k)
                            && ctx.billing.has_column(billing::PAYMENT_TERM) =>
                    {
                        let term = ctx.billing.lookup(Some(k), billing::PAYMENT_TERM);
                        if term.is_na() {
                            Value::Number(0.0)
                        } else {
                            term
                        }
                    }
                    _ => Value::Missing,
                }
            }),
            joined_source(out::ACC_COLLECTION, Joined::Collections, ledger::COLLECTION),
        ],
    )
}

fn term_rule(output: &'static str, pick: fn(&PaymentTerms) -> f64) -> Rule {
    Rule::per_row(output, &[out::PAYTERM], move |row, _| {
        Value::Number(pick(&payment_terms(row.get(out::PAYTERM))))
    })
}

fn terms_group() -> RuleGroup {
    RuleGroup::new(
        "payment terms",
        vec![
            Rule::per_row(out::AR_INDICATOR, &[out::UNBILLED, out::BILLED], |row, _| {
                let unbilled = row.get(out::UNBILLED);
                let billed = row.get(out::BILLED);
                if unbilled.is_na() && billed.is_na() {
                    return Value::Missing;
                }
                let zero = |v: &Value| v.as_f64() == Some(0.0);
                if zero(unbilled) && zero(billed) {
                    Value::text(NO_AR)
                } else {
                    Value::text(HAS_AR)
                }
            }),
            term_rule(out::DAC_TERM, |t| t.dac),
            term_rule(out::PAC_TERM, |t| t.pac),
            term_rule(out::FAC_TERM, |t| t.fac),
            term_rule(out::ACT_TERM, |t| t.act),
        ],
    )
}

fn balance_group() -> RuleGroup {
    RuleGroup::new(
        "balance to add",
        vec![Rule::per_row(
            out::AMT_TO_ADD_TOTAL,
            &[out::CONTRACT_NO, out::CV_OEF, out::ACC_COLLECTION],
            |row, ctx| {
                let computed = match (row.num(out::CV_OEF), row.num(out::ACC_COLLECTION)) {
                    (Some(value), Some(collected)) => Value::Number(value - collected),
                    _ => Value::Missing,
                };
                apply_balance_override(
                    contract_of(&row).as_deref(),
                    computed,
                    ctx.overrides.balance.as_ref(),
                )
            },
        )],
    )
}

const ALLOCATION_READS: [&str; 6] = [
    out::AMT_TO_ADD_TOTAL,
    out::CV_OEF,
    out::DAC_TERM,
    out::PAC_TERM,
    out::FAC_TERM,
    out::ACT_TERM,
];

fn allocation_of(row: &RowRef<'_>) -> Option<Allocation> {
    let total = row.num(out::AMT_TO_ADD_TOTAL)?;
    let contract_value = row.num(out::CV_OEF)?;
    let term = |column: &str| row.num(column).unwrap_or(0.0);
    let terms = PaymentTerms {
        dac: term(out::DAC_TERM),
        pac: term(out::PAC_TERM),
        fac: term(out::FAC_TERM),
        act: term(out::ACT_TERM),
    };
    Some(allocate(total, &terms, contract_value))
}

fn allocation_group() -> RuleGroup {
    RuleGroup::new(
        "allocation",
        vec![
            Rule::per_row(out::DEL_AMT_TO_ADD, &ALLOCATION_READS, |row, _| {
                allocation_of(&row).map(|a| a.del).into()
            }),
            Rule::per_row(out::PAC_AMT_TO_ADD, &ALLOCATION_READS, |row, _| {
                allocation_of(&row).map(|a| a.pac).into()
            }),
            Rule::per_row(out::FAC_AMT_TO_ADD, &ALLOCATION_READS, |row, _| {
                allocation_of(&row).map(|a| a.fac).into()
            }),
        ],
    )
}

fn indicator_group() -> RuleGroup {
    let rules = [DEL_COLUMNS, PAC_COLUMNS, FAC_COLUMNS]
        .into_iter()
        .map(|m| {
            Rule::per_row(m.indicator, &[m.date_actual], move |row, _| {
                Value::text(Indicator::from_actual(row.date(m.date_actual)).code())
            })
        })
        .collect();
    RuleGroup::new("indicators", rules)
}

fn successor_lead_time_rule(successor: MilestoneColumns, predecessor: MilestoneColumns) -> Rule {
    Rule::per_row(successor.lead_time, &date_columns(successor), move |row, _| {
        let pred = MilestoneDates::from_row(&row, &predecessor);
        let succ = MilestoneDates::from_row(&row, &successor);
        days_value(successor_lead_time(&pred, &succ))
    })
    .also_reads(date_columns(predecessor))
    .also_reads([predecessor.indicator, successor.indicator])
}

fn lead_time_group() -> RuleGroup {
    RuleGroup::new(
        "lead times",
        vec![
            Rule::per_row(DEL_COLUMNS.lead_time, &date_columns(DEL_COLUMNS), |row, _| {
                let del = MilestoneDates::from_row(&row, &DEL_COLUMNS);
                days_value(del_lead_time(row.date(out::FIRST_DELIVERY_DATE), &del))
            })
            .also_reads([out::FIRST_DELIVERY_DATE, DEL_COLUMNS.indicator]),
            successor_lead_time_rule(PAC_COLUMNS, DEL_COLUMNS),
            successor_lead_time_rule(FAC_COLUMNS, PAC_COLUMNS),
        ],
    )
}

fn group_key(row: &RowRef<'_>, indicator: &str) -> Option<(String, String, String)> {
    Some((
        row.get(out::CATEGORY_1).to_display_string()?,
        row.get(out::BD).to_display_string()?,
        row.get(indicator).to_display_string()?,
    ))
}

/// Mean lead time within (Category 1, BD, indicator); rows with any part of
/// the key missing get no average.
fn average_lead_time(aging: AgingColumns, subject: MilestoneColumns) -> Rule {
    Rule::batch(
        aging.avg_lead_time,
        &[out::CATEGORY_1, out::BD, subject.indicator, subject.lead_time],
        move |frame, _| {
            let mut sums: HashMap<(String, String, String), (f64, usize)> = HashMap::new();
            for row in frame.rows() {
                if let (Some(key), Some(lead_time)) =
                    (group_key(&row, subject.indicator), row.num(subject.lead_time))
                {
                    let entry = sums.entry(key).or_insert((0.0, 0));
                    entry.0 += lead_time;
                    entry.1 += 1;
                }
            }
            frame
                .rows()
                .map(|row| {
                    let mean = group_key(&row, subject.indicator)
                        .and_then(|key| sums.get(&key))
                        .map(|&(sum, count)| sum / count as f64);
                    Value::from(mean)
                })
                .collect::<Column>()
        },
    )
}

fn aging_rules(
    aging: AgingColumns,
    subject: MilestoneColumns,
    since: MilestoneColumns,
) -> [Rule; 6] {
    let threshold = LEAD_TIME_THRESHOLD_DAYS;
    [
        average_lead_time(aging, subject),
        Rule::per_row(aging.over_185, &[subject.lead_time], move |row, _| {
            let over = row.num(subject.lead_time).is_some_and(|d| d > threshold as f64);
            Value::text(if over { aging.over_185_label } else { "" })
        }),
        Rule::per_row(aging.days_elapsed, &date_columns(since), move |row, ctx| {
            let dates = MilestoneDates::from_row(&row, &since);
            days_value(days_elapsed(ctx.runtime.ref_date, &dates))
        }),
        Rule::per_row(aging.amt_elapsed, &date_columns(since), move |row, ctx| {
            let dates = MilestoneDates::from_row(&row, &since);
            let aged = days_elapsed(ctx.runtime.ref_date, &dates).is_some_and(|d| d >= threshold);
            if aged {
                row.get(subject.amt_to_add).clone()
            } else {
                Value::Number(0.0)
            }
        })
        .also_reads([subject.amt_to_add]),
        Rule::per_row(aging.lead_time_last_month, &[out::CONTRACT_NO], move |row, ctx| {
            ctx.snapshot_value(contract_of(&row).as_deref(), subject.lead_time)
                .as_f64()
                .into()
        }),
        Rule::per_row(
            aging.lead_time_change,
            &[out::CONTRACT_NO, subject.lead_time],
            move |row, ctx| {
                let last = ctx
                    .snapshot_value(contract_of(&row).as_deref(), subject.lead_time)
                    .as_f64();
                match (last, row.num(subject.lead_time)) {
                    (Some(last), Some(current)) => Value::Number(last - current),
                    _ => Value::Missing,
                }
            },
        ),
    ]
}

fn aging_group() -> RuleGroup {
    let rules = aging_rules(PAC_AGING, PAC_COLUMNS, DEL_COLUMNS)
        .into_iter()
        .chain(aging_rules(FAC_AGING, FAC_COLUMNS, PAC_COLUMNS))
        .collect();
    RuleGroup::new("aging", rules)
}

fn has_value(output: &'static str, amount: &'static str) -> Rule {
    Rule::per_row(output, &[amount], move |row, _| {
        flag(exceeds(&row, amount, HAS_VALUE_THRESHOLD), YES)
    })
}

/// A still-planned milestone whose current date slipped later than last
/// period's.
fn is_delayed(row: &RowRef<'_>, milestone: MilestoneColumns) -> bool {
    row.date(milestone.date_actual).is_none()
        && span(row, milestone.date_previous, milestone.date_current)
            .is_some_and(|d| d > 0 && d < DELAY_FILTER_WINDOW_DAYS)
}

fn delay_filter(aging: AgingColumns, milestone: MilestoneColumns) -> Rule {
    Rule::per_row(aging.delay_filter, &date_columns(milestone), move |row, _| {
        flag(is_delayed(&row, milestone), YES)
    })
}

fn filter_group(long_age_column: &str) -> RuleGroup {
    let mut delay_reads: Vec<&str> = date_columns(PAC_COLUMNS).to_vec();
    delay_reads.extend(date_columns(FAC_COLUMNS));

    RuleGroup::new(
        "qualitative filters",
        vec![
            Rule::per_row(out::FIVE_GC, &[out::CATEGORY_1], |row, _| {
                let is_5gc = row.text(out::CATEGORY_1).is_some_and(|c| c.contains(FIVE_GC));
                Value::text(if is_5gc { FIVE_GC } else { NON_FIVE_GC })
            }),
            has_value(out::IF_AMT_HAS_VALUE, out::AMT_TO_ADD_TOTAL),
            has_value(out::IF_DEL_HAS_VALUE, out::DEL_AMT_TO_ADD),
            has_value(PAC_AGING.if_has_value, out::PAC_AMT_TO_ADD),
            has_value(FAC_AGING.if_has_value, out::FAC_AMT_TO_ADD),
            delay_filter(PAC_AGING, PAC_COLUMNS),
            delay_filter(FAC_AGING, FAC_COLUMNS),
            Rule::per_row(out::PAC_FAC_DELAY_FILTER, &delay_reads, |row, _| {
                flag(is_delayed(&row, PAC_COLUMNS) || is_delayed(&row, FAC_COLUMNS), YES)
            }),
            Rule::per_row(out::PO_CLOSED, &[out::CONTRACT_NO], |row, ctx| {
                apply_status_override(contract_of(&row).as_deref(), ctx.overrides.status.as_ref())
            }),
            Rule::per_row(long_age_column.to_string(), &[out::CONTRACT_NO], |row, ctx| {
                apply_long_age_override(
                    contract_of(&row).as_deref(),
                    ctx.overrides.long_age.as_ref(),
                )
            }),
        ],
    )
}

/// Monthly balances: earlier months carried from the snapshot, the reporting
/// month from this run, later months empty. Cash landings start at zero.
fn balance_history_group(runtime: &RuntimeContext) -> RuleGroup {
    let reporting = (runtime.current_year, runtime.current_month);

    let mut rules: Vec<Rule> = runtime
        .monthly_balance_columns()
        .into_iter()
        .map(|(name, year, month)| {
            if (year, month) < reporting {
                let carried = name.clone();
                Rule::per_row(name, &[out::CONTRACT_NO], move |row, ctx| {
                    ctx.snapshot_value(contract_of(&row).as_deref(), &carried)
                })
            } else if (year, month) == reporting {
                Rule::per_row(name, &[out::AMT_TO_ADD_TOTAL], |row, _| {
                    row.get(out::AMT_TO_ADD_TOTAL).clone()
                })
            } else {
                Rule::constant(name, Value::Missing)
            }
        })
        .collect();

    rules.extend(
        (1..=12).map(|month| Rule::constant(out::cash_landing(month), Value::Number(0.0))),
    );
    RuleGroup::new("balance history", rules)
}

fn quarter_landing(row: &RowRef<'_>, quarter: u32) -> f64 {
    quarter_months(quarter)
        .filter_map(|month| row.num(&out::cash_landing(month)))
        .sum()
}

fn resolve_target(row: &RowRef<'_>, ctx: &RunContext, quarter: u32) -> QuarterTarget {
    ctx.targets.resolve(
        contract_of(row).as_deref(),
        quarter,
        Some(quarter_landing(row, quarter)),
    )
}

fn quarter_target_group() -> RuleGroup {
    let landing_reads = |quarter: u32| quarter_months(quarter).map(out::cash_landing);

    let mut rules: Vec<Rule> = (1..=4u32)
        .map(|quarter| {
            Rule::per_row(out::quarter_landing(quarter), &[], move |row, _| {
                Value::Number(quarter_landing(&row, quarter))
            })
            .also_reads(landing_reads(quarter))
        })
        .collect();

    for quarter in 1..=4u32 {
        rules.push(
            Rule::per_row(out::quarter_target(quarter), &[out::CONTRACT_NO], move |row, ctx| {
                resolve_target(&row, ctx, quarter).target
            })
            .also_reads(landing_reads(quarter)),
        );
        rules.push(
            Rule::per_row(
                out::quarter_target_balance(quarter),
                &[out::CONTRACT_NO],
                move |row, ctx| resolve_target(&row, ctx, quarter).balance,
            )
            .also_reads(landing_reads(quarter)),
        );
    }

    RuleGroup::new("quarter targets", rules)
}

fn change_icon(aging: AgingColumns, milestone: MilestoneColumns) -> Rule {
    Rule::per_row(
        aging.change_icon,
        &[
            milestone.date_previous,
            milestone.date_current,
            milestone.indicator,
            out::AMT_TO_ADD_TOTAL,
        ],
        move |row, _| {
            let slipped = span(&row, milestone.date_previous, milestone.date_current)
                .is_some_and(|d| d > 0 && d < CHANGE_ICON_WINDOW_DAYS);
            flag(
                slipped
                    && exceeds(&row, out::AMT_TO_ADD_TOTAL, HAS_VALUE_THRESHOLD)
                    && is_planned(&row, milestone),
                aging.change_icon_label,
            )
        },
    )
}

fn compliance_group(runtime: &RuntimeContext) -> RuleGroup {
    let long_age_column = runtime.long_age_column.clone();
    let long_age_flag = runtime.long_age_flag();

    RuleGroup::new(
        "compliance",
        vec![
            Rule::per_row(
                out::FILTER_FOR_COM,
                &[
                    PAC_AGING.over_185,
                    FAC_AGING.over_185,
                    out::AMT_TO_ADD_TOTAL,
                    PAC_COLUMNS.indicator,
                    FAC_COLUMNS.indicator,
                ],
                {
                    let long_age_column = long_age_column.clone();
                    move |row, _| {
                        let has_value = exceeds(&row, out::AMT_TO_ADD_TOTAL, HAS_VALUE_THRESHOLD);
                        let pac = row.is(PAC_AGING.over_185, PAC_AGING.over_185_label)
                            && has_value
                            && is_planned(&row, PAC_COLUMNS);
                        let fac = row.is(FAC_AGING.over_185, FAC_AGING.over_185_label)
                            && has_value
                            && is_planned(&row, FAC_COLUMNS);
                        let long_aged = row.is(&long_age_column, &long_age_flag);
                        flag(pac || fac || long_aged, COM_TO_ACTION)
                    }
                },
            )
            .also_reads([long_age_column]),
            Rule::constant(
                out::LEAD_TIME_THRESHOLD,
                Value::Number(LEAD_TIME_THRESHOLD_DAYS as f64),
            ),
            Rule::per_row(
                out::DEL_CHANGE_ICON,
                &[
                    DEL_COLUMNS.date_current,
                    DEL_COLUMNS.date_actual,
                    DEL_COLUMNS.indicator,
                    FAC_COLUMNS.indicator,
                    out::AMT_TO_ADD_TOTAL,
                ],
                |row, _| {
                    let advanced = span(&row, DEL_COLUMNS.date_current, DEL_COLUMNS.date_actual)
                        .is_some_and(|d| d < 0 && d > -CHANGE_ICON_WINDOW_DAYS);
                    flag(
                        advanced
                            && exceeds(&row, out::AMT_TO_ADD_TOTAL, HAS_VALUE_THRESHOLD)
                            && is_actual(&row, DEL_COLUMNS)
                            && is_planned(&row, FAC_COLUMNS),
                        DEL_ADVANCE,
                    )
                },
            ),
            change_icon(PAC_AGING, PAC_COLUMNS),
            change_icon(FAC_AGING, FAC_COLUMNS),
        ],
    )
}

fn cpm_flag_group() -> RuleGroup {
    RuleGroup::new(
        "cpm flags",
        vec![
            Rule::per_row(
                PAC_AGING.over_185_cpm,
                &[
                    PAC_AGING.over_185,
                    PAC_COLUMNS.indicator,
                    out::CATEGORY_2,
                    out::AR_INDICATOR,
                    PAC_AGING.if_has_value,
                ],
                |row, _| {
                    flag(
                        row.is(PAC_AGING.over_185, PAC_AGING.over_185_label)
                            && is_planned(&row, PAC_COLUMNS)
                            && !row.is(out::CATEGORY_2, OTHERS)
                            && row.is(out::AR_INDICATOR, HAS_AR)
                            && row.is(PAC_AGING.if_has_value, YES),
                        PAC_AGING.over_185_cpm_label,
                    )
                },
            ),
            Rule::per_row(
                FAC_AGING.over_185_cpm,
                &[
                    FAC_AGING.over_185,
                    out::CATEGORY_2,
                    out::AMT_TO_ADD_TOTAL,
                    FAC_COLUMNS.indicator,
                    FAC_AGING.if_has_value,
                ],
                |row, _| {
                    flag(
                        row.is(FAC_AGING.over_185, FAC_AGING.over_185_label)
                            && !row.is(out::CATEGORY_2, OTHERS)
                            && exceeds(&row, out::AMT_TO_ADD_TOTAL, HAS_VALUE_THRESHOLD)
                            && is_planned(&row, FAC_COLUMNS)
                            && row.is(FAC_AGING.if_has_value, YES),
                        FAC_AGING.over_185_cpm_label,
                    )
                },
            ),
        ],
    )
}

fn over_185_amount(aging: AgingColumns, milestone: MilestoneColumns) -> Rule {
    Rule::per_row(
        aging.over_185_amt,
        &[aging.over_185_cpm, milestone.amt_to_add],
        move |row, _| {
            if row.is(aging.over_185_cpm, aging.over_185_cpm_label) {
                row.get(milestone.amt_to_add).clone()
            } else {
                Value::Number(0.0)
            }
        },
    )
}

fn cpm_amount_group() -> RuleGroup {
    RuleGroup::new(
        "cpm amounts",
        vec![
            over_185_amount(PAC_AGING, PAC_COLUMNS),
            over_185_amount(FAC_AGING, FAC_COLUMNS),
        ],
    )
}

fn milestone_period_group() -> RuleGroup {
    let rules = [(PAC_AGING, PAC_COLUMNS), (FAC_AGING, FAC_COLUMNS)]
        .into_iter()
        .flat_map(|(aging, milestone)| {
            [
                Rule::per_row(aging.by_year, &[milestone.date_current], move |row, _| {
                    row.date(milestone.date_current)
                        .map(|d| d.year() as f64)
                        .into()
                }),
                Rule::per_row(aging.by_quarter, &[milestone.date_current], move |row, _| {
                    row.date(milestone.date_current)
                        .map(|d| quarter_of(d) as f64)
                        .into()
                }),
            ]
        })
        .collect();
    RuleGroup::new("milestone period", rules)
}

/// The flagged >185 amount when the milestone is planned for `year` (and,
/// when given, `quarter`), zero otherwise.
fn split_amount(row: &RowRef<'_>, aging: AgingColumns, year: i32, quarter: Option<u32>) -> Value {
    let flagged = row.is(aging.over_185_cpm, aging.over_185_cpm_label);
    let in_year = row.num(aging.by_year) == Some(year as f64);
    let in_quarter = quarter.map_or(true, |q| row.num(aging.by_quarter) == Some(q as f64));
    if flagged && in_year && in_quarter {
        row.get(aging.over_185_amt).clone()
    } else {
        Value::Number(0.0)
    }
}

fn split_rules(aging: AgingColumns) -> Vec<Rule> {
    let reads = [
        aging.over_185_cpm,
        aging.by_year,
        aging.by_quarter,
        aging.over_185_amt,
    ];
    let mut rules: Vec<Rule> = (1..=4u32)
        .map(|quarter| {
            Rule::per_row(aging.in_quarter[(quarter - 1) as usize], &reads, move |row, ctx| {
                split_amount(&row, aging, ctx.runtime.current_year, Some(quarter))
            })
        })
        .collect();
    rules.push(Rule::per_row(aging.after_q4, &reads, move |row, ctx| {
        split_amount(&row, aging, ctx.runtime.current_year + 1, None)
    }));
    rules
}

fn quarter_split_group() -> RuleGroup {
    let rules = split_rules(PAC_AGING)
        .into_iter()
        .chain(split_rules(FAC_AGING))
        .collect();
    RuleGroup::new("quarter splits", rules)
}

/// What is left of the >185 amount after the named buckets. Q1 is not
/// subtracted, matching the published report.
fn residual(row: &RowRef<'_>, aging: AgingColumns) -> Value {
    difference(
        row,
        aging.over_185_amt,
        &[
            aging.in_quarter[1],
            aging.in_quarter[2],
            aging.in_quarter[3],
            aging.after_q4,
        ],
    )
}

fn residual_reads(aging: AgingColumns) -> [&'static str; 5] {
    [
        aging.over_185_amt,
        aging.in_quarter[1],
        aging.in_quarter[2],
        aging.in_quarter[3],
        aging.after_q4,
    ]
}

fn residual_group() -> RuleGroup {
    let mut rules = vec![
        Rule::per_row(PAC_AGING.other, &residual_reads(PAC_AGING), |row, _| {
            residual(&row, PAC_AGING)
        }),
        Rule::per_row(FAC_AGING.other, &residual_reads(FAC_AGING), |row, _| {
            residual(&row, FAC_AGING)
        }),
    ];

    for quarter in 1..=4u32 {
        let slot = (quarter - 1) as usize;
        let parts = [PAC_AGING.in_quarter[slot], FAC_AGING.in_quarter[slot]];
        rules.push(Rule::per_row(
            out::combined_in_quarter(quarter),
            &parts,
            move |row, _| sum_of(&row, &parts),
        ));
    }

    let after = [PAC_AGING.after_q4, FAC_AGING.after_q4];
    rules.push(Rule::per_row(out::PAC_FAC_AFTER_Q4, &after, move |row, _| {
        sum_of(&row, &after)
    }));

    rules.push(
        Rule::per_row(out::PAC_FAC_OTHER, &residual_reads(PAC_AGING), |row, _| {
            match (residual(&row, PAC_AGING).as_f64(), residual(&row, FAC_AGING).as_f64()) {
                (Some(pac), Some(fac)) => Value::Number(pac + fac),
                _ => Value::Missing,
            }
        })
        .also_reads(residual_reads(FAC_AGING)),
    );

    let amounts = [PAC_AGING.over_185_amt, FAC_AGING.over_185_amt];
    rules.push(Rule::per_row(out::PAC_FAC_OVER_185_TOTAL, &amounts, move |row, _| {
        sum_of(&row, &amounts)
    }));

    RuleGroup::new("split residuals", rules)
}

fn billing_group() -> RuleGroup {
    RuleGroup::new(
        "billing",
        vec![
            joined_by_contract(out::BILLED_DEL, Joined::Billing, billing::BILLED_DEL),
            joined_by_contract(out::BILLED_PAC, Joined::Billing, billing::BILLED_PAC),
            joined_by_contract(out::BILLED_FAC, Joined::Billing, billing::BILLED_FAC),
            joined_by_contract(out::BILLED_ACT, Joined::Billing, billing::BILLED_ACT),
            joined_by_contract(out::BILLED_TOTAL, Joined::Billing, billing::BILLED_TOTAL),
            joined_by_contract(out::TOTAL_AR, Joined::Billing, billing::TOTAL_AR),
        ],
    )
}

fn bucket_rule(aging: AgingColumns, milestone: MilestoneColumns) -> Rule {
    Rule::per_row(aging.lead_time_node, &[milestone.lead_time], move |row, _| {
        row.num(milestone.lead_time)
            .and_then(LeadTimeBucket::classify)
            .map(|bucket| Value::text(bucket.label(aging.prefix)))
            .unwrap_or_default()
    })
}

fn bucket_group() -> RuleGroup {
    RuleGroup::new(
        "lead time buckets",
        vec![
            bucket_rule(PAC_AGING, PAC_COLUMNS),
            bucket_rule(FAC_AGING, FAC_COLUMNS),
            Rule::per_row(
                out::DAC_LEADTIME_D3_D2,
                &[
                    DEL_COLUMNS.indicator,
                    DEL_COLUMNS.date_current,
                    DEL_COLUMNS.date_actual,
                    out::LAST_POD_DATE,
                ],
                |row, _| {
                    let end = if is_actual(&row, DEL_COLUMNS) {
                        DEL_COLUMNS.date_actual
                    } else {
                        DEL_COLUMNS.date_current
                    };
                    days_value(span(&row, out::LAST_POD_DATE, end))
                },
            ),
            Rule::per_row(
                out::DAC_LEADTIME_D2_D1,
                &[out::SIGNED_DATE, out::LAST_POD_DATE],
                |row, _| days_value(span(&row, out::SIGNED_DATE, out::LAST_POD_DATE)),
            ),
        ],
    )
}
