//! Downstream report views over a derived position frame.
//!
//! Each view is a row filter plus a fixed column list, with a handful of
//! columns added for the report itself. Views never change the values they
//! copy from the frame.

use crate::columns::{
    out, AgingColumns, MilestoneColumns, DEL_COLUMNS, FAC_AGING, FAC_COLUMNS, PAC_AGING,
    PAC_COLUMNS,
};
use crate::context::RuntimeContext;
use crate::error::{PositionError, Result};
use crate::milestone::LeadTimeBucket;
use crate::table::{Column, Frame, RowRef, Value};
use log::debug;

const YES: &str = "Yes";
const HAS_AR: &str = "has AR";
const CLOSED: &str = "close";

pub const CURRENT_MONTH: &str = "Current month";
pub const CURRENT_MONTH_FILTER: &str = "Current month filter";
pub const CURRENT_TARGET: &str = "Current target";
pub const CURRENT_TARGET_BALANCE: &str = "Current Q Target balance";
pub const CURRENT_LANDING: &str = "Current Q Landing";
pub const COMBINED_OVER_185: &str = "PAC/FAC amt. > 185 days";
pub const COMBINED_OVER_185_LAST_MONTH: &str = "PAC/FAC amt. > 185 days as of last month";

/// The four report views of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReports {
    pub long_age: Frame,
    pub above_185: Frame,
    pub tm_pac: Frame,
    pub tm_fac: Frame,
}

pub fn build_reports(frame: &Frame, runtime: &RuntimeContext) -> Result<PositionReports> {
    let reports = PositionReports {
        long_age: long_age_report(frame, runtime)?,
        above_185: above_185_report(frame)?,
        tm_pac: tm_pac_report(frame, runtime)?,
        tm_fac: tm_fac_report(frame, runtime)?,
    };
    debug!(
        "Reports built: long age {} rows, >185 {} rows, TM-PAC {} rows, TM-FAC {} rows",
        reports.long_age.len(),
        reports.above_185.len(),
        reports.tm_pac.len(),
        reports.tm_fac.len()
    );
    Ok(reports)
}

fn copy_column(frame: &Frame, name: &str) -> Result<Column> {
    frame
        .column(name)
        .cloned()
        .ok_or_else(|| PositionError::MissingColumn(name.to_string()))
}

fn repeated(frame: &Frame, value: &str) -> Column {
    vec![Value::text(value); frame.len()]
}

/// A PO counts as open unless its status reads "close"; a missing status is
/// not open either.
fn is_open(status: &Value) -> bool {
    status
        .to_display_string()
        .is_some_and(|s| s.trim().to_lowercase() != CLOSED)
}

fn long_age_columns(runtime: &RuntimeContext) -> Vec<&str> {
    vec![
        out::PERIOD,
        out::BD,
        out::PROVINCE,
        out::CONTRACT_NO,
        out::CONTRACT_NAME,
        out::CATEGORY_1,
        out::CATEGORY_2,
        out::FIVE_GC,
        out::CPM,
        out::REASON,
        out::AMT_TO_ADD_TOTAL,
        out::DEL_AMT_TO_ADD,
        out::PAC_AMT_TO_ADD,
        out::FAC_AMT_TO_ADD,
        runtime.long_age_column.as_str(),
    ]
}

/// Open contracts carrying the long-age flag, with the quarter landings and
/// the current quarter's target figures appended.
pub fn long_age_report(frame: &Frame, runtime: &RuntimeContext) -> Result<Frame> {
    let flag = runtime.long_age_flag();
    let selected = frame.filter_rows(|row| {
        row.is(&runtime.long_age_column, &flag) && is_open(row.get(out::PO_CLOSED))
    });

    let mut report = selected.select_columns(&long_age_columns(runtime))?;
    for quarter in 1..=4 {
        report.push_column(
            format!("Sum of Q{} landing", quarter),
            copy_column(&selected, &out::quarter_landing(quarter))?,
        )?;
    }

    let quarter = runtime.current_quarter;
    report.push_column(
        CURRENT_TARGET,
        copy_column(&selected, &out::quarter_target(quarter))?,
    )?;
    report.push_column(
        CURRENT_TARGET_BALANCE,
        copy_column(&selected, &out::quarter_target_balance(quarter))?,
    )?;
    report.push_column(
        CURRENT_LANDING,
        copy_column(&selected, &out::quarter_landing(quarter))?,
    )?;
    report.push_column(CURRENT_MONTH, repeated(&selected, YES))?;
    Ok(report)
}

const ABOVE_185_COLUMNS: [&str; 40] = [
    out::PERIOD,
    out::PAYTERM,
    out::BD,
    out::PROVINCE,
    out::CONTRACT_YEAR,
    out::SIGNED_DATE,
    out::FIRST_DELIVERY_DATE,
    out::CONTRACT_NO,
    out::CATEGORY_1,
    out::CATEGORY_2,
    DEL_COLUMNS.date_current,
    DEL_COLUMNS.date_actual,
    PAC_COLUMNS.date_current,
    PAC_COLUMNS.date_actual,
    FAC_COLUMNS.date_current,
    FAC_COLUMNS.date_actual,
    PAC_COLUMNS.lead_time,
    FAC_COLUMNS.lead_time,
    DEL_COLUMNS.indicator,
    PAC_COLUMNS.indicator,
    FAC_COLUMNS.indicator,
    out::REASON,
    PAC_COLUMNS.date_previous,
    FAC_COLUMNS.date_previous,
    out::DEL_CHANGE_ICON,
    PAC_AGING.change_icon,
    FAC_AGING.change_icon,
    out::CPM,
    out::AMT_TO_ADD_TOTAL,
    out::DEL_AMT_TO_ADD,
    out::PAC_AMT_TO_ADD,
    out::FAC_AMT_TO_ADD,
    PAC_AGING.days_elapsed,
    PAC_AGING.amt_elapsed,
    FAC_AGING.days_elapsed,
    FAC_AGING.amt_elapsed,
    COMBINED_OVER_185,
    COMBINED_OVER_185_LAST_MONTH,
    CURRENT_MONTH_FILTER,
    out::FIVE_GC,
];

fn is_added_by_report(column: &str) -> bool {
    [COMBINED_OVER_185, COMBINED_OVER_185_LAST_MONTH, CURRENT_MONTH_FILTER].contains(&column)
}

fn over_185_with_ar(row: RowRef<'_>, aging: AgingColumns) -> bool {
    row.is(aging.over_185, aging.over_185_label)
        && row.is(aging.if_has_value, YES)
        && row.is(out::AR_INDICATOR, HAS_AR)
}

/// Rows flagged over 185 days for one milestone, labelled with the
/// milestone in `Payterm` and carrying that milestone's amounts.
fn above_185_part(
    frame: &Frame,
    aging: AgingColumns,
    milestone: MilestoneColumns,
) -> Result<Frame> {
    let source_columns: Vec<&str> = ABOVE_185_COLUMNS
        .iter()
        .copied()
        .filter(|c| !is_added_by_report(c))
        .collect();

    let selected = frame.filter_rows(|row| over_185_with_ar(row, aging));
    let mut part = selected
        .select_columns(&source_columns)?
        .with_replaced(out::PAYTERM, repeated(&selected, aging.prefix))?;
    part.push_column(COMBINED_OVER_185, copy_column(&selected, milestone.amt_to_add)?)?;
    part.push_column(
        COMBINED_OVER_185_LAST_MONTH,
        copy_column(&selected, aging.amt_elapsed)?,
    )?;
    part.push_column(CURRENT_MONTH_FILTER, repeated(&selected, YES))?;
    part.select_columns(&ABOVE_185_COLUMNS)
}

/// PAC rows then FAC rows over 185 days with AR outstanding. A contract
/// flagged on both milestones appears once per milestone.
pub fn above_185_report(frame: &Frame) -> Result<Frame> {
    Frame::concat(&[
        above_185_part(frame, PAC_AGING, PAC_COLUMNS)?,
        above_185_part(frame, FAC_AGING, FAC_COLUMNS)?,
    ])
}

/// Rows with a lead-time bucket; each bucket column carries the milestone
/// value on the rows in that bucket.
fn lead_time_extract(
    frame: &Frame,
    runtime: &RuntimeContext,
    aging: AgingColumns,
    milestone: MilestoneColumns,
    base_columns: &[&str],
) -> Result<Frame> {
    let selected = frame.filter_rows(|row| !row.get(aging.lead_time_node).is_na());

    let mut report = Frame::with_len(selected.len());
    for &name in base_columns {
        let column = if name == out::PERIOD {
            repeated(&selected, &runtime.current_period_tm)
        } else {
            copy_column(&selected, name)?
        };
        report.push_column(name, column)?;
    }

    for bucket in LeadTimeBucket::labels(aging.prefix) {
        let column: Column = selected
            .rows()
            .map(|row| {
                if row.is(aging.lead_time_node, &bucket) {
                    row.get(milestone.value).clone()
                } else {
                    Value::Missing
                }
            })
            .collect();
        report.push_column(bucket, column)?;
    }
    report.push_column(CURRENT_MONTH, repeated(&selected, YES))?;
    Ok(report)
}

pub fn tm_pac_report(frame: &Frame, runtime: &RuntimeContext) -> Result<Frame> {
    lead_time_extract(
        frame,
        runtime,
        PAC_AGING,
        PAC_COLUMNS,
        &[
            out::PERIOD,
            out::BD,
            out::PROVINCE,
            out::CATEGORY_1,
            out::CATEGORY_2,
            out::SITE,
            out::CONTRACT_NO,
            out::CONTRACT_NAME,
            out::CONTRACT_YEAR,
            DEL_COLUMNS.date_actual,
            PAC_COLUMNS.date_current,
            PAC_COLUMNS.date_actual,
            PAC_COLUMNS.lead_time,
            PAC_COLUMNS.indicator,
            out::CV_OEF,
            PAC_COLUMNS.value,
            out::FIVE_GC,
        ],
    )
}

pub fn tm_fac_report(frame: &Frame, runtime: &RuntimeContext) -> Result<Frame> {
    lead_time_extract(
        frame,
        runtime,
        FAC_AGING,
        FAC_COLUMNS,
        &[
            out::PERIOD,
            out::BD,
            out::PROVINCE,
            out::CATEGORY_1,
            out::CATEGORY_2,
            out::SITE,
            out::CONTRACT_NO,
            out::CONTRACT_NAME,
            out::CONTRACT_YEAR,
            FAC_COLUMNS.date_current,
            FAC_COLUMNS.date_actual,
            FAC_COLUMNS.lead_time,
            FAC_COLUMNS.indicator,
            out::CV_OEF,
            FAC_COLUMNS.value,
            out::FIVE_GC,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn runtime() -> RuntimeContext {
        RuntimeContext::for_month(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()).unwrap()
    }

    #[test]
    fn test_is_open_status() {
        assert!(is_open(&Value::Number(0.0)));
        assert!(is_open(&Value::text("Open")));
        assert!(!is_open(&Value::text(" Close ")));
        assert!(!is_open(&Value::Missing));
    }

    #[test]
    fn test_long_age_report_filters_and_appends_quarter_columns() {
        let ctx = runtime();
        let mut headers: Vec<String> = long_age_columns(&ctx)
            .iter()
            .map(|s| s.to_string())
            .collect();
        headers.push(out::PO_CLOSED.to_string());
        for q in 1..=4 {
            headers.push(out::quarter_landing(q));
            headers.push(out::quarter_target(q));
            headers.push(out::quarter_target_balance(q));
        }

        let row = |contract: &str, flag: Value, status: Value| {
            let mut cells = Vec::new();
            for name in &headers {
                let cell = match name.as_str() {
                    "Contract No" => Value::text(contract),
                    "24 long aged" => flag.clone(),
                    "PO closed" => status.clone(),
                    "Q4 landing" => Value::Number(30.0),
                    "Q4 Target" => Value::Number(100.0),
                    "Q4 Target balance" => Value::Number(70.0),
                    _ => Value::Missing,
                };
                cells.push(cell);
            }
            cells
        };
        let frame = Frame::from_rows(
            &headers,
            vec![
                row("C1", Value::text("Y24 long aged"), Value::Number(0.0)),
                row("C2", Value::text("Y24 long aged"), Value::text("Close")),
                row("C3", Value::Missing, Value::Number(0.0)),
            ],
        )
        .unwrap();

        let report = long_age_report(&frame, &ctx).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.value(0, "Contract No"), &Value::text("C1"));
        assert_eq!(report.value(0, CURRENT_TARGET), &Value::Number(100.0));
        assert_eq!(report.value(0, CURRENT_TARGET_BALANCE), &Value::Number(70.0));
        assert_eq!(report.value(0, CURRENT_LANDING), &Value::Number(30.0));
        assert_eq!(report.value(0, "Sum of Q4 landing"), &Value::Number(30.0));
        assert_eq!(report.value(0, CURRENT_MONTH), &Value::text("Yes"));
        assert_eq!(report.column_names().last().map(String::as_str), Some(CURRENT_MONTH));
    }

    #[test]
    fn test_lead_time_extract_spreads_value_into_bucket() {
        let ctx = runtime();
        let frame = Frame::from_rows(
            &[
                "Period", "BD", "Province", "Category 1", "Category 2", "Site", "Contract No",
                "Contract Name", "Contract Year", "FAC Date Current", "FAC Date Actual",
                "FAC Lead time", "FAC indicator", "CV (OEF)", "FAC Value-Combo", "5GC or not",
                "FAC lead time node",
            ],
            vec![
                vec![
                    Value::text("2510A"), Value::Missing, Value::Missing, Value::Missing,
                    Value::Missing, Value::Missing, Value::text("C1"), Value::Missing,
                    Value::Missing, Value::Missing, Value::Missing, Value::Number(140.0),
                    Value::text("P"), Value::Number(1000.0), Value::Number(250.0),
                    Value::text("non-5GC"), Value::text("FAC 4~5 months"),
                ],
                vec![Value::text("2510A"), Value::Missing, Value::Missing, Value::Missing,
                    Value::Missing, Value::Missing, Value::text("C2")],
            ],
        )
        .unwrap();

        let report = tm_fac_report(&frame, &ctx).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.value(0, "Period"), &Value::text("2025-10"));
        assert_eq!(report.value(0, "FAC 4~5 months"), &Value::Number(250.0));
        assert_eq!(report.value(0, "FAC<4 months"), &Value::Missing);
        assert_eq!(report.width(), 16 + 5 + 1);
        assert!(!report.has_column("FAC lead time node"));
    }
}
