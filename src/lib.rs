//! # Financial Position Builder
//!
//! A library for deriving the monthly contract financial position table from
//! already loaded source tables: the current and prior contract masters, the
//! collections ledger, the billing/AR export, quarterly targets, the previous
//! run's output and optional manual adjustments.
//!
//! ## Core Concepts
//!
//! - **Frame**: a columnar table of [`Value`] cells; one row per contract
//! - **Rule groups**: fixed, dependency-ordered derivations; a rule may only
//!   read columns produced by an earlier group
//! - **Milestones**: DEL, PAC and FAC dates, each planned or actual, from
//!   which lead times and aging flags are derived
//! - **Allocation waterfall**: the outstanding amount split into FAC, PAC and
//!   DEL buckets by payment-term reserves
//! - **Carry-forward**: quarter targets freeze once a quarter is no longer
//!   current
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_position_builder::*;
//! use chrono::NaiveDate;
//!
//! let sources = SourceTables {
//!     current_master: Frame::from_rows(&["CCLM ID", "OEF Value"], vec![
//!         vec![Value::text("C1"), Value::Number(1000.0)],
//!     ])?,
//!     previous_master: Frame::from_rows(&["CCLM ID"], Vec::new())?,
//!     collections: Frame::from_rows(&["CCLMID", "Collection"], vec![
//!         vec![Value::text("C1"), Value::Number(750.0)],
//!     ])?,
//!     billing: Frame::from_rows(&["Contract No.", ">PaymentTerm"], vec![
//!         vec![Value::text("C1"), Value::text("0;80;20;0")],
//!     ])?,
//!     ..Default::default()
//! };
//!
//! let config = PositionConfig::for_month("2025-10");
//! let today = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
//! let output = process_position(&sources, &config, today)?;
//!
//! println!("{}", output.frame.to_json_string()?);
//! ```

pub mod allocation;
pub mod columns;
pub mod context;
pub mod dates;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod milestone;
pub mod overrides;
pub mod reports;
pub mod rules;
pub mod schema;
pub mod table;
pub mod targets;
pub mod utils;

pub use allocation::{allocate, Allocation, PaymentTerms};
pub use context::RuntimeContext;
pub use dates::{normalize, NormalizedDate};
pub use engine::{post_process, DerivationPlan, Rule, RuleGroup, RunContext};
pub use error::{PositionError, Result};
pub use ingestion::{aggregate_collections, ContractMap, KeyedTable};
pub use milestone::{Indicator, LeadTimeBucket, MilestoneDates, LEAD_TIME_THRESHOLD_DAYS};
pub use overrides::*;
pub use reports::{build_reports, PositionReports};
pub use rules::standard_plan;
pub use schema::*;
pub use table::{Column, Frame, ReadScope, RowRef, ScopedFrame, Value};
pub use targets::{QuarterTarget, QuarterTargets};

use chrono::NaiveDate;
use log::{debug, info};

/// The derived frame of one run, its report views and the run facts they
/// were computed with.
#[derive(Debug, Clone)]
pub struct PositionOutput {
    pub runtime: RuntimeContext,
    pub frame: Frame,
    pub reports: PositionReports,
}

pub struct PositionProcessor;

impl PositionProcessor {
    /// Settles the run facts: the reporting month from the configuration (or
    /// the month before `today`), and the long-age column from the
    /// configuration, the manual long-age sheet, or the year default.
    pub fn runtime_for(
        sources: &SourceTables,
        config: &PositionConfig,
        today: NaiveDate,
    ) -> Result<RuntimeContext> {
        let runtime = config.runtime_context(today)?;
        let long_age_column = config
            .long_age_column
            .clone()
            .or_else(|| detect_long_age_column(sources.manual.long_age.as_ref()));

        Ok(match long_age_column {
            Some(column) => runtime.with_long_age_column(column),
            None => runtime,
        })
    }

    /// Evaluates the standard plan and post-processes the result.
    pub fn derive(
        sources: &SourceTables,
        runtime: &RuntimeContext,
        target_value_column: &str,
    ) -> Result<Frame> {
        let overrides = build_overrides(
            sources.manual.balance.as_ref(),
            sources.manual.status.as_ref(),
            sources.manual.long_age.as_ref(),
            &runtime.long_age_column,
        );
        let ctx = RunContext::new(sources, runtime.clone(), overrides, target_value_column)?;
        let plan = standard_plan(runtime)?;
        debug!(
            "Plan has {} groups producing {} columns",
            plan.groups().len(),
            plan.output_columns().len()
        );

        Ok(post_process(plan.evaluate(&ctx)?))
    }

    pub fn process(
        sources: &SourceTables,
        config: &PositionConfig,
        today: NaiveDate,
    ) -> Result<PositionOutput> {
        config.validate()?;
        let runtime = Self::runtime_for(sources, config, today)?;

        info!(
            "Deriving financial position for period {} ({} contracts, long-age column '{}')",
            runtime.current_period,
            sources.current_master.len(),
            runtime.long_age_column
        );

        let frame = Self::derive(sources, &runtime, &config.target_value_column)?;
        let reports = build_reports(&frame, &runtime)?;

        info!(
            "Derived {} columns for {} contracts",
            frame.width(),
            frame.len()
        );

        Ok(PositionOutput {
            runtime,
            frame,
            reports,
        })
    }
}

pub fn process_position(
    sources: &SourceTables,
    config: &PositionConfig,
    today: NaiveDate,
) -> Result<PositionOutput> {
    PositionProcessor::process(sources, config, today)
}

/// Only the derived frame, without the report views.
pub fn derive_position(
    sources: &SourceTables,
    config: &PositionConfig,
    today: NaiveDate,
) -> Result<Frame> {
    config.validate()?;
    let runtime = PositionProcessor::runtime_for(sources, config, today)?;
    PositionProcessor::derive(sources, &runtime, &config.target_value_column)
}
