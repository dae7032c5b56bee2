use crate::columns::target;
use crate::context::RuntimeContext;
use crate::error::{PositionError, Result};
use crate::table::Frame;
use crate::utils::parse_target_month;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_target_value_column() -> String {
    target::DEFAULT_VALUE_COLUMN.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PositionConfig {
    #[serde(default)]
    #[schemars(
        description = "Reporting month as YYYY-MM, YYYY/MM, YYYYMM or any date inside the month. When omitted, the month before the run date is reported."
    )]
    pub target_month: Option<String>,

    #[serde(default = "default_target_value_column")]
    #[schemars(
        description = "Column of the quarterly target table holding the target value for the current quarter (e.g. 'Q4F9RES')."
    )]
    pub target_value_column: String,

    #[serde(default)]
    #[schemars(
        description = "Name of the long-age flag column. When omitted it is detected from the long-age adjustment sheet, falling back to '<previous yy> long aged'."
    )]
    pub long_age_column: Option<String>,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            target_month: None,
            target_value_column: default_target_value_column(),
            long_age_column: None,
        }
    }
}

impl PositionConfig {
    pub fn for_month(target_month: impl Into<String>) -> Self {
        Self {
            target_month: Some(target_month.into()),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_value_column.trim().is_empty() {
            return Err(PositionError::InvalidConfig(
                "target_value_column must not be empty".to_string(),
            ));
        }
        if let Some(column) = &self.long_age_column {
            if column.trim().is_empty() {
                return Err(PositionError::InvalidConfig(
                    "long_age_column must not be empty when given".to_string(),
                ));
            }
        }
        if let Some(month) = self.target_month.as_deref().filter(|m| !m.trim().is_empty()) {
            parse_target_month(month)?;
        }
        Ok(())
    }

    /// Run facts for this configuration; `today` stands in for the clock
    /// when no target month is configured.
    pub fn runtime_context(&self, today: NaiveDate) -> Result<RuntimeContext> {
        RuntimeContext::from_target_month(self.target_month.as_deref(), today)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PositionConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Sheets of the optional manual-adjustment workbook.
#[derive(Debug, Clone, Default)]
pub struct ManualAdjustments {
    /// `Contract` / `Balance`.
    pub balance: Option<Frame>,
    /// `Contract No` / `Contract status`.
    pub status: Option<Frame>,
    /// `Contract No` plus a long-age flag column.
    pub long_age: Option<Frame>,
}

/// Already loaded input tables for one run.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    /// Current-period contract master, keyed by `CCLM ID`.
    pub current_master: Frame,
    /// Prior-period contract master, keyed by `CCLM ID`.
    pub previous_master: Frame,
    /// Collections ledger aggregated per `CCLMID`.
    pub collections: Frame,
    /// Billing / AR export keyed by `Contract No.`.
    pub billing: Frame,
    /// Quarterly target table keyed by `Contract No.`.
    pub targets: Option<Frame>,
    /// Previous run's derived frame.
    pub last_snapshot: Option<Frame>,
    pub manual: ManualAdjustments,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = PositionConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("target_month"));
        assert!(schema_json.contains("target_value_column"));
        assert!(schema_json.contains("long_age_column"));
    }

    #[test]
    fn test_defaults_from_empty_json() {
        let config = PositionConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PositionConfig::default());
        assert_eq!(config.target_value_column, "Q4F9RES");
    }

    #[test]
    fn test_serialization_round_trip() {
        let config = PositionConfig {
            target_month: Some("2025-10".to_string()),
            target_value_column: "Q3F6RES".to_string(),
            long_age_column: Some("24 long aged".to_string()),
        };
        let json = serde_json::to_string_pretty(&config).unwrap();
        let back = PositionConfig::from_json_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let bad_month = PositionConfig::from_json_str(r#"{"target_month": "sometime"}"#);
        assert!(matches!(bad_month, Err(PositionError::InvalidTargetMonth(_))));

        let blank_column = PositionConfig::from_json_str(r#"{"target_value_column": "  "}"#);
        assert!(matches!(blank_column, Err(PositionError::InvalidConfig(_))));

        let not_json = PositionConfig::from_json_str("target_month=2025-10");
        assert!(matches!(not_json, Err(PositionError::SerializationError(_))));
    }

    #[test]
    fn test_runtime_context_from_config() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let ctx = PositionConfig::for_month("2025/07").runtime_context(today).unwrap();
        assert_eq!(ctx.current_period, "2507A");
        assert_eq!(ctx.current_quarter, 3);

        let defaulted = PositionConfig::default().runtime_context(today).unwrap();
        assert_eq!(defaulted.current_period_tm, "2026-02");
    }
}
