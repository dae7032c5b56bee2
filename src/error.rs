use thiserror::Error;

#[derive(Error, Debug)]
pub enum PositionError {
    #[error("Source table '{table}' is missing its join key column '{column}'")]
    MissingJoinKey { table: String, column: String },

    #[error("Rule '{rule}' in group '{group}' reads column '{column}', which is not a declared output of an earlier group")]
    DependencyViolation {
        group: String,
        rule: String,
        column: String,
    },

    #[error("Column '{column}' is already present and cannot be overwritten")]
    DuplicateColumn { column: String },

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown column: {0}")]
    MissingColumn(String),

    #[error("Invalid target month value: {0:?}")]
    InvalidTargetMonth(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PositionError>;
