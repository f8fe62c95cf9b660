use crate::datamodel::ColumnType;
use thiserror::Error;

/// Errors raised by the feature derivation and training pipeline.
#[derive(Error, Debug)]
pub enum ForecastError {
    /// The metrics source returned nothing to train on
    #[error("No rows available: {0}")]
    NoRows(String),

    /// A column required by a pipeline step is absent
    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    /// The designated target column is absent after feature derivation
    #[error("Target column '{target}' is missing from the feature grid")]
    MissingTarget { target: String },

    /// A column holds values of the wrong runtime type
    #[error("Column '{column}' has type {found}, expected {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
        found: ColumnType,
    },

    /// A column does not have as many rows as its grid
    #[error("Column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    /// The train/test partition left one side empty
    #[error("Empty {partition} partition: {total} rows split with test fraction {test_fraction}")]
    EmptyPartition {
        partition: &'static str,
        total: usize,
        test_fraction: f64,
    },

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Feature matrix width does not match the fitted model
    #[error("Feature matrix has {found} columns, the model expects {expected}")]
    ShapeMismatch { expected: usize, found: usize },
}

impl ForecastError {
    pub fn missing_column(column: &str) -> Self {
        ForecastError::MissingColumn {
            column: column.to_string(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        ForecastError::InvalidConfig(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
