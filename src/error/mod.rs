//! Error handling for the metrics pipeline.

use std::io;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Errors raised while loading, deriving or persisting tables
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Error opening, writing or renaming a table file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error building or concatenating Arrow data
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error reading or writing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error converting between typed rows and record batches
    #[error("Serialization error in table '{table}': {message}")]
    Serde { table: String, message: String },

    /// A table the pipeline depends on has never been written
    #[error("Table '{table}' not found in store")]
    MissingTable { table: String },

    /// A table that must carry rows is empty
    #[error("Table '{table}' is empty")]
    EmptyTable { table: String },

    /// Stored columns do not match the declared schema
    #[error("Schema mismatch in table '{table}': {details}")]
    SchemaMismatch { table: String, details: String },

    /// A stored value lies outside its column's domain
    #[error("Invalid value '{value}' in column '{column}' of table '{table}'")]
    InvalidValue {
        table: String,
        column: String,
        value: String,
    },
}

impl PipelineError {
    /// Create a serialization error for a table
    pub fn serde(table: &str, error: impl std::fmt::Display) -> Self {
        Self::Serde {
            table: table.to_string(),
            message: error.to_string(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(table: &str, column: &str, value: impl ToString) -> Self {
        Self::InvalidValue {
            table: table.to_string(),
            column: column.to_string(),
            value: value.to_string(),
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
