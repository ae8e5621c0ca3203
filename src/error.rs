//! Error types for the `codemetal-lineflow` ETL library.
//!
//! Recoverable row-level problems (bad timestamps, sentinel values, range
//! violations, key collisions) never surface here; they are handled inside
//! the stage that sees them. What remains are the conditions that abort a
//! stage or the whole run.

use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, EtlError>;

/// A dataset does not have the shape a stage requires.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    // ---
    /// A required column is absent after column normalization.
    #[error("{dataset} data must contain a '{column}' column")]
    MissingColumn {
        dataset: &'static str,
        column: &'static str,
    },

    /// None of the accepted aliases for a column were found.
    #[error("{dataset} data must include one of {aliases:?} (or a column containing '{fallback}')")]
    NoAliasMatch {
        dataset: &'static str,
        aliases: Vec<String>,
        fallback: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum EtlError {
    // ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Policy: the sensor source must produce at least one row.
    #[error("Sensor dataset is empty after extraction; check the file path and timestamp parsing")]
    EmptySensorData,
}
