//! Error types for compliance-mapper
//!
//! Only fatal/startup conditions surface as `Error`; row-level failures are
//! recorded as data in the output column (see `types::Outcome`).

use thiserror::Error;

/// Common result type for compliance-mapper operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal error conditions
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-table read/write error (wraps csv::Error)
    #[error("Table error: {0}")]
    Table(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input header lacks one or more required columns
    #[error("input is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}
