//! Error types for riotpal-core
//!
//! Only configuration faults and host-side transport failures are errors.
//! Anything the device reports (error codes, timeouts, garbled replies) is
//! carried in a [`CommandResult`](crate::CommandResult) instead.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Register name is not in the register table
    #[error("register not found: {0}")]
    NotFound(String),

    /// A required column is absent from the register table header
    #[error("register table is missing required column '{0}'")]
    MissingColumn(&'static str),

    /// A register table cell could not be converted to its typed value
    #[error("register table row {row}: invalid {column} '{value}'")]
    InvalidRow {
        /// 1-based data row number (the header is row 0)
        row: usize,
        /// Column name
        column: &'static str,
        /// Offending cell contents
        value: String,
    },

    /// Register table could not be tokenized
    #[error("register table parse error: {0}")]
    Table(#[from] csv::Error),

    /// I/O error while reading a register table
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The value supplied to a write cannot be applied to the register
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The transport failed to send a request
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
