//! Error types for the reserve-market system.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{Direction, TariffPeriod};

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the reserve-market system.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed numeric or date field in source data.
    #[error("Parse error in {table} row {row}, field `{field}` = {value:?}: {reason}")]
    Parse {
        /// Table the row belongs to.
        table: &'static str,
        /// Zero-based row index within the fetched rows.
        row: usize,
        /// Source-native field name.
        field: &'static str,
        /// Offending raw text.
        value: String,
        /// What was expected.
        reason: String,
    },

    /// Time series from two sources do not correspond 1:1, or a window has no samples.
    #[error("Alignment error: {0}")]
    Alignment(String),

    /// The bid ladder cannot cover the required call volume for a minute.
    #[error(
        "Insufficient capacity at {minute}: {direction}/{} requires {required_mw:.3} MW, ladder offers {available_mw:.3} MW",
        tariff_label(.tariff)
    )]
    InsufficientCapacity {
        /// Offending minute (UTC).
        minute: DateTime<Utc>,
        /// Direction of the call.
        direction: Direction,
        /// Tariff period of the minute, if it could be determined.
        tariff: Option<TariffPeriod>,
        /// Required call volume magnitude.
        required_mw: f64,
        /// Total capacity of the matching ladder (0 when no ladder exists).
        available_mw: f64,
    },

    /// Requested date range violates a documented precondition.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Raw data source failure.
    #[error("Source error: {0}")]
    Source(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading/writing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn tariff_label(tariff: &Option<TariffPeriod>) -> &'static str {
    tariff.map(|t| t.code()).unwrap_or("-")
}

impl Error {
    /// Create a parse error with row context.
    pub fn parse(
        table: &'static str,
        row: usize,
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::Parse {
            table,
            row,
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an alignment error.
    pub fn alignment(msg: impl Into<String>) -> Self {
        Error::Alignment(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a source error.
    pub fn source_error(msg: impl Into<String>) -> Self {
        Error::Source(msg.into())
    }

    /// Whether this is an alignment failure.
    pub fn is_alignment(&self) -> bool {
        matches!(self, Error::Alignment(_))
    }

    /// Whether this is an insufficient-capacity failure.
    pub fn is_insufficient_capacity(&self) -> bool {
        matches!(self, Error::InsufficientCapacity { .. })
    }
}
