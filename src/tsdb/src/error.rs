//! Error and Result types for tsdb operations.

use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::value::TypeTag;

/// A convenience `Result` type for tsdb operations.
pub type Result<T> = std::result::Result<T, TsdbError>;

#[derive(Debug, Error)]
pub enum TsdbError {
    /// A value's runtime type differs from the register's strict type.
    #[error("invalid data type: expected strict data type {expected}, got {actual}")]
    TypeMismatch { expected: TypeTag, actual: TypeTag },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("priority {0} is out of range 1..=16")]
    InvalidPriority(u8),

    /// A run document only accepts non-decreasing timestamps.
    #[error("cannot insert time series item at {timestamp}, older than last timestamp {last}")]
    OrderingViolation {
        timestamp: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    #[error("corrupted data file {path:?}: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    #[error("collection error: {0}")]
    Collection(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
