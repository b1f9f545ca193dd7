//! Error types for pit-db

use crate::core::temporal::Timestamp;
use crate::core::value::Key;
use thiserror::Error;

/// Result type alias for pit-db operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pit-db
#[derive(Error, Debug)]
pub enum Error {
    /// A candidate interval intersects an existing interval for the same key
    #[error("Versioning conflict: overlapping time window for key {key} from {from_time}")]
    OverlapConflict { key: Key, from_time: Timestamp },

    /// Unknown overlap mode or an invalid schema
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Required fields absent from an input record
    #[error("Missing required fields in input: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// Field name outside the configured schema
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Invalid timestamp or time range
    #[error("Temporal error: {0}")]
    Temporal(String),

    /// Table rows break the interval invariants
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
