//! Error types for prombridge

use std::fmt;

/// Result type alias for prombridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for prombridge
#[derive(Debug)]
pub enum Error {
    /// Ingest queue is full; the write should be retried later
    Backpressure,
    /// Series carried no `__name__` label
    MissingMetricName,
    /// Bulk insert or query rejected by the storage backend
    Storage(String),
    /// A result row failed to decode
    Scan(String),
    /// Storage connection could not be released
    Connection(String),
    /// Configuration errors
    Config(String),
    /// Query errors (bad selector, invalid matcher, unsupported expression)
    Query(String),
    /// Internal error
    Internal(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Backpressure => write!(f, "Ingest queue is full"),
            Error::MissingMetricName => write!(f, "Missing metric name"),
            Error::Storage(msg) => write!(f, "Storage error: {}", msg),
            Error::Scan(msg) => write!(f, "Row scan error: {}", msg),
            Error::Connection(msg) => write!(f, "Connection error: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Query(msg) => write!(f, "Query error: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}
