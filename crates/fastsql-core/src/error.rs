//! Error types for driver-level operations

use thiserror::Error;

/// Core error type shared by drivers and connections
#[derive(Error, Debug)]
pub enum FastSqlError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl FastSqlError {
    /// Whether the error means the underlying connection is gone
    pub fn is_connection_error(&self) -> bool {
        matches!(self, FastSqlError::Connection(_))
    }
}

/// Result type alias for driver-level operations
pub type Result<T> = std::result::Result<T, FastSqlError>;
