//! Error types for the batching engine

use fastsql_core::FastSqlError;
use thiserror::Error;

/// Errors surfaced by [`crate::BatchEngine`] operations
#[derive(Error, Debug)]
pub enum BatchError {
    /// The statement is not a single-row INSERT the splitter can take apart
    #[error("Malformed INSERT statement: {reason}")]
    MalformedQuery { query: String, reason: &'static str },

    /// A row was supplied with a different number of parameters than the
    /// first row accumulated for the same statement
    #[error("Parameter count mismatch: expected {expected} parameter(s) per row, got {actual}")]
    ParameterCountMismatch {
        query: String,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to prepare batch statement: {source}")]
    PrepareFailure {
        sql: String,
        #[source]
        source: FastSqlError,
    },

    #[error("Failed to execute batch of {rows} row(s): {source}")]
    ExecuteFailure {
        rows: usize,
        #[source]
        source: FastSqlError,
    },

    /// One or more prepared statements could not be released during close
    #[error("Failed to release {} prepared statement(s)", .0.len())]
    CloseFailure(Vec<FastSqlError>),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No database driver registered as '{0}'")]
    UnknownDriver(String),

    #[error("Batch engine is closed")]
    Closed,

    #[error(transparent)]
    Driver(#[from] FastSqlError),
}

impl BatchError {
    pub(crate) fn malformed(query: &str, reason: &'static str) -> Self {
        BatchError::MalformedQuery {
            query: query.to_string(),
            reason,
        }
    }

    /// Whether buffered rows are still pending after this error, so the
    /// same flush can be attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BatchError::PrepareFailure { .. } | BatchError::ExecuteFailure { .. }
        )
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, BatchError>;
