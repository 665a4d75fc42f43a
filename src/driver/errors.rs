//! Server driver errors

use thiserror::Error;

use crate::exec::ExecError;

/// Result type for server driver calls
pub type DriverResult<T> = Result<T, DriverError>;

/// Server driver errors
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    #[error("{url} unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("statement on {url} failed: {source}")]
    Statement {
        url: String,
        #[source]
        source: ExecError,
    },

    #[error("unexpected output from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("invalid endpoint '{0}': expected host:port")]
    InvalidEndpoint(String),
}

impl DriverError {
    /// Connection-level failure, as opposed to a failed statement.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, DriverError::Unreachable { .. })
    }
}
