//! Crash state file errors

use thiserror::Error;

/// Result type for crash state persistence
pub type CrashStoreResult<T> = Result<T, CrashStoreError>;

/// Crash state persistence errors
#[derive(Debug, Clone, Error)]
pub enum CrashStoreError {
    #[error("crash state I/O error on {0}: {1}")]
    Io(String, String),

    #[error("crash state file {0} is corrupt: {1}")]
    Corrupt(String, String),
}
