//! GTID parse errors

use thiserror::Error;

/// Result type for GTID parsing
pub type GtidResult<T> = Result<T, GtidError>;

/// GTID errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GtidError {
    #[error("malformed GTID '{0}': expected domain-server-sequence")]
    Malformed(String),

    #[error("invalid number '{value}' in GTID '{gtid}'")]
    InvalidNumber { gtid: String, value: String },
}
