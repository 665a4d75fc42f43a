//! Health monitor errors

use std::fmt;

use super::state::ServerState;

/// Health monitor error type
#[derive(Debug, Clone)]
pub struct MonitorError {
    /// Error kind
    pub kind: MonitorErrorKind,
    /// Error message
    pub message: String,
}

/// Health monitor error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorErrorKind {
    /// State move not in the transition table
    IllegalTransition,
}

impl MonitorError {
    pub fn new(kind: MonitorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn illegal_transition(url: &str, from: ServerState, to: ServerState) -> Self {
        Self::new(
            MonitorErrorKind::IllegalTransition,
            format!("{}: {} -> {} not allowed", url, from, to),
        )
    }
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for MonitorError {}

/// Result type for health monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;
