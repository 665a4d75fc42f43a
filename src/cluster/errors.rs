//! Cluster error types

use std::fmt;

/// Cluster error type
#[derive(Debug, Clone)]
pub struct ClusterError {
    /// Error kind
    pub kind: ClusterErrorKind,
    /// Error message
    pub message: String,
}

/// Cluster error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterErrorKind {
    /// Configuration file missing, malformed or inconsistent
    Config,
    /// Crash state file could not be read or written
    State,
    /// Election did not produce a usable master
    Election,
    /// Operation not allowed in the current cluster state
    InvalidState,
}

impl ClusterError {
    pub fn new(kind: ClusterErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ClusterErrorKind::Config, message)
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::new(ClusterErrorKind::State, message)
    }

    pub fn election(message: impl Into<String>) -> Self {
        Self::new(ClusterErrorKind::Election, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ClusterErrorKind::InvalidState, message)
    }
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ClusterError {}

impl From<crate::crash::CrashStoreError> for ClusterError {
    fn from(e: crate::crash::CrashStoreError) -> Self {
        Self::state(e.to_string())
    }
}

/// Result type for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;
