//! External command errors

use thiserror::Error;

/// Result type for external command execution
pub type ExecResult<T> = Result<T, ExecError>;

/// External command errors
///
/// Only the exit status decides success; the captured output is carried
/// for diagnostics.
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    #[error("failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("{program} did not finish within {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u128 },

    #[error("{program} exited with status {code:?}: {output}")]
    Failed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("pipe between {producer} and {consumer} broke: {reason}")]
    Pipe {
        producer: String,
        consumer: String,
        reason: String,
    },
}

impl ExecError {
    /// Program the error is about.
    pub fn program(&self) -> &str {
        match self {
            ExecError::Spawn { program, .. }
            | ExecError::Timeout { program, .. }
            | ExecError::Failed { program, .. } => program,
            ExecError::Pipe { consumer, .. } => consumer,
        }
    }
}
