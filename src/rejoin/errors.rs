//! Rejoin errors

use thiserror::Error;

use crate::driver::DriverError;
use crate::exec::ExecError;

/// Result type for rejoin operations
pub type RejoinResult<T> = Result<T, RejoinError>;

/// Rejoin errors
///
/// Nothing is retried within one call; the server is rejoined again only
/// when a later check sees it in the trigger condition.
#[derive(Debug, Clone, Error)]
pub enum RejoinError {
    #[error("cannot rejoin {0}: no master in the cluster")]
    NoMaster(String),

    #[error("cannot rejoin {0}: it is the current master")]
    IsMaster(String),

    #[error("no crash record for {0}")]
    MissingCrash(String),

    #[error("crash record for {0} has no GTID position from the election")]
    NoElectionGtid(String),

    #[error("crash record for {0} has no binlog coordinates on the new master")]
    MissingCoordinates(String),

    #[error("no captured binlog for {0}")]
    MissingCapture(String),

    #[error("{path}: {reason}")]
    Io { path: String, reason: String },

    #[error("every rejoin method failed for {url}: {reason}")]
    AllMethodsFailed { url: String, reason: String },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl RejoinError {
    pub(crate) fn io(path: &std::path::Path, e: std::io::Error) -> Self {
        RejoinError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            RejoinError::MissingCrash("db1:3306".into()).to_string(),
            "no crash record for db1:3306"
        );
        let exec = ExecError::Timeout {
            program: "mysqldump".into(),
            timeout_ms: 60_000,
        };
        assert_eq!(
            RejoinError::from(exec).to_string(),
            "mysqldump did not finish within 60000ms"
        );
    }
}
