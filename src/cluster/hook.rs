//! Cluster state hook
//!
//! Conditions worth surfacing to whatever aggregates cluster-wide state.
//! The default hook writes them to the log.

use chrono::{DateTime, Utc};

use crate::observability::{Logger, Severity};

/// Condition raised by the cluster loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateCode {
    MasterFailed,
    ServerFailed,
    ReplicationStopped,
    FailoverBlocked,
    FailoverDone,
    FailoverFailed,
    RejoinFailed,
}

impl StateCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateCode::MasterFailed => "MASTER_FAILED",
            StateCode::ServerFailed => "SERVER_FAILED",
            StateCode::ReplicationStopped => "REPLICATION_STOPPED",
            StateCode::FailoverBlocked => "FAILOVER_BLOCKED",
            StateCode::FailoverDone => "FAILOVER_DONE",
            StateCode::FailoverFailed => "FAILOVER_FAILED",
            StateCode::RejoinFailed => "REJOIN_FAILED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            StateCode::FailoverDone => Severity::Info,
            StateCode::ReplicationStopped | StateCode::FailoverBlocked => Severity::Warn,
            StateCode::MasterFailed
            | StateCode::ServerFailed
            | StateCode::FailoverFailed
            | StateCode::RejoinFailed => Severity::Error,
        }
    }
}

/// Details attached to a [`StateCode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterStateEvent {
    /// Server the condition is about, empty for cluster-wide ones
    pub url: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ClusterStateEvent {
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Receives cluster conditions as they are raised.
pub trait StateHook: Send + Sync {
    fn set_state(&self, code: StateCode, event: ClusterStateEvent);
}

/// Logs every condition at the severity of its code.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStateHook;

impl StateHook for LogStateHook {
    fn set_state(&self, code: StateCode, event: ClusterStateEvent) {
        let at = event.at.to_rfc3339();
        Logger::log(
            code.severity(),
            "CLUSTER_STATE",
            &[
                ("code", code.as_str()),
                ("url", &event.url),
                ("message", &event.message),
                ("at", &at),
            ],
        );
    }
}
