//! Lifecycle event definitions
//!
//! Every log line the controller emits outside an [`ObservationScope`]
//! names one of these events.
//!
//! [`ObservationScope`]: super::ObservationScope

use std::fmt;

use super::logger::Severity;

/// Controller lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot & Lifecycle
    /// Monitor loop starting
    Startup,
    /// Monitor loop stopped
    Shutdown,
    /// Configuration loaded and validated
    ConfigLoaded,
    /// Crash records read from the state file
    CrashesLoaded,
    /// Crash state file could not be written
    CrashesSaveFailed,

    // Health
    /// TCP probe failed
    ProbeFailed,
    /// Probe succeeded but status could not be read
    StatusReadFailed,
    /// Server state changed
    StateChanged,
    /// Transition not allowed from the current state
    StateTransitionRejected,
    /// Consecutive failures reached `max_fail`
    MaxFailReached,
    /// Replication link reports an error
    ReplicationError,
    /// Server removed from the replica list
    SlaveRemoved,
    /// Master inferred from the replication topology at start
    MasterDiscovered,
    /// Operator toggled maintenance on a server
    MaintenanceChanged,

    // Failover
    /// Failover admission refused this tick
    FailoverBlocked,
    /// A replica is still receiving heartbeats from the master
    HeartbeatFalsePositive,
    /// Failover episode starts
    FailoverStart,
    /// New master elected, crash recorded
    FailoverComplete,
    /// Election failed
    FailoverFailed,
    /// Operator reset of the failover counter
    FailoverCounterReset,

    // Rejoin
    /// Rejoin not attempted
    RejoinAborted,
    /// Binlog segment of the old master captured
    BinlogCaptured,
    /// Binlog capture failed, flashback disabled
    BinlogCaptureFailed,
    /// Rejoin strategy selected
    RejoinPlanned,
    /// Flashback attempt failed
    FlashbackFailed,
    /// Dump reseed failed
    MysqldumpFailed,
    /// No automatic strategy available
    RejoinManual,
    /// Indirect replica re-pointed at the current master
    SlaveRepointed,

    // Alerts
    /// Alert delivered
    AlertSent,
    /// Alert delivery failed
    AlertFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Startup => "REPLWATCH_STARTUP",
            Event::Shutdown => "REPLWATCH_SHUTDOWN",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::CrashesLoaded => "CRASHES_LOADED",
            Event::CrashesSaveFailed => "CRASHES_SAVE_FAILED",

            Event::ProbeFailed => "PROBE_FAILED",
            Event::StatusReadFailed => "STATUS_READ_FAILED",
            Event::StateChanged => "STATE_CHANGED",
            Event::StateTransitionRejected => "STATE_TRANSITION_REJECTED",
            Event::MaxFailReached => "MAX_FAIL_REACHED",
            Event::ReplicationError => "REPLICATION_ERROR",
            Event::SlaveRemoved => "SLAVE_REMOVED",
            Event::MasterDiscovered => "MASTER_DISCOVERED",
            Event::MaintenanceChanged => "MAINTENANCE_CHANGED",

            Event::FailoverBlocked => "FAILOVER_BLOCKED",
            Event::HeartbeatFalsePositive => "HEARTBEAT_FALSE_POSITIVE",
            Event::FailoverStart => "FAILOVER_START",
            Event::FailoverComplete => "FAILOVER_COMPLETE",
            Event::FailoverFailed => "FAILOVER_FAILED",
            Event::FailoverCounterReset => "FAILOVER_COUNTER_RESET",

            Event::RejoinAborted => "REJOIN_ABORTED",
            Event::BinlogCaptured => "BINLOG_CAPTURED",
            Event::BinlogCaptureFailed => "BINLOG_CAPTURE_FAILED",
            Event::RejoinPlanned => "REJOIN_PLANNED",
            Event::FlashbackFailed => "FLASHBACK_FAILED",
            Event::MysqldumpFailed => "MYSQLDUMP_FAILED",
            Event::RejoinManual => "REJOIN_MANUAL",
            Event::SlaveRepointed => "SLAVE_REPOINTED",

            Event::AlertSent => "ALERT_SENT",
            Event::AlertFailed => "ALERT_FAILED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::ProbeFailed
            | Event::StateTransitionRejected
            | Event::ReplicationError
            | Event::FailoverBlocked
            | Event::HeartbeatFalsePositive
            | Event::RejoinAborted
            | Event::RejoinManual
            | Event::AlertFailed => Severity::Warn,

            Event::CrashesSaveFailed
            | Event::StatusReadFailed
            | Event::MaxFailReached
            | Event::FailoverFailed
            | Event::BinlogCaptureFailed
            | Event::FlashbackFailed
            | Event::MysqldumpFailed => Severity::Error,

            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_upper_snake() {
        let events = [
            Event::Startup,
            Event::ProbeFailed,
            Event::StateChanged,
            Event::MaxFailReached,
            Event::FailoverBlocked,
            Event::BinlogCaptureFailed,
            Event::RejoinManual,
            Event::AlertSent,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_severities() {
        assert_eq!(Event::StateChanged.severity(), Severity::Info);
        assert_eq!(Event::FailoverBlocked.severity(), Severity::Warn);
        assert_eq!(Event::BinlogCaptureFailed.severity(), Severity::Error);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::MaxFailReached), "MAX_FAIL_REACHED");
    }
}
