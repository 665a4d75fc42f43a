//! Server state machine
//!
//! The set of states is closed. Every probe-driven move goes through
//! [`ServerState::can_transition_to`]; the only way out of `Maintenance`
//! other than a failure is the operator clearing the flag.

use std::fmt;

use serde::Serialize;

/// Health state of one monitored server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ServerState {
    /// `max_fail` consecutive probes failed
    Failed,
    /// Probe failing, threshold not reached
    Suspect,
    /// Not yet probed, or reachable but status unreadable
    Unconn,
    /// Current cluster master
    Master,
    /// Replicating from the master
    Slave,
    /// Replication threads stopped
    SlaveErr,
    /// Replicating, lag above `fail_max_delay`
    SlaveLate,
    /// Replica that has replicas of its own
    Relay,
    RelayErr,
    RelayLate,
    /// Reachable, no replication configured, not the master
    StandAlone,
    /// Operator-flagged, excluded from topology decisions
    Maintenance,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Failed => "Failed",
            ServerState::Suspect => "Suspect",
            ServerState::Unconn => "Unconn",
            ServerState::Master => "Master",
            ServerState::Slave => "Slave",
            ServerState::SlaveErr => "SlaveErr",
            ServerState::SlaveLate => "SlaveLate",
            ServerState::Relay => "Relay",
            ServerState::RelayErr => "RelayErr",
            ServerState::RelayLate => "RelayLate",
            ServerState::StandAlone => "StandAlone",
            ServerState::Maintenance => "Maintenance",
        }
    }

    /// Failed, Suspect or Unconn. A server in one of these keeps its
    /// failure count.
    pub fn is_failed_like(&self) -> bool {
        matches!(
            self,
            ServerState::Failed | ServerState::Suspect | ServerState::Unconn
        )
    }

    /// Any replica state, relay variants included.
    pub fn is_slave_like(&self) -> bool {
        matches!(
            self,
            ServerState::Slave
                | ServerState::SlaveErr
                | ServerState::SlaveLate
                | ServerState::Relay
                | ServerState::RelayErr
                | ServerState::RelayLate
        )
    }

    /// Relay counterpart of a replica state; other states are unchanged.
    pub fn as_relay(self) -> Self {
        match self {
            ServerState::Slave => ServerState::Relay,
            ServerState::SlaveErr => ServerState::RelayErr,
            ServerState::SlaveLate => ServerState::RelayLate,
            other => other,
        }
    }

    /// Whether a probe may move a server from `self` to `next`.
    pub fn can_transition_to(&self, next: ServerState) -> bool {
        use ServerState::*;

        match self {
            Maintenance => matches!(next, Maintenance | Failed),
            // A failed server recovers through a healthy probe, it does not
            // become suspect again.
            Failed => !matches!(next, Suspect),
            Suspect | Unconn => true,
            Master | Slave | SlaveErr | SlaveLate | Relay | RelayErr | RelayLate | StandAlone => {
                true
            }
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
