//! Replication link classifier
//!
//! Derives a server state from the channel row of `SHOW ALL SLAVES STATUS`.
//! Pure; the health check feeds it what the driver returned.

use std::fmt;

use super::state::ServerState;
use crate::driver::{SlaveStatus, ThreadRunning};

/// What the classifier knows about the server besides its channel row.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkContext {
    /// The server is the current cluster master
    pub is_master: bool,
    /// The server has replicas of its own
    pub is_relay: bool,
    /// Lag above which a replica is late, in seconds
    pub fail_max_delay: u64,
    /// Whether lag is checked at all
    pub rpl_checks: bool,
}

/// Why a replication link is stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFault {
    IoStopped,
    SqlStopped,
    AllStopped,
}

impl LinkFault {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkFault::IoStopped => "IO Stopped",
            LinkFault::SqlStopped => "SQL Stopped",
            LinkFault::AllStopped => "ALL Stopped",
        }
    }
}

impl fmt::Display for LinkFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Health of the configured replication channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkHealth {
    /// No row for the channel
    NoReplication,
    Stopped(LinkFault),
    /// IO thread still connecting
    Connecting,
    Late { seconds: u64 },
    Running,
}

/// Classify the channel row into a server state.
pub fn classify_replication(
    status: Option<&SlaveStatus>,
    ctx: &LinkContext,
) -> (ServerState, LinkHealth) {
    let Some(status) = status else {
        let state = if ctx.is_master {
            ServerState::Master
        } else {
            ServerState::StandAlone
        };
        return (state, LinkHealth::NoReplication);
    };

    let health = link_health(status, ctx);
    let state = match health {
        LinkHealth::NoReplication | LinkHealth::Connecting | LinkHealth::Running => {
            ServerState::Slave
        }
        LinkHealth::Stopped(_) => ServerState::SlaveErr,
        LinkHealth::Late { .. } => ServerState::SlaveLate,
    };

    let state = if ctx.is_master {
        // Master-master: the master keeps its role whatever its own link says.
        ServerState::Master
    } else if ctx.is_relay {
        state.as_relay()
    } else {
        state
    };

    (state, health)
}

fn link_health(status: &SlaveStatus, ctx: &LinkContext) -> LinkHealth {
    use ThreadRunning::{Connecting, No, Yes};

    match (status.sql_running, status.io_running) {
        (Yes, No) => LinkHealth::Stopped(LinkFault::IoStopped),
        (No, Yes) => LinkHealth::Stopped(LinkFault::SqlStopped),
        (No, No) => LinkHealth::Stopped(LinkFault::AllStopped),
        (_, Connecting) => LinkHealth::Connecting,
        _ => {
            let seconds = status.seconds_behind_master.unwrap_or(0);
            if ctx.rpl_checks && seconds > ctx.fail_max_delay {
                LinkHealth::Late { seconds }
            } else {
                LinkHealth::Running
            }
        }
    }
}
