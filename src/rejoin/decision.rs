//! Rejoin strategy decision
//!
//! Pure. Whether the returning server holds transactions the cluster never
//! saw, and which method reconciles it, are decided here from plain
//! inputs; the executors only carry the plan out.

use std::fmt;

use crate::crash::Crash;
use crate::gtid::GtidList;

/// Position of the returning server.
#[derive(Debug, Clone, Copy)]
pub struct ServerPosition<'a> {
    pub server_id: u64,
    pub current_gtid: &'a GtidList,
    pub binary_log_file: &'a str,
    pub binary_log_pos: u64,
}

/// Whether the server is ahead of what the elected master received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AheadCheck {
    NotAhead,
    Ahead,
    /// The election recorded nothing from this server id, so it was not the
    /// master at the time. Safety cannot be proven; handled as ahead.
    Cascading,
}

impl AheadCheck {
    pub fn is_ahead(&self) -> bool {
        !matches!(self, AheadCheck::NotAhead)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AheadCheck::NotAhead => "not_ahead",
            AheadCheck::Ahead => "ahead",
            AheadCheck::Cascading => "cascading",
        }
    }
}

/// Compare the server against the crash record of its own failover.
///
/// With a GTID recorded at election, sequences for the server's own id
/// are compared. Without one, the binlog coordinates must match exactly.
pub fn replication_ahead_of_election(server: &ServerPosition<'_>, crash: &Crash) -> AheadCheck {
    match crash.failover_io_gtid.as_ref().filter(|g| !g.is_empty()) {
        Some(election_gtid) => {
            let crash_seq = election_gtid.seq_for_server(server.server_id);
            if crash_seq == 0 {
                return AheadCheck::Cascading;
            }
            if server.current_gtid.seq_for_server(server.server_id) > crash_seq {
                AheadCheck::Ahead
            } else {
                AheadCheck::NotAhead
            }
        }
        None => {
            if server.binary_log_file == crash.failover_master_log_file
                && server.binary_log_pos == crash.failover_master_log_pos
            {
                AheadCheck::NotAhead
            } else {
                AheadCheck::Ahead
            }
        }
    }
}

/// Flags that decide which methods are available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejoinCapabilities {
    /// Replicas follow a binlog relay rather than the master
    pub binlog_relay: bool,
    /// The crash record carries `failover_io_gtid`
    pub election_gtid: bool,
    /// Cleared by a failed binlog capture
    pub can_flashback: bool,
    pub autorejoin_flashback: bool,
    pub autorejoin_backup_binlog: bool,
    pub autorejoin_mysqldump: bool,
}

impl RejoinCapabilities {
    /// Why flashback cannot be used, if it cannot.
    pub fn flashback_blocker(&self) -> Option<&'static str> {
        if !self.election_gtid {
            Some("no GTID recorded at election")
        } else if !self.autorejoin_flashback {
            Some("flashback disabled")
        } else if !self.autorejoin_backup_binlog {
            Some("binlog backup disabled")
        } else if !self.can_flashback {
            Some("binlog capture failed")
        } else {
            None
        }
    }
}

/// A method that discards or overwrites the server's divergent data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMethod {
    Flashback,
    Mysqldump,
}

/// What the executors will do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejoinPlan {
    /// Point replication at the master as is
    Sync,
    /// Try each method in order until one succeeds
    Reconcile(Vec<ReconcileMethod>),
    /// Nothing automatic is allowed
    Manual(String),
}

impl fmt::Display for RejoinPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejoinPlan::Sync => write!(f, "sync"),
            RejoinPlan::Reconcile(methods) => {
                let names: Vec<&str> = methods
                    .iter()
                    .map(|m| match m {
                        ReconcileMethod::Flashback => "flashback",
                        ReconcileMethod::Mysqldump => "mysqldump",
                    })
                    .collect();
                write!(f, "{}", names.join(","))
            }
            RejoinPlan::Manual(reason) => write!(f, "manual ({})", reason),
        }
    }
}

/// Pick the rejoin plan.
pub fn plan_rejoin(ahead: AheadCheck, caps: &RejoinCapabilities) -> RejoinPlan {
    if !ahead.is_ahead() || caps.binlog_relay {
        return RejoinPlan::Sync;
    }

    let flashback_blocker = caps.flashback_blocker();
    let mut methods = Vec::with_capacity(2);
    if flashback_blocker.is_none() {
        methods.push(ReconcileMethod::Flashback);
    }
    if caps.autorejoin_mysqldump {
        methods.push(ReconcileMethod::Mysqldump);
    }

    if methods.is_empty() {
        let flashback = flashback_blocker.unwrap_or("flashback unavailable");
        return RejoinPlan::Manual(format!("{}; mysqldump disabled", flashback));
    }
    RejoinPlan::Reconcile(methods)
}
