//! Collaborator data types
//!
//! What the controller reads from and sends to a database node.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{DriverError, DriverResult};
use crate::gtid::GtidList;

/// Network address of a database node. Its URL is `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
}

impl ServerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host:port`; a bare host gets port 3306.
    pub fn parse(s: &str) -> DriverResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DriverError::InvalidEndpoint(s.to_string()));
        }
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| DriverError::InvalidEndpoint(s.to_string()))?;
                Ok(Self::new(host, port))
            }
            Some(_) => Err(DriverError::InvalidEndpoint(s.to_string())),
            None => Ok(Self::new(s, 3306)),
        }
    }

    pub fn url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerEndpoint {
    type Err = DriverError;

    fn from_str(s: &str) -> DriverResult<Self> {
        Self::parse(s)
    }
}

/// State of a replication thread as printed by SHOW SLAVE STATUS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadRunning {
    Yes,
    #[default]
    No,
    Connecting,
}

impl ThreadRunning {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "Yes" => ThreadRunning::Yes,
            "Connecting" | "Preparing" => ThreadRunning::Connecting,
            _ => ThreadRunning::No,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadRunning::Yes => "Yes",
            ThreadRunning::No => "No",
            ThreadRunning::Connecting => "Connecting",
        }
    }
}

/// One replication channel of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlaveStatus {
    pub connection_name: String,
    pub master_host: String,
    pub master_port: u16,
    pub master_server_id: u64,
    pub io_running: ThreadRunning,
    pub sql_running: ThreadRunning,
    /// `None` when the server prints NULL
    pub seconds_behind_master: Option<u64>,
    pub last_io_error: String,
    pub last_sql_error: String,
    pub gtid_io_pos: GtidList,
    pub using_gtid: String,
    pub master_log_file: String,
    pub read_master_log_pos: u64,
    pub received_heartbeats: u64,
}

impl SlaveStatus {
    /// URL of the node this channel replicates from.
    pub fn source_url(&self) -> String {
        format!("{}:{}", self.master_host, self.master_port)
    }

    pub fn uses_gtid(&self) -> bool {
        !self.using_gtid.is_empty() && !self.using_gtid.eq_ignore_ascii_case("no")
    }
}

/// Node-level status read on every healthy probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeStatus {
    pub server_id: u64,
    pub current_gtid: GtidList,
    pub slave_gtid: GtidList,
    pub gtid_binlog_pos: GtidList,
    pub binary_log_file: String,
    pub binary_log_pos: u64,
    pub semi_sync_slave_status: bool,
    pub read_only: bool,
}

/// How `CHANGE MASTER TO` positions the replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationMode {
    /// MariaDB GTID, `MASTER_USE_GTID=current_pos`
    CurrentPos,
    /// MariaDB GTID, `MASTER_USE_GTID=slave_pos`
    SlavePos,
    /// File and position
    Positional,
    /// MaxScale binlog relay, file and position
    Mxs,
    /// MySQL GTID, `MASTER_AUTO_POSITION=1`
    MasterAutoPosition,
    /// MySQL group replication recovery channel
    GroupRepl,
}

impl ReplicationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationMode::CurrentPos => "CURRENT_POS",
            ReplicationMode::SlavePos => "SLAVE_POS",
            ReplicationMode::Positional => "POSITIONAL",
            ReplicationMode::Mxs => "MXS",
            ReplicationMode::MasterAutoPosition => "MASTER_AUTO_POSITION",
            ReplicationMode::GroupRepl => "GROUP_REPL",
        }
    }
}

impl fmt::Display for ReplicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Arguments of a `CHANGE MASTER TO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMasterOpts {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// MASTER_CONNECT_RETRY, seconds
    pub retry: u32,
    /// MASTER_HEARTBEAT_PERIOD, seconds
    pub heartbeat: u32,
    pub mode: ReplicationMode,
    pub logfile: String,
    pub logpos: u64,
    pub channel: String,
}
