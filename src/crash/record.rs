//! Crash record
//!
//! Snapshot taken when a primary is deposed. It carries everything the
//! rejoin engine needs later to decide whether the returning node holds
//! transactions the elected master never received.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gtid::GtidList;

/// Election-time state of a deposed primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crash {
    /// Record identifier, used to correlate log lines of one episode
    pub id: Uuid,

    /// URL (`host:port`) of the deposed primary
    pub url: String,

    /// Deposed primary's last known binlog file
    pub failover_master_log_file: String,

    /// Deposed primary's last known binlog position
    pub failover_master_log_pos: u64,

    /// Elected master's own binlog file at election
    #[serde(default)]
    pub new_master_log_file: String,

    /// Elected master's own binlog position at election
    #[serde(default)]
    pub new_master_log_pos: u64,

    /// Whether the elected master was semi-sync caught up at election
    pub failover_semi_sync_slave_status: bool,

    /// GTID position read from the elected master's replication status.
    /// `None` when the topology did not replicate with GTID.
    pub failover_io_gtid: Option<GtidList>,

    /// URL of the elected master
    pub elected_master_url: String,

    /// When the record was created
    pub created_at: DateTime<Utc>,
}

impl Crash {
    /// Create a record for `url` deposed in favour of `elected_master_url`.
    pub fn new(url: impl Into<String>, elected_master_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            failover_master_log_file: String::new(),
            failover_master_log_pos: 0,
            new_master_log_file: String::new(),
            new_master_log_pos: 0,
            failover_semi_sync_slave_status: false,
            failover_io_gtid: None,
            elected_master_url: elected_master_url.into(),
            created_at: Utc::now(),
        }
    }

    /// Attach the deposed primary's binlog coordinates.
    pub fn with_master_coordinates(mut self, file: impl Into<String>, pos: u64) -> Self {
        self.failover_master_log_file = file.into();
        self.failover_master_log_pos = pos;
        self
    }

    /// Attach the elected master's own binlog coordinates.
    pub fn with_new_master_coordinates(mut self, file: impl Into<String>, pos: u64) -> Self {
        self.new_master_log_file = file.into();
        self.new_master_log_pos = pos;
        self
    }

    /// Attach the elected master's IO GTID position.
    pub fn with_io_gtid(mut self, gtid: GtidList) -> Self {
        self.failover_io_gtid = Some(gtid);
        self
    }

    pub fn with_semi_sync(mut self, caught_up: bool) -> Self {
        self.failover_semi_sync_slave_status = caught_up;
        self
    }

    /// GTID replication was in use at election time.
    pub fn used_gtid_at_election(&self) -> bool {
        self.failover_io_gtid
            .as_ref()
            .map(|gtid| !gtid.is_empty())
            .unwrap_or(false)
    }
}
