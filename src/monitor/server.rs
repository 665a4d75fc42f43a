//! Per-server monitor state

use std::sync::Arc;

use super::errors::{MonitorError, MonitorResult};
use super::state::ServerState;
use crate::driver::{NodeStatus, ServerDriver, ServerEndpoint, SlaveStatus};
use crate::gtid::GtidList;

/// Everything the controller knows about one node.
///
/// `state` only changes through [`ServerMonitor::transition`], which
/// enforces the transition table.
pub struct ServerMonitor {
    endpoint: ServerEndpoint,
    driver: Arc<dyn ServerDriver>,
    state: ServerState,
    prev_state: ServerState,

    /// Learned from the node; 0 until the first healthy probe
    pub server_id: u64,
    /// Consecutive failed probes
    pub fail_count: u32,
    /// Cluster heartbeat at the first failed probe of the current streak
    pub fail_suspect_heartbeat: u64,

    pub current_gtid: GtidList,
    pub slave_gtid: GtidList,
    pub gtid_binlog_pos: GtidList,
    /// `Gtid_IO_Pos` of the replication channel
    pub io_gtid: GtidList,
    pub binary_log_file: String,
    pub binary_log_pos: u64,
    /// URL of the node this one replicates from, empty if none
    pub replication_source_name: String,
    pub semi_sync_slave_status: bool,
    pub read_only: bool,

    pub is_relay: bool,
    pub is_maxscale: bool,
    pub is_maintenance: bool,

    /// Last channel row read, `None` if the channel is absent
    pub slave_status: Option<SlaveStatus>,
}

impl ServerMonitor {
    pub fn new(endpoint: ServerEndpoint, driver: Arc<dyn ServerDriver>) -> Self {
        Self {
            endpoint,
            driver,
            state: ServerState::Unconn,
            prev_state: ServerState::Unconn,
            server_id: 0,
            fail_count: 0,
            fail_suspect_heartbeat: 0,
            current_gtid: GtidList::new(),
            slave_gtid: GtidList::new(),
            gtid_binlog_pos: GtidList::new(),
            io_gtid: GtidList::new(),
            binary_log_file: String::new(),
            binary_log_pos: 0,
            replication_source_name: String::new(),
            semi_sync_slave_status: false,
            read_only: false,
            is_relay: false,
            is_maxscale: false,
            is_maintenance: false,
            slave_status: None,
        }
    }

    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    pub fn url(&self) -> String {
        self.endpoint.url()
    }

    pub fn host(&self) -> &str {
        &self.endpoint.host
    }

    pub fn port(&self) -> u16 {
        self.endpoint.port
    }

    pub fn driver(&self) -> &Arc<dyn ServerDriver> {
        &self.driver
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn prev_state(&self) -> ServerState {
        self.prev_state
    }

    /// Whether the last check moved the server to a new state.
    pub fn state_changed(&self) -> bool {
        self.prev_state != self.state
    }

    /// Start of a check: the current state becomes the previous one.
    pub(super) fn begin_check(&mut self) {
        self.prev_state = self.state;
    }

    /// Move to `next` if the transition table allows it.
    pub fn transition(&mut self, next: ServerState) -> MonitorResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(MonitorError::illegal_transition(&self.url(), self.state, next));
        }
        self.state = next;
        Ok(())
    }

    /// Operator action. Entering maintenance is immediate.
    pub fn enter_maintenance(&mut self) {
        self.is_maintenance = true;
        self.state = ServerState::Maintenance;
    }

    /// Operator action. The server is re-derived on the next check.
    pub fn leave_maintenance(&mut self) {
        self.is_maintenance = false;
        if self.state == ServerState::Maintenance {
            self.state = ServerState::Unconn;
        }
    }

    pub fn apply_node_status(&mut self, status: NodeStatus) {
        self.server_id = status.server_id;
        self.current_gtid = status.current_gtid;
        self.slave_gtid = status.slave_gtid;
        self.gtid_binlog_pos = status.gtid_binlog_pos;
        self.binary_log_file = status.binary_log_file;
        self.binary_log_pos = status.binary_log_pos;
        self.semi_sync_slave_status = status.semi_sync_slave_status;
        self.read_only = status.read_only;
    }

    pub fn apply_slave_status(&mut self, status: Option<SlaveStatus>) {
        match &status {
            Some(row) => {
                self.io_gtid = row.gtid_io_pos.clone();
                self.replication_source_name = row.source_url();
            }
            None => {
                self.io_gtid = GtidList::new();
                self.replication_source_name.clear();
            }
        }
        self.slave_status = status;
    }
}

impl std::fmt::Debug for ServerMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerMonitor")
            .field("url", &self.url())
            .field("state", &self.state)
            .field("prev_state", &self.prev_state)
            .field("fail_count", &self.fail_count)
            .field("server_id", &self.server_id)
            .finish()
    }
}
