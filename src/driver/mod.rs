//! Server driver
//!
//! The narrow surface through which the controller talks to a database
//! node: liveness, status reads, and the handful of replication statements
//! the rejoin engine issues. Everything else about a node is out of reach
//! on purpose.

mod errors;
mod mysql_cli;
mod parse;
mod probe;
pub mod sql;
mod types;

use async_trait::async_trait;

pub use errors::{DriverError, DriverResult};
pub use mysql_cli::{client_command, ClientOptions, MysqlCliDriver};
pub use probe::tcp_probe;
pub use types::{
    ChangeMasterOpts, NodeStatus, ReplicationMode, ServerEndpoint, SlaveStatus, ThreadRunning,
};

use crate::gtid::GtidList;

/// Connection handle to one database node.
#[async_trait]
pub trait ServerDriver: Send + Sync {
    /// Liveness check. An error counts as a failed probe.
    async fn probe(&self) -> DriverResult<()>;

    /// Server id, GTID positions, binlog coordinates, semi-sync status.
    async fn node_status(&self) -> DriverResult<NodeStatus>;

    /// Status of replication channel `channel`; `None` when the node has no
    /// such channel configured.
    async fn slave_status(&self, channel: &str) -> DriverResult<Option<SlaveStatus>>;

    /// Heartbeats received on `channel` since replication started.
    async fn received_heartbeats(&self, channel: &str) -> DriverResult<u64>;

    async fn change_master(&self, opts: &ChangeMasterOpts) -> DriverResult<()>;

    async fn start_slave(&self, channel: &str) -> DriverResult<()>;

    async fn stop_slave(&self, channel: &str) -> DriverResult<()>;

    async fn set_gtid_slave_pos(&self, gtid: &GtidList) -> DriverResult<()>;
}
