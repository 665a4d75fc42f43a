//! Health Monitor
//!
//! Per-server probe, closed state machine and replication link
//! classification.
//!
//! # Failure accounting
//!
//! - Every failed probe increments `fail_count`
//! - Below `max_fail` the server is `Suspect`, at or above it `Failed`
//! - The first healthy check outside Failed/Suspect/Unconn resets the count
//!
//! A state change is reported once, on the check that made it.

mod errors;
mod health;
mod replication;
mod server;
mod state;

pub use errors::{MonitorError, MonitorErrorKind, MonitorResult};
pub use health::{HealthContext, HealthReport, RejoinTrigger};
pub use replication::{classify_replication, LinkContext, LinkFault, LinkHealth};
pub use server::ServerMonitor;
pub use state::ServerState;
