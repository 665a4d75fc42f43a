//! Rejoin Engine
//!
//! Reattaches a failed master (or a stale replica) to the current topology
//! without silently losing committed data.
//!
//! # Strategy
//!
//! | Server vs election | Method |
//! |---|---|
//! | not ahead, or binlog relay | sync: `CHANGE MASTER` + `START SLAVE` |
//! | ahead | flashback, then mysqldump, in that order, as enabled |
//! | ahead, nothing enabled | rejoin script, crash record kept |
//!
//! A successful rejoin deletes the crash record, persists the registry and
//! broadcasts a [`RejoinEvent`].

mod binlog;
pub mod commands;
mod decision;
mod engine;
mod errors;
mod executor;
mod slave;

pub use binlog::{capture_prefix, captured_file, crash_backup_dir};
pub use commands::{Credentials, ToolPaths};
pub use decision::{
    plan_rejoin, replication_ahead_of_election, AheadCheck, ReconcileMethod,
    RejoinCapabilities, RejoinPlan, ServerPosition,
};
pub use engine::{
    RejoinEngine, RejoinEvent, RejoinOutcome, RejoinSettings, RejoinStrategy,
};
pub use errors::{RejoinError, RejoinResult};
pub use slave::SlaveLag;
