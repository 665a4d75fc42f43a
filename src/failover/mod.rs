//! Failover Admission Control
//!
//! Decides whether a failed master may be failed over automatically.
//!
//! A failover proceeds only when all of these hold:
//! 1. No failover is already running
//! 2. The master is `Failed` with at least `max_fail` consecutive failures
//! 3. The cluster is not interactive
//! 4. The last failover is older than `fail_time`
//! 5. The failover count is not exactly `fail_limit`
//! 6. No replica still receives heartbeats from the master
//!
//! Which replica gets elected is not decided here.

mod admission;
mod guards;
mod heartbeat;

pub use admission::{
    check_failed, evaluate, AdmissionDecision, AdmissionInput, BlockReason, IdleReason,
    MasterView,
};
pub use guards::{
    failover_cooldown_remaining, is_between_failover_time_too_short,
    is_max_cluster_failover_count_reach, is_max_master_failed_count_reach,
};
pub use heartbeat::{
    is_one_slave_heartbeat_increasing, HeartbeatCheck, HeartbeatSample,
    DEFAULT_HEARTBEAT_INTERVAL,
};
