//! Admission predicates
//!
//! Pure functions over the cluster counters. Each returns true when its
//! condition holds; the caller decides whether that blocks.

/// The master has failed at least `max_fail` consecutive probes.
pub fn is_max_master_failed_count_reach(fail_count: u32, max_fail: u32) -> bool {
    fail_count >= max_fail
}

/// The cluster has used its failover allowance.
///
/// Only the exact count blocks: once `failover_ctr` has gone past
/// `fail_limit` (after an operator-driven switchover, say) automatic
/// failover is allowed again. A `fail_limit` of 0 means unlimited.
pub fn is_max_cluster_failover_count_reach(fail_limit: u32, failover_ctr: u32) -> bool {
    fail_limit != 0 && failover_ctr == fail_limit
}

/// The previous failover is less than `fail_time` seconds old.
///
/// `failover_ts` and `now` are unix seconds; a `fail_time` of 0 disables
/// the cool-down.
pub fn is_between_failover_time_too_short(fail_time: u64, failover_ts: i64, now: i64) -> bool {
    if fail_time == 0 {
        return false;
    }
    let fail_time = i64::try_from(fail_time).unwrap_or(i64::MAX);
    now < failover_ts.saturating_add(fail_time)
}

/// Seconds left before the cool-down expires.
pub fn failover_cooldown_remaining(fail_time: u64, failover_ts: i64, now: i64) -> u64 {
    let fail_time = i64::try_from(fail_time).unwrap_or(i64::MAX);
    let remaining = failover_ts.saturating_add(fail_time).saturating_sub(now);
    u64::try_from(remaining).unwrap_or(0)
}
