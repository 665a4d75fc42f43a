//! Failover admission
//!
//! Evaluated once per tick after every server has been checked. The
//! decision is advisory: a blocked failover is simply evaluated again on
//! the next tick.

use std::fmt;

use super::guards::{
    failover_cooldown_remaining, is_between_failover_time_too_short,
    is_max_cluster_failover_count_reach, is_max_master_failed_count_reach,
};
use super::heartbeat::{is_one_slave_heartbeat_increasing, HeartbeatCheck};
use crate::monitor::ServerState;
use crate::observability::{log_event_with_fields, Event};

/// What admission knows about the current master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterView {
    pub url: String,
    pub state: ServerState,
    pub fail_count: u32,
}

/// Snapshot of the cluster taken after the health checks joined.
#[derive(Debug, Clone)]
pub struct AdmissionInput {
    /// A failover or switchover is running
    pub in_progress: bool,
    pub master: Option<MasterView>,
    pub interactive: bool,
    pub max_fail: u32,
    pub fail_limit: u32,
    pub failover_ctr: u32,
    /// Seconds
    pub fail_time: u64,
    /// Unix seconds of the last failover, 0 if none
    pub failover_ts: i64,
    /// Unix seconds
    pub now: i64,
}

/// Why nothing was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleReason {
    InProgress,
    NoMaster,
    MasterHealthy,
    Interactive,
    BelowMaxFail,
}

/// Why a failover was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    TooSoon { remaining_secs: u64 },
    FailLimitReached { failover_ctr: u32, fail_limit: u32 },
    HeartbeatIncreasing { url: String, before: u64, after: u64 },
}

/// Outcome of one admission evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Fail over the master at this URL
    Proceed { url: String },
    Idle(IdleReason),
    Blocked(BlockReason),
}

impl AdmissionDecision {
    pub fn is_proceed(&self) -> bool {
        matches!(self, AdmissionDecision::Proceed { .. })
    }
}

impl fmt::Display for IdleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IdleReason::InProgress => "failover in progress",
            IdleReason::NoMaster => "no master",
            IdleReason::MasterHealthy => "master not failed",
            IdleReason::Interactive => "interactive mode",
            IdleReason::BelowMaxFail => "master failure count below max_fail",
        };
        write!(f, "{}", text)
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::TooSoon { remaining_secs } => write!(
                f,
                "time between failovers too short, {}s remaining",
                remaining_secs
            ),
            BlockReason::FailLimitReached {
                failover_ctr,
                fail_limit,
            } => write!(
                f,
                "failover limit reached ({} of {})",
                failover_ctr, fail_limit
            ),
            BlockReason::HeartbeatIncreasing { url, before, after } => write!(
                f,
                "replica {} still receives master heartbeats ({} -> {})",
                url, before, after
            ),
        }
    }
}

/// Guards that need no I/O.
pub fn evaluate(input: &AdmissionInput) -> AdmissionDecision {
    if input.in_progress {
        return AdmissionDecision::Idle(IdleReason::InProgress);
    }
    let Some(master) = &input.master else {
        return AdmissionDecision::Idle(IdleReason::NoMaster);
    };
    if master.state != ServerState::Failed {
        return AdmissionDecision::Idle(IdleReason::MasterHealthy);
    }
    if input.interactive {
        return AdmissionDecision::Idle(IdleReason::Interactive);
    }
    if !is_max_master_failed_count_reach(master.fail_count, input.max_fail) {
        return AdmissionDecision::Idle(IdleReason::BelowMaxFail);
    }

    if is_between_failover_time_too_short(input.fail_time, input.failover_ts, input.now) {
        return AdmissionDecision::Blocked(BlockReason::TooSoon {
            remaining_secs: failover_cooldown_remaining(
                input.fail_time,
                input.failover_ts,
                input.now,
            ),
        });
    }
    if is_max_cluster_failover_count_reach(input.fail_limit, input.failover_ctr) {
        return AdmissionDecision::Blocked(BlockReason::FailLimitReached {
            failover_ctr: input.failover_ctr,
            fail_limit: input.fail_limit,
        });
    }

    AdmissionDecision::Proceed {
        url: master.url.clone(),
    }
}

/// Full admission: [`evaluate`], then the heartbeat probe when one is given.
///
/// The heartbeat probe sleeps its sample interval on the caller's task.
pub async fn check_failed(
    input: &AdmissionInput,
    heartbeat: Option<&HeartbeatCheck>,
) -> AdmissionDecision {
    let decision = evaluate(input);

    let decision = match (decision, heartbeat) {
        (AdmissionDecision::Proceed { url }, Some(check)) => {
            let samples = check.sample().await;
            match is_one_slave_heartbeat_increasing(&samples) {
                Some(hit) => {
                    log_event_with_fields(
                        Event::HeartbeatFalsePositive,
                        &[
                            ("master", &url),
                            ("slave", &hit.url),
                            ("before", &hit.before.to_string()),
                            ("after", &hit.after.to_string()),
                        ],
                    );
                    AdmissionDecision::Blocked(BlockReason::HeartbeatIncreasing {
                        url: hit.url.clone(),
                        before: hit.before,
                        after: hit.after,
                    })
                }
                None => AdmissionDecision::Proceed { url },
            }
        }
        (decision, _) => decision,
    };

    if let AdmissionDecision::Blocked(reason) = &decision {
        let master = input.master.as_ref().map(|m| m.url.as_str()).unwrap_or("");
        log_event_with_fields(
            Event::FailoverBlocked,
            &[("master", master), ("reason", &reason.to_string())],
        );
    }
    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_master() -> AdmissionInput {
        AdmissionInput {
            in_progress: false,
            master: Some(MasterView {
                url: "db1:3306".into(),
                state: ServerState::Failed,
                fail_count: 5,
            }),
            interactive: false,
            max_fail: 5,
            fail_limit: 3,
            failover_ctr: 0,
            fail_time: 300,
            failover_ts: 0,
            now: 1_700_000_000,
        }
    }

    #[test]
    fn test_proceed() {
        assert_eq!(
            evaluate(&failed_master()),
            AdmissionDecision::Proceed {
                url: "db1:3306".into()
            }
        );
    }

    #[test]
    fn test_reentrancy_guard() {
        let mut input = failed_master();
        input.in_progress = true;
        assert_eq!(evaluate(&input), AdmissionDecision::Idle(IdleReason::InProgress));
    }

    #[test]
    fn test_idle_reasons() {
        let mut input = failed_master();
        input.master = None;
        assert_eq!(evaluate(&input), AdmissionDecision::Idle(IdleReason::NoMaster));

        let mut input = failed_master();
        input.master.as_mut().unwrap().state = ServerState::Suspect;
        assert_eq!(evaluate(&input), AdmissionDecision::Idle(IdleReason::MasterHealthy));

        let mut input = failed_master();
        input.interactive = true;
        assert_eq!(evaluate(&input), AdmissionDecision::Idle(IdleReason::Interactive));

        let mut input = failed_master();
        input.max_fail = 6;
        assert_eq!(evaluate(&input), AdmissionDecision::Idle(IdleReason::BelowMaxFail));
    }

    #[test]
    fn test_cooldown_blocks() {
        let mut input = failed_master();
        input.failover_ts = input.now - 100;
        assert_eq!(
            evaluate(&input),
            AdmissionDecision::Blocked(BlockReason::TooSoon {
                remaining_secs: 200
            })
        );
    }

    #[test]
    fn test_fail_limit_blocks_only_at_exact_count() {
        let mut input = failed_master();
        input.failover_ctr = 3;
        assert!(matches!(
            evaluate(&input),
            AdmissionDecision::Blocked(BlockReason::FailLimitReached { .. })
        ));
        input.failover_ctr = 4;
        assert!(evaluate(&input).is_proceed());
    }

    #[tokio::test]
    async fn test_check_failed_without_heartbeat_probe() {
        let decision = check_failed(&failed_master(), None).await;
        assert!(decision.is_proceed());
    }
}
