//! Health check
//!
//! One call per server per tick: probe, read status, classify, and report
//! what the cluster loop has to act on.

use std::time::Duration;

use super::replication::{classify_replication, LinkContext, LinkHealth};
use super::server::ServerMonitor;
use super::state::ServerState;
use crate::observability::{log_event_with_fields, Event};

/// Cluster-level inputs to a health check.
#[derive(Debug, Clone, Default)]
pub struct HealthContext {
    /// The checked server is the current master
    pub is_master: bool,
    pub master_url: Option<String>,
    /// Current cluster heartbeat (tick counter)
    pub heartbeat: u64,
    pub max_fail: u32,
    pub fail_max_delay: u64,
    pub rpl_checks: bool,
    pub autorejoin: bool,
    /// Replication channel, empty for the default connection
    pub channel: String,
}

/// Follow-up the check asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejoinTrigger {
    None,
    /// Previously failed server came back without replication
    Rejoin,
    /// Replica pointed at something other than the current master
    RejoinSlave,
}

/// Outcome of one health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub url: String,
    pub state: ServerState,
    pub prev_state: ServerState,
    pub fail_count: u32,
    pub probe_failed: bool,
    /// `fail_count` reached `max_fail` on this very check
    pub max_fail_reached: bool,
    /// `None` when replication status was not read
    pub link: Option<LinkHealth>,
    pub trigger: RejoinTrigger,
}

impl HealthReport {
    pub fn changed(&self) -> bool {
        self.prev_state != self.state
    }
}

impl ServerMonitor {
    /// Probe the server and update its state.
    pub async fn check(&mut self, ctx: &HealthContext) -> HealthReport {
        self.begin_check();

        let mut link = None;
        let mut trigger = RejoinTrigger::None;
        let probe = self.driver().probe().await;
        let probe_failed = probe.is_err();
        let mut max_fail_reached = false;

        match probe {
            Err(e) => max_fail_reached = self.on_probe_failure(ctx, &e.to_string()),
            Ok(()) => {
                if let Some(health) = self.on_probe_success(ctx).await {
                    trigger = self.rejoin_trigger(ctx, health);
                    link = Some(health);
                }
            }
        }

        self.finish_check(probe_failed, max_fail_reached, link, trigger)
    }

    /// Close a check that did not finish within `limit`, as a failed
    /// probe. The abandoned check has already started the round, so the
    /// previous state is left as it set it.
    pub fn check_timed_out(&mut self, ctx: &HealthContext, limit: Duration) -> HealthReport {
        let reason = format!("health check exceeded {}ms", limit.as_millis());
        let max_fail_reached = self.on_probe_failure(ctx, &reason);
        self.finish_check(true, max_fail_reached, None, RejoinTrigger::None)
    }

    fn finish_check(
        &self,
        probe_failed: bool,
        max_fail_reached: bool,
        link: Option<LinkHealth>,
        trigger: RejoinTrigger,
    ) -> HealthReport {
        if self.state_changed() {
            log_event_with_fields(
                Event::StateChanged,
                &[
                    ("url", &self.url()),
                    ("prev_state", self.prev_state().as_str()),
                    ("state", self.state().as_str()),
                ],
            );
        }

        HealthReport {
            url: self.url(),
            state: self.state(),
            prev_state: self.prev_state(),
            fail_count: self.fail_count,
            probe_failed,
            max_fail_reached,
            link,
            trigger,
        }
    }

    /// Returns true when this failure is the one that reached `max_fail`.
    fn on_probe_failure(&mut self, ctx: &HealthContext, reason: &str) -> bool {
        self.fail_count = self.fail_count.saturating_add(1);
        if ctx.is_master && self.fail_count == 1 {
            self.fail_suspect_heartbeat = ctx.heartbeat;
        }

        let url = self.url();
        let fail_count = self.fail_count.to_string();
        log_event_with_fields(
            Event::ProbeFailed,
            &[("url", &url), ("fail_count", &fail_count), ("reason", reason)],
        );

        let reached = self.fail_count == ctx.max_fail;
        if reached {
            let max_fail = ctx.max_fail.to_string();
            let is_master = ctx.is_master.to_string();
            log_event_with_fields(
                Event::MaxFailReached,
                &[("url", &url), ("max_fail", &max_fail), ("is_master", &is_master)],
            );
        }

        if self.fail_count >= ctx.max_fail {
            self.move_to(ServerState::Failed);
        } else if self.state() != ServerState::Maintenance && self.state() != ServerState::Failed {
            self.move_to(ServerState::Suspect);
        }
        reached
    }

    /// Returns the link health, or `None` if status could not be read.
    async fn on_probe_success(&mut self, ctx: &HealthContext) -> Option<LinkHealth> {
        if self.is_maxscale {
            // Binlog relays do not answer the status queries.
            self.move_to(ServerState::Relay);
            self.fail_count = 0;
            return None;
        }

        let node = self.driver().node_status().await;
        let node = match node {
            Ok(node) => node,
            Err(e) => {
                self.status_unreadable(&e.to_string());
                return None;
            }
        };
        self.apply_node_status(node);

        let slave = self.driver().slave_status(&ctx.channel).await;
        match slave {
            Ok(slave) => self.apply_slave_status(slave),
            Err(e) => {
                self.status_unreadable(&e.to_string());
                return None;
            }
        }

        let link_ctx = LinkContext {
            is_master: ctx.is_master,
            is_relay: self.is_relay,
            fail_max_delay: ctx.fail_max_delay,
            rpl_checks: ctx.rpl_checks,
        };
        let (next, health) = classify_replication(self.slave_status.as_ref(), &link_ctx);
        let next = if self.is_maintenance {
            ServerState::Maintenance
        } else {
            next
        };
        self.move_to(next);

        if !self.state().is_failed_like() {
            self.fail_count = 0;
        }

        if let (LinkHealth::Stopped(fault), true) = (health, self.state_changed()) {
            let (io_error, sql_error) = self
                .slave_status
                .as_ref()
                .map(|s| (s.last_io_error.clone(), s.last_sql_error.clone()))
                .unwrap_or_default();
            log_event_with_fields(
                Event::ReplicationError,
                &[
                    ("url", &self.url()),
                    ("fault", fault.as_str()),
                    ("last_io_error", &io_error),
                    ("last_sql_error", &sql_error),
                ],
            );
        }

        Some(health)
    }

    fn status_unreadable(&mut self, reason: &str) {
        log_event_with_fields(
            Event::StatusReadFailed,
            &[("url", &self.url()), ("reason", reason)],
        );
        if !self.is_maintenance {
            self.move_to(ServerState::Unconn);
        }
    }

    fn rejoin_trigger(&self, ctx: &HealthContext, health: LinkHealth) -> RejoinTrigger {
        if ctx.is_master || self.is_maintenance || !ctx.autorejoin {
            return RejoinTrigger::None;
        }
        let Some(master_url) = ctx.master_url.as_deref() else {
            return RejoinTrigger::None;
        };

        if health == LinkHealth::NoReplication {
            if self.prev_state() == ServerState::Failed {
                return RejoinTrigger::Rejoin;
            }
            return RejoinTrigger::None;
        }

        if self.replication_source_name != master_url {
            return RejoinTrigger::RejoinSlave;
        }
        RejoinTrigger::None
    }

    fn move_to(&mut self, next: ServerState) {
        if let Err(e) = self.transition(next) {
            log_event_with_fields(
                Event::StateTransitionRejected,
                &[("url", &self.url()), ("reason", &e.message)],
            );
        }
    }
}
