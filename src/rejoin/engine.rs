//! Rejoin orchestration
//!
//! Guard, crash lookup, binlog capture, ahead check, plan, execute, then
//! retire the crash record. Runs on the health-check task of the returning
//! server; rejoins of different servers may overlap.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use super::binlog::{capture_prefix, captured_file};
use super::commands::{self, Credentials, ToolPaths};
use super::decision::{
    plan_rejoin, replication_ahead_of_election, ReconcileMethod, RejoinCapabilities, RejoinPlan,
    ServerPosition,
};
use super::errors::{RejoinError, RejoinResult};
use crate::cluster::SharedTopology;
use crate::crash::{Crash, CrashStore};
use crate::driver::ServerEndpoint;
use crate::exec::CommandRunner;
use crate::monitor::ServerMonitor;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, ObservationScope};

/// Capacity of the rejoin event channel.
const EVENT_CAPACITY: usize = 64;

/// Rejoin configuration
#[derive(Debug, Clone)]
pub struct RejoinSettings {
    pub autorejoin_flashback: bool,
    pub autorejoin_backup_binlog: bool,
    pub autorejoin_mysqldump: bool,
    /// `<script> <failedHost> <newMasterHost>`, run when no method applies
    pub rejoin_script: Option<String>,
    pub working_dir: PathBuf,
    /// Administrative account, used by dump and flashback clients
    pub credentials: Credentials,
    /// Replication account
    pub replication: Credentials,
    pub channel: String,
    pub master_connect_retry: u32,
    pub master_heartbeat_period: u32,
    /// Replicas follow this binlog relay instead of the master
    pub binlog_relay: Option<ServerEndpoint>,
    pub tools: ToolPaths,
    /// Server id `mysqlbinlog` presents when capturing
    pub capture_server_id: u64,
}

/// How a server was brought back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejoinStrategy {
    Sync,
    Flashback,
    Mysqldump,
}

impl RejoinStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejoinStrategy::Sync => "sync",
            RejoinStrategy::Flashback => "flashback",
            RejoinStrategy::Mysqldump => "mysqldump",
        }
    }
}

impl fmt::Display for RejoinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broadcast after every successful rejoin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejoinEvent {
    pub url: String,
    pub strategy: RejoinStrategy,
    pub at: DateTime<Utc>,
}

/// Result of a rejoin attempt that did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejoinOutcome {
    Rejoined(RejoinStrategy),
    /// No automatic method; the crash record is kept
    Manual { reason: String, script_ran: bool },
}

/// Brings failed servers back into the topology.
pub struct RejoinEngine {
    pub(super) settings: RejoinSettings,
    pub(super) topology: SharedTopology,
    pub(super) runner: Arc<dyn CommandRunner>,
    store: Option<CrashStore>,
    events: broadcast::Sender<RejoinEvent>,
    metrics: Arc<MetricsRegistry>,
}

impl RejoinEngine {
    pub fn new(
        settings: RejoinSettings,
        topology: SharedTopology,
        runner: Arc<dyn CommandRunner>,
        store: Option<CrashStore>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            settings,
            topology,
            runner,
            store,
            events,
            metrics,
        }
    }

    pub fn settings(&self) -> &RejoinSettings {
        &self.settings
    }

    /// Receive an event for every successful rejoin from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RejoinEvent> {
        self.events.subscribe()
    }

    /// Rejoin a server that came back without replication after a failure.
    pub async fn rejoin(&self, server: &ServerMonitor) -> RejoinResult<RejoinOutcome> {
        let url = server.url();
        let (master, crash) = match self.admit(&url) {
            Ok(admitted) => admitted,
            Err(e) => {
                log_event_with_fields(
                    Event::RejoinAborted,
                    &[("url", &url), ("reason", &e.to_string())],
                );
                return Err(e);
            }
        };

        let scope = ObservationScope::with_fields(
            "REJOIN",
            &[("url", &url), ("master", &master.url()), ("crash_id", &crash.id.to_string())],
        );
        match self.reconcile(server, &master, &crash).await {
            Ok(outcome) => {
                let result = match &outcome {
                    RejoinOutcome::Rejoined(strategy) => strategy.as_str().to_string(),
                    RejoinOutcome::Manual { reason, .. } => format!("manual: {}", reason),
                };
                scope.complete_with_fields(&[("outcome", &result)]);
                Ok(outcome)
            }
            Err(e) => {
                self.metrics.increment_rejoins_failed();
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    /// Guard and crash lookup.
    fn admit(&self, url: &str) -> RejoinResult<(ServerEndpoint, Crash)> {
        let mut topology = self.topology.write();
        let master = match topology.master.as_deref() {
            None => return Err(RejoinError::NoMaster(url.to_string())),
            Some(master) if master == url => return Err(RejoinError::IsMaster(url.to_string())),
            Some(master) => ServerEndpoint::parse(master)?,
        };
        let crash = topology
            .crashes
            .get(url)
            .cloned()
            .ok_or_else(|| RejoinError::MissingCrash(url.to_string()))?;
        Ok((master, crash))
    }

    async fn reconcile(
        &self,
        server: &ServerMonitor,
        master: &ServerEndpoint,
        crash: &Crash,
    ) -> RejoinResult<RejoinOutcome> {
        let captured = if self.settings.autorejoin_backup_binlog {
            self.capture(server, crash).await
        } else {
            None
        };

        let position = ServerPosition {
            server_id: server.server_id,
            current_gtid: &server.current_gtid,
            binary_log_file: &server.binary_log_file,
            binary_log_pos: server.binary_log_pos,
        };
        let ahead = replication_ahead_of_election(&position, crash);
        let caps = RejoinCapabilities {
            binlog_relay: self.settings.binlog_relay.is_some(),
            election_gtid: crash.used_gtid_at_election(),
            can_flashback: self.topology.read().can_flashback,
            autorejoin_flashback: self.settings.autorejoin_flashback,
            autorejoin_backup_binlog: self.settings.autorejoin_backup_binlog,
            autorejoin_mysqldump: self.settings.autorejoin_mysqldump,
        };
        let plan = plan_rejoin(ahead, &caps);

        let url = server.url();
        log_event_with_fields(
            Event::RejoinPlanned,
            &[("url", &url), ("ahead", ahead.as_str()), ("plan", &plan.to_string())],
        );

        match plan {
            RejoinPlan::Sync => {
                self.sync(server, master, crash).await?;
                Ok(self.finish(&url, RejoinStrategy::Sync))
            }
            RejoinPlan::Reconcile(methods) => {
                let mut failures = Vec::with_capacity(methods.len());
                for method in methods {
                    let attempt = match method {
                        ReconcileMethod::Flashback => self
                            .flashback(server, master, crash, captured.as_deref())
                            .await
                            .map(|_| RejoinStrategy::Flashback),
                        ReconcileMethod::Mysqldump => self
                            .mysqldump(server, master)
                            .await
                            .map(|_| RejoinStrategy::Mysqldump),
                    };
                    match attempt {
                        Ok(strategy) => return Ok(self.finish(&url, strategy)),
                        Err(e) => {
                            let event = match method {
                                ReconcileMethod::Flashback => Event::FlashbackFailed,
                                ReconcileMethod::Mysqldump => Event::MysqldumpFailed,
                            };
                            log_event_with_fields(
                                event,
                                &[("url", &url), ("reason", &e.to_string())],
                            );
                            failures.push(e.to_string());
                        }
                    }
                }
                self.run_rejoin_script(server, master).await;
                Err(RejoinError::AllMethodsFailed {
                    url,
                    reason: failures.join("; "),
                })
            }
            RejoinPlan::Manual(reason) => {
                log_event_with_fields(Event::RejoinManual, &[("url", &url), ("reason", &reason)]);
                let script_ran = self.run_rejoin_script(server, master).await;
                Ok(RejoinOutcome::Manual { reason, script_ran })
            }
        }
    }

    /// Copy the old master's binlog from the crash coordinates. A failure
    /// disables flashback for the rest of the process.
    async fn capture(&self, server: &ServerMonitor, crash: &Crash) -> Option<PathBuf> {
        let prefix = capture_prefix(&self.settings.working_dir, server.endpoint(), Utc::now());
        let cmd = commands::binlog_capture(
            &self.settings.tools,
            self.settings.capture_server_id,
            &self.settings.replication,
            server.endpoint(),
            &prefix,
            crash.failover_master_log_pos,
            &crash.failover_master_log_file,
        );

        match self.runner.run(&cmd).await {
            Ok(_) => {
                let file = captured_file(&prefix, &crash.failover_master_log_file);
                log_event_with_fields(
                    Event::BinlogCaptured,
                    &[("url", &server.url()), ("file", &file.display().to_string())],
                );
                Some(file)
            }
            Err(e) => {
                self.topology.write().disable_flashback();
                self.metrics.increment_binlog_capture_failures();
                log_event_with_fields(
                    Event::BinlogCaptureFailed,
                    &[("url", &server.url()), ("command", &cmd.to_string()), ("reason", &e.to_string())],
                );
                None
            }
        }
    }

    /// Retire the crash record and announce the rejoin.
    fn finish(&self, url: &str, strategy: RejoinStrategy) -> RejoinOutcome {
        let registry = {
            let mut topology = self.topology.write();
            topology.crashes.delete(url);
            topology.crashes.clone()
        };
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&registry) {
                log_event_with_fields(Event::CrashesSaveFailed, &[("reason", &e.to_string())]);
            }
        }

        match strategy {
            RejoinStrategy::Sync => self.metrics.increment_rejoins_sync(),
            RejoinStrategy::Flashback => self.metrics.increment_rejoins_flashback(),
            RejoinStrategy::Mysqldump => self.metrics.increment_rejoins_mysqldump(),
        }

        // No subscriber is fine.
        let _ = self.events.send(RejoinEvent {
            url: url.to_string(),
            strategy,
            at: Utc::now(),
        });
        RejoinOutcome::Rejoined(strategy)
    }
}
