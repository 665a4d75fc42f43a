//! Cluster loop
//!
//! Each tick checks every server on its own task, joins them, folds the
//! results into the shared topology and runs failover admission on the
//! loop task. Alerts for the tick's state changes go out last, so a slow
//! mail relay never delays a failover.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use super::alert::{Alerter, EmailAlert, ScriptAlert, StateAlert};
use super::config::ClusterConfig;
use super::elector::Elector;
use super::errors::{ClusterError, ClusterResult};
use super::hook::{ClusterStateEvent, LogStateHook, StateCode, StateHook};
use super::topology::{SharedTopology, Topology};
use crate::crash::{Crash, CrashRegistry, CrashStore};
use crate::driver::{ServerDriver, ServerEndpoint};
use crate::exec::CommandRunner;
use crate::failover::{self, AdmissionDecision, AdmissionInput, HeartbeatCheck, MasterView};
use crate::monitor::{HealthContext, HealthReport, LinkHealth, RejoinTrigger, ServerMonitor, ServerState};
use crate::observability::{
    log_event, log_event_with_fields, Event, MetricsRegistry, ObservationScope,
};
use crate::rejoin::{RejoinEngine, RejoinEvent};

/// What one tick saw and did.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub heartbeat: u64,
    /// One report per server, in configuration order
    pub reports: Vec<HealthReport>,
    pub decision: AdmissionDecision,
    /// Master elected on this tick
    pub elected: Option<String>,
}

impl TickReport {
    pub fn report(&self, url: &str) -> Option<&HealthReport> {
        self.reports.iter().find(|r| r.url == url)
    }
}

/// Result of one server's check task.
struct ServerView {
    report: HealthReport,
    /// Replication source when the server has a replication channel
    source: Option<String>,
    driver: Arc<dyn ServerDriver>,
}

/// Holds `in_failover` for the duration of a failover.
struct FailoverGuard {
    topology: SharedTopology,
}

impl FailoverGuard {
    fn acquire(topology: &SharedTopology) -> ClusterResult<Self> {
        let mut state = topology.write();
        if state.in_failover {
            return Err(ClusterError::invalid_state("failover already in progress"));
        }
        state.in_failover = true;
        Ok(Self {
            topology: topology.clone(),
        })
    }
}

impl Drop for FailoverGuard {
    fn drop(&mut self) {
        self.topology.write().in_failover = false;
    }
}

/// The replication controller.
pub struct Cluster {
    config: ClusterConfig,
    /// URL and monitor of every configured server
    servers: Vec<(String, Arc<Mutex<ServerMonitor>>)>,
    topology: SharedTopology,
    rejoin: Arc<RejoinEngine>,
    elector: Arc<dyn Elector>,
    alerter: Alerter,
    hook: Arc<dyn StateHook>,
    metrics: Arc<MetricsRegistry>,
    store: CrashStore,
}

impl Cluster {
    /// Build the controller and load persisted crash records from the
    /// working directory.
    pub fn new(
        config: ClusterConfig,
        drivers: Vec<(ServerEndpoint, Arc<dyn ServerDriver>)>,
        runner: Arc<dyn CommandRunner>,
        elector: Arc<dyn Elector>,
    ) -> ClusterResult<Self> {
        let store = CrashStore::in_dir(&config.working_path());
        let mut crashes = store.load()?;
        crashes.set_lookup(config.crash_lookup());
        log_event_with_fields(
            Event::CrashesLoaded,
            &[("count", &crashes.len().to_string()), ("path", &store.path().display().to_string())],
        );

        let topology = SharedTopology::new(Topology::new(crashes));
        let metrics = Arc::new(MetricsRegistry::new());
        let rejoin = RejoinEngine::new(
            config.rejoin_settings()?,
            topology.clone(),
            Arc::clone(&runner),
            Some(store.clone()),
            Arc::clone(&metrics),
        );

        let mut alerter = Alerter::new(Arc::clone(&metrics));
        if let Some(script) = &config.alert_script {
            alerter = alerter.with_sink(Arc::new(ScriptAlert::new(script, Arc::clone(&runner))));
        }
        if let Some(mail) = &config.mail {
            alerter = alerter.with_sink(Arc::new(EmailAlert::new(mail.clone())));
        }

        let servers = drivers
            .into_iter()
            .map(|(endpoint, driver)| {
                (endpoint.url(), Arc::new(Mutex::new(ServerMonitor::new(endpoint, driver))))
            })
            .collect();

        Ok(Self {
            config,
            servers,
            topology,
            rejoin: Arc::new(rejoin),
            elector,
            alerter,
            hook: Arc::new(LogStateHook),
            metrics,
            store,
        })
    }

    pub fn with_hook(mut self, hook: Arc<dyn StateHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn with_alerter(mut self, alerter: Alerter) -> Self {
        self.alerter = alerter;
        self
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn topology(&self) -> &SharedTopology {
        &self.topology
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Receive an event for every successful rejoin from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RejoinEvent> {
        self.rejoin.subscribe()
    }

    /// Operator override of the master, before the first tick.
    pub fn set_master(&self, url: &str) -> ClusterResult<()> {
        if self.find_server(url).is_none() {
            return Err(ClusterError::invalid_state(format!("{} is not monitored", url)));
        }
        let mut topology = self.topology.write();
        topology.master = Some(url.to_string());
        topology.remove_slave(url);
        Ok(())
    }

    pub async fn server_state(&self, url: &str) -> Option<ServerState> {
        match self.find_server(url) {
            Some(server) => Some(server.lock().await.state()),
            None => None,
        }
    }

    /// Operator action.
    pub async fn set_maintenance(&self, url: &str, on: bool) -> ClusterResult<()> {
        let server = self
            .find_server(url)
            .ok_or_else(|| ClusterError::invalid_state(format!("{} is not monitored", url)))?;
        let mut server = server.lock().await;
        if on {
            server.enter_maintenance();
        } else {
            server.leave_maintenance();
        }
        log_event_with_fields(
            Event::MaintenanceChanged,
            &[("url", url), ("maintenance", &on.to_string())],
        );
        Ok(())
    }

    /// Operator action: allow automatic failovers again after `fail_limit`
    /// was reached.
    pub fn reset_failover_counter(&self) {
        let previous = {
            let mut topology = self.topology.write();
            std::mem::replace(&mut topology.failover_ctr, 0)
        };
        log_event_with_fields(
            Event::FailoverCounterReset,
            &[("previous", &previous.to_string())],
        );
    }

    /// Tick until `shutdown` flips to true or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        log_event_with_fields(
            Event::Startup,
            &[
                ("servers", &self.servers.len().to_string()),
                ("ticker_ms", &self.config.monitoring_ticker_ms.to_string()),
            ],
        );

        let mut ticker = tokio::time::interval(self.config.monitoring_ticker());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let registry = self.topology.read().crashes.clone();
        self.persist(&registry);
        log_event(Event::Shutdown);
    }

    /// One monitoring round.
    pub async fn tick(&self) -> TickReport {
        let (heartbeat, master) = {
            let mut topology = self.topology.write();
            topology.heartbeat += 1;
            (topology.heartbeat, topology.master.clone())
        };

        let views = self.check_servers(heartbeat, master).await;
        self.update_topology(&views);
        self.update_relays(&views).await;
        let alerts: Vec<StateAlert> = views.iter().filter_map(|v| self.report_change(v)).collect();

        let decision = self.check_failed(&views).await;
        let elected = match &decision {
            AdmissionDecision::Proceed { url } => self.failover(url).await.ok(),
            AdmissionDecision::Blocked(reason) => {
                self.metrics.increment_failovers_blocked();
                let master = self.topology.read().master.clone().unwrap_or_default();
                self.hook.set_state(
                    StateCode::FailoverBlocked,
                    ClusterStateEvent::new(master, reason.to_string()),
                );
                None
            }
            AdmissionDecision::Idle(_) => None,
        };

        for alert in &alerts {
            self.alerter.notify(alert).await;
        }

        TickReport {
            heartbeat,
            reports: views.into_iter().map(|v| v.report).collect(),
            decision,
            elected,
        }
    }

    /// Elect a replacement for the master at `failed_url` and record the
    /// crash. Only one failover runs at a time.
    pub async fn failover(&self, failed_url: &str) -> ClusterResult<String> {
        let _guard = FailoverGuard::acquire(&self.topology)?;
        let scope = ObservationScope::with_fields("FAILOVER", &[("master", failed_url)]);

        match self.elect_and_record(failed_url).await {
            Ok(crash) => {
                scope.complete_with_fields(&[("elected", &crash.elected_master_url)]);
                Ok(crash.elected_master_url)
            }
            Err(e) => {
                log_event_with_fields(
                    Event::FailoverFailed,
                    &[("master", failed_url), ("reason", &e.message)],
                );
                self.hook.set_state(
                    StateCode::FailoverFailed,
                    ClusterStateEvent::new(failed_url, e.message.clone()),
                );
                scope.fail(&e.message);
                Err(e)
            }
        }
    }

    fn find_server(&self, url: &str) -> Option<&Arc<Mutex<ServerMonitor>>> {
        self.servers
            .iter()
            .find(|(server_url, _)| server_url == url)
            .map(|(_, server)| server)
    }

    fn health_context(&self, heartbeat: u64, master: Option<String>) -> HealthContext {
        HealthContext {
            is_master: false,
            master_url: master,
            heartbeat,
            max_fail: self.config.max_fail,
            fail_max_delay: self.config.fail_max_delay,
            rpl_checks: self.config.rpl_checks,
            autorejoin: self.config.autorejoin,
            channel: self.config.replication_channel.clone(),
        }
    }

    async fn check_servers(&self, heartbeat: u64, master: Option<String>) -> Vec<ServerView> {
        let mut tasks = JoinSet::new();
        for (index, (_, server)) in self.servers.iter().enumerate() {
            let server = Arc::clone(server);
            let rejoin = Arc::clone(&self.rejoin);
            let hook = Arc::clone(&self.hook);
            let mut ctx = self.health_context(heartbeat, master.clone());
            let check_timeout = self.config.check_timeout();

            tasks.spawn(async move {
                let mut server = server.lock().await;
                ctx.is_master = ctx.master_url.as_deref() == Some(server.url().as_str());
                let checked = tokio::time::timeout(check_timeout, server.check(&ctx)).await;
                let report = match checked {
                    Ok(report) => report,
                    Err(_) => server.check_timed_out(&ctx, check_timeout),
                };

                match report.trigger {
                    RejoinTrigger::Rejoin => {
                        if let Err(e) = rejoin.rejoin(&server).await {
                            hook.set_state(
                                StateCode::RejoinFailed,
                                ClusterStateEvent::new(&report.url, e.to_string()),
                            );
                        }
                    }
                    RejoinTrigger::RejoinSlave => {
                        if let Err(e) = rejoin.rejoin_slave(&server).await {
                            log_event_with_fields(
                                Event::RejoinAborted,
                                &[("url", &report.url), ("reason", &e.to_string())],
                            );
                        }
                    }
                    RejoinTrigger::None => {}
                }

                let view = ServerView {
                    source: server.slave_status.as_ref().map(|s| s.source_url()),
                    driver: Arc::clone(server.driver()),
                    report,
                };
                (index, view)
            });
        }

        let mut views = Vec::with_capacity(self.servers.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(view) => views.push(view),
                Err(e) => log_event_with_fields(
                    Event::StatusReadFailed,
                    &[("reason", &format!("health check task: {}", e))],
                ),
            }
        }
        views.sort_by_key(|(index, _)| *index);
        views.into_iter().map(|(_, view)| view).collect()
    }

    fn update_topology(&self, views: &[ServerView]) {
        let mut topology = self.topology.write();
        for view in views {
            let url = &view.report.url;
            if topology.is_master(url) {
                continue;
            }
            match view.report.state {
                ServerState::Failed | ServerState::StandAlone => {
                    if topology.remove_slave(url) {
                        log_event_with_fields(
                            Event::SlaveRemoved,
                            &[("url", url), ("state", view.report.state.as_str())],
                        );
                    }
                }
                state if state.is_slave_like() && view.source.is_some() => {
                    topology.add_slave(url);
                }
                _ => {}
            }
        }

        if topology.master.is_none() {
            let nodes: Vec<_> = views
                .iter()
                .map(|v| (v.report.url.as_str(), v.report.state, v.source.as_deref()))
                .collect();
            if let Some(master) = discover_master(&nodes) {
                let master = master.to_string();
                topology.remove_slave(&master);
                log_event_with_fields(Event::MasterDiscovered, &[("url", &master)]);
                topology.master = Some(master);
            }
        }
    }

    /// A replica with replicas of its own is a relay.
    async fn update_relays(&self, views: &[ServerView]) {
        let master = self.topology.read().master.clone();
        for view in views {
            let url = view.report.url.as_str();
            let Some(server) = self.find_server(url) else {
                continue;
            };
            let is_relay = master.as_deref() != Some(url)
                && views.iter().any(|v| v.source.as_deref() == Some(url));
            server.lock().await.is_relay = is_relay;
        }
    }

    /// Metrics and hook codes for one server; the alert to send, if its
    /// state changed.
    fn report_change(&self, view: &ServerView) -> Option<StateAlert> {
        let report = &view.report;
        if report.probe_failed {
            self.metrics.increment_probes_failed();
        }
        let alert = StateAlert::from_report(report)?;
        self.metrics.increment_state_changes();

        let is_master = self.topology.read().is_master(&report.url);
        if report.state == ServerState::Failed {
            let code = if is_master {
                StateCode::MasterFailed
            } else {
                StateCode::ServerFailed
            };
            self.hook.set_state(
                code,
                ClusterStateEvent::new(&report.url, format!("{} failed probes", report.fail_count)),
            );
        }
        if let Some(LinkHealth::Stopped(fault)) = report.link {
            self.hook.set_state(
                StateCode::ReplicationStopped,
                ClusterStateEvent::new(&report.url, fault.as_str()),
            );
        }
        Some(alert)
    }

    async fn check_failed(&self, views: &[ServerView]) -> AdmissionDecision {
        let (input, heartbeat) = {
            let topology = self.topology.read();
            let master = topology.master.as_deref().and_then(|url| {
                views.iter().find(|v| v.report.url == url).map(|v| MasterView {
                    url: url.to_string(),
                    state: v.report.state,
                    fail_count: v.report.fail_count,
                })
            });
            let input = AdmissionInput {
                in_progress: topology.in_failover,
                master,
                interactive: self.config.interactive,
                max_fail: self.config.max_fail,
                fail_limit: self.config.fail_limit,
                failover_ctr: topology.failover_ctr,
                fail_time: self.config.fail_time,
                failover_ts: topology.failover_ts,
                now: Utc::now().timestamp(),
            };
            let heartbeat = self.config.check_false_positive_heartbeat.then(|| HeartbeatCheck {
                slaves: views
                    .iter()
                    .filter(|v| topology.slaves.contains(&v.report.url))
                    .map(|v| (v.report.url.clone(), Arc::clone(&v.driver)))
                    .collect(),
                channel: self.config.replication_channel.clone(),
                interval: self.config.heartbeat_sample_interval(),
            });
            (input, heartbeat)
        };

        failover::check_failed(&input, heartbeat.as_ref()).await
    }

    async fn elect_and_record(&self, failed_url: &str) -> ClusterResult<Crash> {
        let failed = ServerEndpoint::parse(failed_url)
            .map_err(|e| ClusterError::election(e.to_string()))?;
        let candidates: Vec<String> = self
            .topology
            .read()
            .slaves
            .iter()
            .filter(|s| s.as_str() != failed_url)
            .cloned()
            .collect();
        log_event_with_fields(
            Event::FailoverStart,
            &[("master", failed_url), ("candidates", &candidates.join(","))],
        );

        let elected = self.elector.elect(&failed, &candidates).await?;
        if elected == failed_url {
            return Err(ClusterError::election(format!(
                "elector returned the failed master {}",
                failed_url
            )));
        }
        let elected_server = self.find_server(&elected).ok_or_else(|| {
            ClusterError::election(format!("elected {} is not a monitored server", elected))
        })?;

        let (old_file, old_pos) = match self.find_server(failed_url) {
            Some(server) => {
                let server = server.lock().await;
                (server.binary_log_file.clone(), server.binary_log_pos)
            }
            None => (String::new(), 0),
        };

        let crash = {
            let server = elected_server.lock().await;
            let (new_file, new_pos) = match server.driver().node_status().await {
                Ok(status) => (status.binary_log_file, status.binary_log_pos),
                Err(e) => {
                    log_event_with_fields(
                        Event::StatusReadFailed,
                        &[("url", &elected), ("reason", &e.to_string())],
                    );
                    (server.binary_log_file.clone(), server.binary_log_pos)
                }
            };
            let crash = Crash::new(failed_url, &elected)
                .with_master_coordinates(old_file, old_pos)
                .with_new_master_coordinates(new_file, new_pos)
                .with_semi_sync(server.semi_sync_slave_status);
            if server.io_gtid.is_empty() {
                crash
            } else {
                crash.with_io_gtid(server.io_gtid.clone())
            }
        };

        let (registry, failover_ctr) = {
            let mut topology = self.topology.write();
            topology.crashes.push(crash.clone());
            topology.master = Some(elected.clone());
            topology.remove_slave(&elected);
            topology.failover_ctr += 1;
            topology.failover_ts = Utc::now().timestamp();
            (topology.crashes.clone(), topology.failover_ctr)
        };
        self.persist(&registry);
        self.metrics.increment_failovers();

        log_event_with_fields(
            Event::FailoverComplete,
            &[
                ("master", failed_url),
                ("elected", &elected),
                ("crash_id", &crash.id.to_string()),
                ("failover_ctr", &failover_ctr.to_string()),
            ],
        );
        self.hook.set_state(
            StateCode::FailoverDone,
            ClusterStateEvent::new(&elected, format!("replaces {}", failed_url)),
        );
        Ok(crash)
    }

    fn persist(&self, registry: &CrashRegistry) {
        if let Err(e) = self.store.save(registry) {
            log_event_with_fields(Event::CrashesSaveFailed, &[("reason", &e.to_string())]);
        }
    }
}

/// The one reachable, non-replicating server others replicate from.
///
/// `None` when there is no such server or more than one.
pub fn discover_master<'a>(nodes: &[(&'a str, ServerState, Option<&'a str>)]) -> Option<&'a str> {
    let mut candidates = nodes.iter().filter(|(url, state, source)| {
        source.is_none()
            && !state.is_failed_like()
            && *state != ServerState::Maintenance
            && nodes.iter().any(|(_, _, s)| *s == Some(*url))
    });
    let first = candidates.next()?;
    match candidates.next() {
        Some(_) => None,
        None => Some(first.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_master() {
        let nodes = [
            ("db1:3306", ServerState::StandAlone, None),
            ("db2:3306", ServerState::Slave, Some("db1:3306")),
            ("db3:3306", ServerState::Slave, Some("db1:3306")),
        ];
        assert_eq!(discover_master(&nodes), Some("db1:3306"));
    }

    #[test]
    fn test_discover_master_needs_replicas() {
        let nodes = [
            ("db1:3306", ServerState::StandAlone, None),
            ("db2:3306", ServerState::StandAlone, None),
        ];
        assert_eq!(discover_master(&nodes), None);
    }

    #[test]
    fn test_discover_master_ignores_failed_source() {
        let nodes = [
            ("db1:3306", ServerState::Failed, None),
            ("db2:3306", ServerState::SlaveErr, Some("db1:3306")),
        ];
        assert_eq!(discover_master(&nodes), None);
    }
}
