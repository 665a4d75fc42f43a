//! Rejoin Flow Tests
//!
//! A deposed master (db1) returns after db2 was elected. Each test sets up
//! the crash record and the returning server's position, then checks which
//! statements and external commands the rejoin issued.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::{gtid, replicating_from, FakeDriver, FakeRunner};
use replwatch::cluster::{SharedTopology, Topology};
use replwatch::crash::{Crash, CrashRegistry, CrashStore};
use replwatch::driver::{ReplicationMode, ServerEndpoint};
use replwatch::monitor::ServerMonitor;
use replwatch::observability::MetricsRegistry;
use replwatch::rejoin::{
    Credentials, RejoinEngine, RejoinError, RejoinOutcome, RejoinSettings, RejoinStrategy,
    ToolPaths,
};
use tempfile::TempDir;

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    dir: TempDir,
    topology: SharedTopology,
    runner: Arc<FakeRunner>,
    metrics: Arc<MetricsRegistry>,
    engine: RejoinEngine,
}

fn settings(dir: &Path) -> RejoinSettings {
    RejoinSettings {
        autorejoin_flashback: false,
        autorejoin_backup_binlog: true,
        autorejoin_mysqldump: false,
        rejoin_script: None,
        working_dir: dir.to_path_buf(),
        credentials: Credentials::new("root", "secret"),
        replication: Credentials::new("repl", "rplpass"),
        channel: String::new(),
        master_connect_retry: 10,
        master_heartbeat_period: 1,
        binlog_relay: None,
        tools: ToolPaths::default(),
        capture_server_id: 10000,
    }
}

fn harness(crash: Option<Crash>, configure: impl FnOnce(&mut RejoinSettings)) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut crashes = CrashRegistry::new();
    if let Some(crash) = crash {
        crashes.push(crash);
    }
    let store = CrashStore::in_dir(dir.path());
    store.save(&crashes).unwrap();

    let mut topology = Topology::new(crashes);
    topology.master = Some("db2:3306".into());
    let topology = SharedTopology::new(topology);

    let mut settings = settings(dir.path());
    configure(&mut settings);

    let runner = FakeRunner::new();
    let metrics = Arc::new(MetricsRegistry::new());
    let engine = RejoinEngine::new(
        settings,
        topology.clone(),
        runner.clone(),
        Some(store),
        Arc::clone(&metrics),
    );
    Harness {
        dir,
        topology,
        runner,
        metrics,
        engine,
    }
}

/// db1 as it comes back: server id 1, at `current_gtid`.
fn returning_master(current_gtid: &str) -> (ServerMonitor, Arc<FakeDriver>) {
    let driver = FakeDriver::new("db1:3306");
    let mut server = ServerMonitor::new(ServerEndpoint::new("db1", 3306), driver.clone());
    server.server_id = 1;
    server.current_gtid = gtid(current_gtid);
    server.binary_log_file = "mariadb-bin.000009".into();
    server.binary_log_pos = 1200;
    (server, driver)
}

fn gtid_crash(election_gtid: &str) -> Crash {
    Crash::new("db1:3306", "db2:3306")
        .with_master_coordinates("mariadb-bin.000009", 1200)
        .with_new_master_coordinates("mariadb-bin.000003", 4)
        .with_io_gtid(gtid(election_gtid))
}

fn persisted_crashes(dir: &Path) -> usize {
    CrashStore::in_dir(dir).load().unwrap().len()
}

// =============================================================================
// Sync
// =============================================================================

/// Server exactly at the election position replicates from the new master.
#[tokio::test]
async fn test_not_ahead_rejoins_by_sync() {
    let h = harness(Some(gtid_crash("0-1-10")), |_| {});
    let mut events = h.engine.subscribe();
    let (server, driver) = returning_master("0-1-10");

    let outcome = h.engine.rejoin(&server).await.unwrap();
    assert_eq!(outcome, RejoinOutcome::Rejoined(RejoinStrategy::Sync));

    let opts = driver.last_change_master().unwrap();
    assert_eq!((opts.host.as_str(), opts.port), ("db2", 3306));
    assert_eq!(opts.mode, ReplicationMode::CurrentPos);
    assert_eq!(opts.user, "repl");
    assert_eq!(driver.calls(), vec!["start_slave".to_string()]);

    // Crash consumed, in memory and on disk.
    assert!(h.topology.read().crashes.is_empty());
    assert_eq!(persisted_crashes(h.dir.path()), 0);
    assert_eq!(h.metrics.snapshot().rejoins_sync, 1);

    let event = events.try_recv().unwrap();
    assert_eq!(event.url, "db1:3306");
    assert_eq!(event.strategy, RejoinStrategy::Sync);
}

/// Without GTID at election, matching coordinates sync positionally at the
/// new master's own coordinates.
#[tokio::test]
async fn test_positional_sync_uses_new_master_coordinates() {
    let crash = Crash::new("db1:3306", "db2:3306")
        .with_master_coordinates("mariadb-bin.000009", 1200)
        .with_new_master_coordinates("mariadb-bin.000003", 4);
    let h = harness(Some(crash), |_| {});
    let (server, driver) = returning_master("");

    let outcome = h.engine.rejoin(&server).await.unwrap();
    assert_eq!(outcome, RejoinOutcome::Rejoined(RejoinStrategy::Sync));

    let opts = driver.last_change_master().unwrap();
    assert_eq!(opts.mode, ReplicationMode::Positional);
    assert_eq!(opts.logfile, "mariadb-bin.000003");
    assert_eq!(opts.logpos, 4);
}

#[tokio::test]
async fn test_positional_sync_without_coordinates_keeps_crash() {
    let crash = Crash::new("db1:3306", "db2:3306").with_master_coordinates("mariadb-bin.000009", 1200);
    let h = harness(Some(crash), |_| {});
    let (server, driver) = returning_master("");

    let err = h.engine.rejoin(&server).await.unwrap_err();
    assert!(matches!(err, RejoinError::MissingCoordinates(_)));
    assert!(driver.last_change_master().is_none());
    assert_eq!(h.topology.read().crashes.len(), 1);
    assert_eq!(h.metrics.snapshot().rejoins_failed, 1);
}

/// Behind a binlog relay the server follows the relay even when ahead.
#[tokio::test]
async fn test_binlog_relay_always_syncs() {
    let h = harness(Some(gtid_crash("0-1-10")), |s| {
        s.binlog_relay = Some(ServerEndpoint::new("mxs", 4006));
    });
    let (server, driver) = returning_master("0-1-15");

    let outcome = h.engine.rejoin(&server).await.unwrap();
    assert_eq!(outcome, RejoinOutcome::Rejoined(RejoinStrategy::Sync));

    let opts = driver.last_change_master().unwrap();
    assert_eq!(opts.host, "mxs");
    assert_eq!(opts.mode, ReplicationMode::Mxs);
    assert_eq!(opts.logfile, "mariadb-bin.000009");
    assert_eq!(opts.logpos, 1200);
}

// =============================================================================
// Flashback and dump
// =============================================================================

/// Ahead with flashback enabled: capture, reverse-apply, reset the GTID
/// position to the election, replicate with SLAVE_POS.
#[tokio::test]
async fn test_ahead_rejoins_by_flashback() {
    let h = harness(Some(gtid_crash("0-1-10")), |s| s.autorejoin_flashback = true);
    let (server, driver) = returning_master("0-1-12");

    let outcome = h.engine.rejoin(&server).await.unwrap();
    assert_eq!(outcome, RejoinOutcome::Rejoined(RejoinStrategy::Flashback));

    let capture = h
        .runner
        .commands()
        .into_iter()
        .find(|c| c.has_arg("--read-from-remote-server"))
        .unwrap();
    assert_eq!(capture.flag_value("--start-position"), Some("1200"));
    assert_eq!(capture.args.last().map(String::as_str), Some("mariadb-bin.000009"));
    assert_eq!(capture.flag_value("--host"), Some("db1"));

    let pipes = h.runner.pipes();
    assert_eq!(pipes.len(), 1);
    let (producer, consumer) = &pipes[0];
    assert!(producer.has_arg("--flashback"));
    assert_eq!(consumer.program, "mysql");
    assert_eq!(consumer.flag_value("--host"), Some("db1"));

    assert_eq!(
        driver.calls(),
        vec!["set_gtid_slave_pos 0-1-10".to_string(), "start_slave".to_string()]
    );
    assert_eq!(driver.last_change_master().unwrap().mode, ReplicationMode::SlavePos);
    assert_eq!(h.metrics.snapshot().rejoins_flashback, 1);
}

/// Not semi-sync caught up at election: the capture is archived too.
#[tokio::test]
async fn test_flashback_archives_capture_without_semi_sync() {
    let h = harness(Some(gtid_crash("0-1-10").with_semi_sync(false)), |s| {
        s.autorejoin_flashback = true
    });
    let (server, _driver) = returning_master("0-1-12");

    h.engine.rejoin(&server).await.unwrap();

    let backups: Vec<_> = std::fs::read_dir(h.dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("crash-bin-"))
        .collect();
    assert_eq!(backups.len(), 1);
    assert_eq!(std::fs::read_dir(backups[0].path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_flashback_failure_falls_back_to_mysqldump() {
    let h = harness(Some(gtid_crash("0-1-10")), |s| {
        s.autorejoin_flashback = true;
        s.autorejoin_mysqldump = true;
    });
    h.runner.fail_on("--flashback");
    let (server, driver) = returning_master("0-1-12");

    let outcome = h.engine.rejoin(&server).await.unwrap();
    assert_eq!(outcome, RejoinOutcome::Rejoined(RejoinStrategy::Mysqldump));

    let pipes = h.runner.pipes();
    assert_eq!(pipes.len(), 2);
    let (dump, _) = &pipes[1];
    assert_eq!(dump.program, "mysqldump");
    assert!(dump.has_arg("--single-transaction"));
    assert_eq!(dump.flag_value("--host"), Some("db2"));

    // Position comes from the dump, not from the diverged binlog.
    assert_eq!(driver.last_change_master().unwrap().mode, ReplicationMode::SlavePos);
    assert_eq!(h.metrics.snapshot().rejoins_mysqldump, 1);
}

/// A failed capture disables flashback for good; dump still applies.
#[tokio::test]
async fn test_capture_failure_disables_flashback() {
    let h = harness(Some(gtid_crash("0-1-10")), |s| {
        s.autorejoin_flashback = true;
        s.autorejoin_mysqldump = true;
    });
    h.runner.fail_on("--read-from-remote-server");
    let (server, _driver) = returning_master("0-1-12");

    let outcome = h.engine.rejoin(&server).await.unwrap();
    assert_eq!(outcome, RejoinOutcome::Rejoined(RejoinStrategy::Mysqldump));

    assert!(!h.topology.read().can_flashback);
    assert_eq!(h.metrics.snapshot().binlog_capture_failures, 1);
    assert!(h
        .runner
        .pipes()
        .iter()
        .all(|(producer, _)| !producer.has_arg("--flashback")));
}

#[tokio::test]
async fn test_every_method_failing_keeps_crash_and_runs_script() {
    let h = harness(Some(gtid_crash("0-1-10")), |s| {
        s.autorejoin_flashback = true;
        s.autorejoin_mysqldump = true;
        s.rejoin_script = Some("/opt/rejoin.sh".into());
    });
    h.runner.fail_on("--flashback");
    h.runner.fail_on("mysqldump");
    let (server, _driver) = returning_master("0-1-12");

    let err = h.engine.rejoin(&server).await.unwrap_err();
    assert!(matches!(err, RejoinError::AllMethodsFailed { .. }));
    assert_eq!(h.topology.read().crashes.len(), 1);
    assert_eq!(persisted_crashes(h.dir.path()), 1);
    assert!(h.runner.ran("/opt/rejoin.sh"));
    assert_eq!(h.metrics.snapshot().rejoins_failed, 1);
}

// =============================================================================
// Manual
// =============================================================================

#[tokio::test]
async fn test_ahead_without_methods_is_manual() {
    let h = harness(Some(gtid_crash("0-1-10")), |_| {});
    let (server, driver) = returning_master("0-1-12");

    let outcome = h.engine.rejoin(&server).await.unwrap();
    match outcome {
        RejoinOutcome::Manual { reason, script_ran } => {
            assert!(reason.contains("flashback disabled"));
            assert!(!script_ran);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(driver.last_change_master().is_none());
    assert_eq!(h.topology.read().crashes.len(), 1);
}

#[tokio::test]
async fn test_manual_runs_rejoin_script_with_hosts() {
    let h = harness(Some(gtid_crash("0-1-10")), |s| {
        s.rejoin_script = Some("/opt/rejoin.sh".into())
    });
    let (server, _driver) = returning_master("0-1-12");

    let outcome = h.engine.rejoin(&server).await.unwrap();
    assert!(matches!(outcome, RejoinOutcome::Manual { script_ran: true, .. }));

    let script = h
        .runner
        .commands()
        .into_iter()
        .find(|c| c.program == "/opt/rejoin.sh")
        .unwrap();
    assert_eq!(script.args, vec!["db1".to_string(), "db2".to_string()]);
}

/// The election saw nothing from server id 1: it was not the master then,
/// so the rejoin cannot prove it is safe.
#[tokio::test]
async fn test_cascading_failure_treated_as_ahead() {
    let h = harness(Some(gtid_crash("0-3-40")), |_| {});
    let (server, _driver) = returning_master("0-1-12");

    let outcome = h.engine.rejoin(&server).await.unwrap();
    assert!(matches!(outcome, RejoinOutcome::Manual { .. }));
}

// =============================================================================
// Guards
// =============================================================================

#[tokio::test]
async fn test_missing_crash_is_an_error() {
    let h = harness(None, |_| {});
    let (server, driver) = returning_master("0-1-10");

    let err = h.engine.rejoin(&server).await.unwrap_err();
    assert!(matches!(err, RejoinError::MissingCrash(url) if url == "db1:3306"));
    assert!(driver.last_change_master().is_none());
    assert!(h.runner.commands().is_empty());
}

#[tokio::test]
async fn test_master_and_masterless_cluster_are_refused() {
    let h = harness(Some(gtid_crash("0-1-10")), |_| {});
    let (server, _driver) = returning_master("0-1-10");

    h.topology.write().master = Some("db1:3306".into());
    assert!(matches!(
        h.engine.rejoin(&server).await.unwrap_err(),
        RejoinError::IsMaster(_)
    ));

    h.topology.write().master = None;
    assert!(matches!(
        h.engine.rejoin(&server).await.unwrap_err(),
        RejoinError::NoMaster(_)
    ));
    assert_eq!(h.topology.read().crashes.len(), 1);
}

// =============================================================================
// Indirect replicas
// =============================================================================

fn stale_replica(slave_gtid: &str) -> (ServerMonitor, Arc<FakeDriver>) {
    let driver = FakeDriver::new("db3:3306");
    let mut server = ServerMonitor::new(ServerEndpoint::new("db3", 3306), driver.clone());
    server.server_id = 3;
    server.apply_slave_status(Some(replicating_from("db1", 3306)));
    server.slave_gtid = gtid(slave_gtid);
    (server, driver)
}

#[tokio::test]
async fn test_replica_behind_election_is_repointed() {
    let h = harness(Some(gtid_crash("0-1-10")), |_| {});
    let (server, driver) = stale_replica("0-1-8");

    assert!(h.engine.rejoin_slave(&server).await.unwrap());
    assert_eq!(
        driver.calls(),
        vec!["stop_slave".to_string(), "start_slave".to_string()]
    );
    let opts = driver.last_change_master().unwrap();
    assert_eq!((opts.host.as_str(), opts.mode), ("db2", ReplicationMode::CurrentPos));

    // The crash belongs to db1's rejoin, not to the replica's.
    assert_eq!(h.topology.read().crashes.len(), 1);
}

#[tokio::test]
async fn test_replica_caught_up_is_left_alone() {
    let h = harness(Some(gtid_crash("0-1-10")), |_| {});
    let (server, driver) = stale_replica("0-1-10");

    assert!(!h.engine.rejoin_slave(&server).await.unwrap());
    assert!(driver.calls().is_empty());
    assert!(driver.last_change_master().is_none());
}
