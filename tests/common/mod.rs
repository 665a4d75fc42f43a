//! Shared fakes for integration tests
//!
//! - `FakeDriver`: scripted node status, records replication statements
//! - `FakeRunner`: records commands, fails those matching a pattern and
//!   writes the file a binlog capture would produce
//! - `FakeElector`: returns a fixed URL

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use replwatch::cluster::{ClusterError, ClusterResult, Elector};
use replwatch::driver::{
    ChangeMasterOpts, DriverError, DriverResult, NodeStatus, ServerDriver, ServerEndpoint,
    SlaveStatus, ThreadRunning,
};
use replwatch::exec::{CommandOutput, CommandRunner, CommandSpec, ExecError, ExecResult};
use replwatch::gtid::GtidList;

// =============================================================================
// Driver
// =============================================================================

#[derive(Default)]
pub struct FakeDriver {
    pub url: String,
    pub down: AtomicBool,
    /// Accepts connections but never answers a status read
    pub hang: AtomicBool,
    pub node: Mutex<NodeStatus>,
    pub slave: Mutex<Option<SlaveStatus>>,
    /// Current heartbeat counter; every read adds `heartbeat_step`
    pub heartbeats: AtomicU64,
    pub heartbeat_step: AtomicU64,
    pub fail_change_master: AtomicBool,
    pub change_masters: Mutex<Vec<ChangeMasterOpts>>,
    /// `start_slave`, `stop_slave`, `set_gtid_slave_pos <gtid>`
    pub calls: Mutex<Vec<String>>,
}

impl FakeDriver {
    pub fn new(url: &str) -> Arc<Self> {
        Arc::new(Self {
            url: url.to_string(),
            ..Self::default()
        })
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub fn set_node(&self, node: NodeStatus) {
        *self.node.lock().unwrap() = node;
    }

    pub fn set_slave(&self, slave: Option<SlaveStatus>) {
        *self.slave.lock().unwrap() = slave;
    }

    pub fn last_change_master(&self) -> Option<ChangeMasterOpts> {
        self.change_masters.lock().unwrap().last().cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServerDriver for FakeDriver {
    async fn probe(&self) -> DriverResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(DriverError::Unreachable {
                url: self.url.clone(),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }

    async fn node_status(&self) -> DriverResult<NodeStatus> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self.node.lock().unwrap().clone())
    }

    async fn slave_status(&self, _channel: &str) -> DriverResult<Option<SlaveStatus>> {
        Ok(self.slave.lock().unwrap().clone())
    }

    async fn received_heartbeats(&self, _channel: &str) -> DriverResult<u64> {
        let step = self.heartbeat_step.load(Ordering::SeqCst);
        Ok(self.heartbeats.fetch_add(step, Ordering::SeqCst))
    }

    async fn change_master(&self, opts: &ChangeMasterOpts) -> DriverResult<()> {
        if self.fail_change_master.load(Ordering::SeqCst) {
            return Err(DriverError::Parse {
                url: self.url.clone(),
                reason: "CHANGE MASTER refused".into(),
            });
        }
        self.change_masters.lock().unwrap().push(opts.clone());
        Ok(())
    }

    async fn start_slave(&self, _channel: &str) -> DriverResult<()> {
        self.calls.lock().unwrap().push("start_slave".into());
        Ok(())
    }

    async fn stop_slave(&self, _channel: &str) -> DriverResult<()> {
        self.calls.lock().unwrap().push("stop_slave".into());
        Ok(())
    }

    async fn set_gtid_slave_pos(&self, gtid: &GtidList) -> DriverResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("set_gtid_slave_pos {}", gtid));
        Ok(())
    }
}

pub fn replicating_from(host: &str, port: u16) -> SlaveStatus {
    SlaveStatus {
        master_host: host.into(),
        master_port: port,
        master_server_id: 1,
        io_running: ThreadRunning::Yes,
        sql_running: ThreadRunning::Yes,
        seconds_behind_master: Some(0),
        ..SlaveStatus::default()
    }
}

pub fn gtid(s: &str) -> GtidList {
    GtidList::parse(s).unwrap()
}

// =============================================================================
// Runner
// =============================================================================

#[derive(Default)]
pub struct FakeRunner {
    pub commands: Mutex<Vec<CommandSpec>>,
    pub pipes: Mutex<Vec<(CommandSpec, CommandSpec)>>,
    /// A command fails when its displayed form contains one of these
    pub failing: Mutex<Vec<String>>,
    pub stdout: Mutex<String>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, pattern: &str) {
        self.failing.lock().unwrap().push(pattern.to_string());
    }

    pub fn set_stdout(&self, stdout: &str) {
        *self.stdout.lock().unwrap() = stdout.to_string();
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().unwrap().clone()
    }

    pub fn pipes(&self) -> Vec<(CommandSpec, CommandSpec)> {
        self.pipes.lock().unwrap().clone()
    }

    pub fn ran(&self, program: &str) -> bool {
        self.commands().iter().any(|c| c.program == program)
    }

    fn check(&self, cmd: &CommandSpec) -> ExecResult<()> {
        let shown = cmd.to_string();
        if self.failing.lock().unwrap().iter().any(|p| shown.contains(p.as_str())) {
            return Err(ExecError::Failed {
                program: cmd.program.clone(),
                code: Some(1),
                output: "simulated failure".into(),
            });
        }
        Ok(())
    }

    /// A successful `mysqlbinlog --raw` leaves `<result-file><logfile>`.
    fn materialize_capture(cmd: &CommandSpec) {
        if !cmd.has_arg("--read-from-remote-server") {
            return;
        }
        if let (Some(prefix), Some(logfile)) = (cmd.flag_value("--result-file"), cmd.args.last()) {
            let path = PathBuf::from(format!("{}{}", prefix, logfile));
            std::fs::write(path, b"binlog events").unwrap();
        }
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, cmd: &CommandSpec) -> ExecResult<CommandOutput> {
        self.commands.lock().unwrap().push(cmd.clone());
        self.check(cmd)?;
        Self::materialize_capture(cmd);
        Ok(CommandOutput::new(self.stdout.lock().unwrap().clone()))
    }

    async fn run_with_input(&self, cmd: &CommandSpec, _input: &str) -> ExecResult<CommandOutput> {
        self.run(cmd).await
    }

    async fn pipe(&self, producer: &CommandSpec, consumer: &CommandSpec) -> ExecResult<CommandOutput> {
        self.pipes
            .lock()
            .unwrap()
            .push((producer.clone(), consumer.clone()));
        self.check(producer)?;
        self.check(consumer)?;
        Ok(CommandOutput::default())
    }
}

// =============================================================================
// Elector
// =============================================================================

pub struct FakeElector {
    pub elected: Mutex<Option<String>>,
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeElector {
    pub fn electing(url: &str) -> Arc<Self> {
        Arc::new(Self {
            elected: Mutex::new(Some(url.to_string())),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            elected: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Elector for FakeElector {
    async fn elect(&self, failed: &ServerEndpoint, candidates: &[String]) -> ClusterResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((failed.url(), candidates.to_vec()));
        self.elected
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ClusterError::election("no candidate"))
    }
}
