//! CLI command implementations
//!
//! `start` owns the tokio runtime; the other commands are synchronous and
//! never touch a database node.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::watch;

use crate::cluster::{Cluster, ClusterConfig, Elector, ManualElector, ScriptElector};
use crate::crash::{Crash, CrashStore};
use crate::driver::{MysqlCliDriver, ServerDriver};
use crate::exec::{CommandRunner, ProcessRunner};
use crate::observability::{log_event_with_fields, Event, Logger};

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Start { config, master } => start(&config, master.as_deref()),
        Command::CheckConfig { config } => check_config(&config),
        Command::Crashes { config } => crashes(&config),
    }
}

fn load_config(config_path: &Path) -> CliResult<ClusterConfig> {
    let config = ClusterConfig::load(config_path)?;
    Logger::set_min_severity(config.log_severity()?);
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("path", &config_path.display().to_string()),
            ("servers", &config.servers.len().to_string()),
        ],
    );
    Ok(config)
}

fn write_line(text: &str) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", text)?;
    stdout.flush()?;
    Ok(())
}

/// Run the monitoring loop until SIGINT.
pub fn start(config_path: &Path, master: Option<&str>) -> CliResult<()> {
    let config = load_config(config_path)?;
    fs::create_dir_all(config.working_path()).map_err(|e| {
        CliError::io_error(format!(
            "Failed to create working directory {}: {}",
            config.working_dir, e
        ))
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::boot_failed(format!("Failed to start runtime: {}", e)))?;

    runtime.block_on(async {
        let cluster = build_cluster(config)?;
        if let Some(master) = master {
            cluster.set_master(master)?;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(true);
            }
        });

        cluster.run(shutdown_rx).await;
        Ok::<(), CliError>(())
    })
}

/// Wire the process runners, `mysql` client drivers and the elector.
///
/// Status statements get their own runner so a node that accepts
/// connections but never answers cannot hold a check for the long
/// dump/capture timeout.
fn build_cluster(config: ClusterConfig) -> CliResult<Cluster> {
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new(config.command_timeout()));
    let status_runner: Arc<dyn CommandRunner> =
        Arc::new(ProcessRunner::new(config.status_timeout()));
    let options = config.client_options();
    let drivers = config
        .endpoints()?
        .into_iter()
        .map(|endpoint| {
            let driver: Arc<dyn ServerDriver> = Arc::new(MysqlCliDriver::new(
                endpoint.clone(),
                options.clone(),
                Arc::clone(&status_runner),
            ));
            (endpoint, driver)
        })
        .collect();

    let elector: Arc<dyn Elector> = match &config.failover_script {
        Some(script) => Arc::new(ScriptElector::new(script, Arc::clone(&runner))),
        None => Arc::new(ManualElector),
    };

    Cluster::new(config, drivers, runner, elector).map_err(CliError::from)
}

/// Print the validated configuration, defaults applied and passwords
/// masked.
pub fn check_config(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    write_line(&config.redacted_json())
}

/// Print the persisted crash records as a JSON array.
pub fn crashes(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let store = CrashStore::in_dir(&config.working_path());
    let registry = store
        .load()
        .map_err(|e| CliError::state_error(e.to_string()))?;
    let records: Vec<&Crash> = registry.iter().collect();
    let output = json!({
        "path": store.path().display().to_string(),
        "crashes": records,
    });
    write_line(&serde_json::to_string_pretty(&output)?)
}
