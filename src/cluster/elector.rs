//! Master election
//!
//! Which replica replaces a failed master, and how it is promoted, is left
//! to an [`Elector`]. The controller only records the outcome.

use std::sync::Arc;

use async_trait::async_trait;

use super::errors::{ClusterError, ClusterResult};
use crate::driver::ServerEndpoint;
use crate::exec::{CommandRunner, CommandSpec};

/// Elects and promotes a new master.
#[async_trait]
pub trait Elector: Send + Sync {
    /// Returns the URL of the promoted server. `candidates` are the
    /// replicas known at the time of the failure.
    async fn elect(&self, failed: &ServerEndpoint, candidates: &[String]) -> ClusterResult<String>;
}

/// Runs `<script> <failedHost:port>` and reads the elected `host:port`
/// from the last non-empty line of its stdout.
pub struct ScriptElector {
    script: String,
    runner: Arc<dyn CommandRunner>,
}

impl ScriptElector {
    pub fn new(script: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            script: script.into(),
            runner,
        }
    }

    pub fn command(&self, failed: &ServerEndpoint) -> CommandSpec {
        CommandSpec::new(&self.script).arg(failed.url())
    }
}

/// Elected URL from the script output.
pub fn parse_elected(stdout: &str) -> ClusterResult<String> {
    let line = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or_else(|| ClusterError::election("failover script printed no server"))?;
    let endpoint = ServerEndpoint::parse(line)
        .map_err(|e| ClusterError::election(format!("failover script output: {}", e)))?;
    Ok(endpoint.url())
}

#[async_trait]
impl Elector for ScriptElector {
    async fn elect(&self, failed: &ServerEndpoint, _candidates: &[String]) -> ClusterResult<String> {
        let output = self
            .runner
            .run(&self.command(failed))
            .await
            .map_err(|e| ClusterError::election(e.to_string()))?;
        parse_elected(&output.stdout)
    }
}

/// Refuses every election. Used when no failover script is configured,
/// which validation only allows in interactive mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualElector;

#[async_trait]
impl Elector for ManualElector {
    async fn elect(&self, failed: &ServerEndpoint, _candidates: &[String]) -> ClusterResult<String> {
        Err(ClusterError::election(format!(
            "no failover_script configured, {} needs a manual switchover",
            failed
        )))
    }
}
