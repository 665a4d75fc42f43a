//! External tool invocations used by rejoins

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::driver::{client_command, ServerEndpoint};
use crate::exec::CommandSpec;

/// Paths of the MariaDB client tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub mysql: String,
    pub mysqlbinlog: String,
    pub mysqldump: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            mysql: "mysql".to_string(),
            mysqlbinlog: "mysqlbinlog".to_string(),
            mysqldump: "mysqldump".to_string(),
        }
    }
}

/// A user and password pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

/// Stream `logfile` from `start_position` off `source` into files named
/// `<prefix><logfile>`.
pub fn binlog_capture(
    tools: &ToolPaths,
    capture_server_id: u64,
    rpl: &Credentials,
    source: &ServerEndpoint,
    prefix: &str,
    start_position: u64,
    logfile: &str,
) -> CommandSpec {
    CommandSpec::new(&tools.mysqlbinlog)
        .arg("--read-from-remote-server")
        .arg("--raw")
        .arg(format!("--stop-never-slave-server-id={}", capture_server_id))
        .arg(format!("--user={}", rpl.user))
        .arg(format!("--password={}", rpl.password))
        .arg(format!("--host={}", source.host))
        .arg(format!("--port={}", source.port))
        .arg(format!("--result-file={}", prefix))
        .arg(format!("--start-position={}", start_position))
        .arg(logfile)
}

/// Reverse the events of a captured binlog.
pub fn flashback(tools: &ToolPaths, captured: &Path) -> CommandSpec {
    CommandSpec::new(&tools.mysqlbinlog)
        .arg("--flashback")
        .arg("--to-last-log")
        .arg(captured.display().to_string())
}

/// Full logical dump of `source`.
pub fn mysqldump(tools: &ToolPaths, source: &ServerEndpoint, creds: &Credentials) -> CommandSpec {
    CommandSpec::new(&tools.mysqldump)
        .args([
            "--opt",
            "--hex-blob",
            "--events",
            "--disable-keys",
            "--apply-slave-statements",
            "--gtid",
            "--single-transaction",
            "--all-databases",
        ])
        .arg(format!("--host={}", source.host))
        .arg(format!("--port={}", source.port))
        .arg(format!("--user={}", creds.user))
        .arg(format!("--password={}", creds.password))
}

/// Client reading SQL from stdin on `target`.
pub fn client(tools: &ToolPaths, target: &ServerEndpoint, creds: &Credentials) -> CommandSpec {
    client_command(&tools.mysql, target, &creds.user, &creds.password)
}

/// `<script> <failedHost> <newMasterHost>`
pub fn rejoin_script(script: &str, failed_host: &str, new_master_host: &str) -> CommandSpec {
    CommandSpec::new(script).arg(failed_host).arg(new_master_host)
}
