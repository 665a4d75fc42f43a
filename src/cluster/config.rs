//! Cluster configuration
//!
//! A JSON file. Only `servers` is required; everything else has a default.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{ClusterError, ClusterResult};
use crate::crash::CrashLookup;
use crate::driver::{ClientOptions, ServerEndpoint};
use crate::observability::Severity;
use crate::rejoin::{Credentials, RejoinSettings, ToolPaths};

/// Node variables, master status, semi-sync status, slave status.
const STATEMENTS_PER_CHECK: u32 = 4;

/// SMTP settings for state alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Empty for an unauthenticated relay
    #[serde(default)]
    pub smtp_user: String,
    #[serde(default)]
    pub smtp_password: String,
    pub from: String,
    pub to: Vec<String>,
}

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// `host:port` of every monitored node
    pub servers: Vec<String>,

    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_rpl_user")]
    pub rpl_user: String,
    #[serde(default)]
    pub rpl_password: String,
    /// Multi-source connection name, empty for the default one
    #[serde(default)]
    pub replication_channel: String,

    /// Consecutive failed probes before a server is `Failed`
    #[serde(default = "default_max_fail")]
    pub max_fail: u32,
    /// Automatic failovers allowed, 0 for unlimited
    #[serde(default = "default_fail_limit")]
    pub fail_limit: u32,
    /// Minimum seconds between two failovers, 0 to disable
    #[serde(default = "default_fail_time")]
    pub fail_time: u64,
    /// Replication lag in seconds above which a replica is late
    #[serde(default = "default_fail_max_delay")]
    pub fail_max_delay: u64,
    #[serde(default = "default_true")]
    pub rpl_checks: bool,
    #[serde(default = "default_true")]
    pub check_false_positive_heartbeat: bool,
    #[serde(default = "default_heartbeat_sample_ms")]
    pub heartbeat_sample_interval_ms: u64,
    /// Failover only on operator request
    #[serde(default = "default_true")]
    pub interactive: bool,

    #[serde(default = "default_true")]
    pub autorejoin: bool,
    #[serde(default)]
    pub autorejoin_flashback: bool,
    #[serde(default = "default_true")]
    pub autorejoin_backup_binlog: bool,
    #[serde(default)]
    pub autorejoin_mysqldump: bool,

    /// `<script> <failedHost:port>`, prints the elected `host:port`
    #[serde(default)]
    pub failover_script: Option<String>,
    /// `<script> <failedHost> <newMasterHost>`
    #[serde(default)]
    pub rejoin_script: Option<String>,
    /// `<script> <url> <prev_state> <state>`
    #[serde(default)]
    pub alert_script: Option<String>,
    #[serde(default)]
    pub mail: Option<MailConfig>,

    /// Captured binlogs, crash backups and the crash state file
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    #[serde(default = "default_monitoring_ticker_ms")]
    pub monitoring_ticker_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Upper bound on one status statement sent to a node
    #[serde(default = "default_status_timeout_ms")]
    pub status_timeout_ms: u64,
    /// Upper bound on any external command
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// `host:port` of a binlog relay replicas follow
    #[serde(default)]
    pub binlog_relay: Option<String>,
    #[serde(default)]
    pub tools: ToolPaths,
    /// Overwrite-first-entry crash lookup of older releases
    #[serde(default)]
    pub crash_lookup_legacy: bool,
    #[serde(default = "default_master_connect_retry")]
    pub master_connect_retry: u32,
    #[serde(default = "default_master_heartbeat_period")]
    pub master_heartbeat_period: u32,
    #[serde(default = "default_capture_server_id")]
    pub capture_server_id: u64,
    /// trace, info, warn or error
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_user() -> String {
    "root".to_string()
}
fn default_rpl_user() -> String {
    "repl".to_string()
}
fn default_max_fail() -> u32 {
    5
}
fn default_fail_limit() -> u32 {
    5
}
fn default_fail_time() -> u64 {
    300
}
fn default_fail_max_delay() -> u64 {
    30
}
fn default_heartbeat_sample_ms() -> u64 {
    3000
}
fn default_true() -> bool {
    true
}
fn default_working_dir() -> String {
    "/var/lib/replwatch".to_string()
}
fn default_monitoring_ticker_ms() -> u64 {
    2000
}
fn default_probe_timeout_ms() -> u64 {
    1000
}
fn default_status_timeout_ms() -> u64 {
    5000
}
fn default_command_timeout_secs() -> u64 {
    3600
}
fn default_master_connect_retry() -> u32 {
    10
}
fn default_master_heartbeat_period() -> u32 {
    1
}
fn default_capture_server_id() -> u64 {
    10000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_smtp_port() -> u16 {
    25
}

impl ClusterConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> ClusterResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ClusterError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> ClusterResult<Self> {
        let config: ClusterConfig = serde_json::from_str(content)
            .map_err(|e| ClusterError::config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ClusterResult<()> {
        if self.servers.is_empty() {
            return Err(ClusterError::config("servers must not be empty"));
        }
        let mut seen = HashSet::new();
        for endpoint in self.endpoints()? {
            if !seen.insert(endpoint.url()) {
                return Err(ClusterError::config(format!(
                    "server {} listed twice",
                    endpoint.url()
                )));
            }
        }
        self.binlog_relay_endpoint()?;

        if self.max_fail == 0 {
            return Err(ClusterError::config("max_fail must be > 0"));
        }
        if self.monitoring_ticker_ms == 0 {
            return Err(ClusterError::config("monitoring_ticker_ms must be > 0"));
        }
        if self.probe_timeout_ms == 0 {
            return Err(ClusterError::config("probe_timeout_ms must be > 0"));
        }
        if self.status_timeout_ms == 0 {
            return Err(ClusterError::config("status_timeout_ms must be > 0"));
        }
        if self.command_timeout_secs == 0 {
            return Err(ClusterError::config("command_timeout_secs must be > 0"));
        }
        if !self.interactive && self.failover_script.is_none() {
            return Err(ClusterError::config(
                "automatic failover (interactive = false) needs failover_script",
            ));
        }
        self.log_severity()?;
        if let Some(mail) = &self.mail {
            if mail.to.is_empty() {
                return Err(ClusterError::config("mail.to must not be empty"));
            }
        }
        Ok(())
    }

    pub fn endpoints(&self) -> ClusterResult<Vec<ServerEndpoint>> {
        self.servers
            .iter()
            .map(|s| ServerEndpoint::parse(s).map_err(|e| ClusterError::config(e.to_string())))
            .collect()
    }

    pub fn binlog_relay_endpoint(&self) -> ClusterResult<Option<ServerEndpoint>> {
        self.binlog_relay
            .as_deref()
            .map(|s| ServerEndpoint::parse(s).map_err(|e| ClusterError::config(e.to_string())))
            .transpose()
    }

    pub fn working_path(&self) -> PathBuf {
        PathBuf::from(&self.working_dir)
    }

    pub fn monitoring_ticker(&self) -> Duration {
        Duration::from_millis(self.monitoring_ticker_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    /// Upper bound on one health check: the probe plus every status
    /// statement a check sends.
    pub fn check_timeout(&self) -> Duration {
        self.probe_timeout() + self.status_timeout() * STATEMENTS_PER_CHECK
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn heartbeat_sample_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_sample_interval_ms)
    }

    pub fn log_severity(&self) -> ClusterResult<Severity> {
        Severity::parse(&self.log_level).ok_or_else(|| {
            ClusterError::config(format!("unknown log_level {:?}", self.log_level))
        })
    }

    pub fn crash_lookup(&self) -> CrashLookup {
        if self.crash_lookup_legacy {
            CrashLookup::Legacy
        } else {
            CrashLookup::Exact
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            client_path: self.tools.mysql.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            connect_timeout: self.probe_timeout(),
        }
    }

    pub fn rejoin_settings(&self) -> ClusterResult<RejoinSettings> {
        Ok(RejoinSettings {
            autorejoin_flashback: self.autorejoin_flashback,
            autorejoin_backup_binlog: self.autorejoin_backup_binlog,
            autorejoin_mysqldump: self.autorejoin_mysqldump,
            rejoin_script: self.rejoin_script.clone(),
            working_dir: self.working_path(),
            credentials: Credentials::new(&self.user, &self.password),
            replication: Credentials::new(&self.rpl_user, &self.rpl_password),
            channel: self.replication_channel.clone(),
            master_connect_retry: self.master_connect_retry,
            master_heartbeat_period: self.master_heartbeat_period,
            binlog_relay: self.binlog_relay_endpoint()?,
            tools: self.tools.clone(),
            capture_server_id: self.capture_server_id,
        })
    }

    /// Configuration as pretty JSON with passwords masked.
    pub fn redacted_json(&self) -> String {
        let mut shown = self.clone();
        for secret in [&mut shown.password, &mut shown.rpl_password] {
            if !secret.is_empty() {
                *secret = "***".to_string();
            }
        }
        if let Some(mail) = shown.mail.as_mut() {
            if !mail.smtp_password.is_empty() {
                mail.smtp_password = "***".to_string();
            }
        }
        serde_json::to_string_pretty(&shown).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClusterConfig::from_json(r#"{"servers": ["db1:3306", "db2"]}"#).unwrap();
        assert_eq!(config.max_fail, 5);
        assert_eq!(config.fail_limit, 5);
        assert_eq!(config.fail_time, 300);
        assert!(config.interactive);
        assert!(config.autorejoin);
        assert!(config.autorejoin_backup_binlog);
        assert!(!config.autorejoin_flashback);
        assert!(!config.autorejoin_mysqldump);
        assert_eq!(config.heartbeat_sample_interval(), Duration::from_secs(3));
        assert_eq!(config.tools.mysqlbinlog, "mysqlbinlog");
        assert_eq!(config.crash_lookup(), CrashLookup::Exact);
        assert_eq!(config.endpoints().unwrap()[1], ServerEndpoint::new("db2", 3306));
    }

    #[test]
    fn test_rejects_empty_and_duplicate_servers() {
        assert!(ClusterConfig::from_json(r#"{"servers": []}"#).is_err());
        let err = ClusterConfig::from_json(r#"{"servers": ["db1:3306", "db1"]}"#).unwrap_err();
        assert!(err.message.contains("listed twice"));
    }

    #[test]
    fn test_automatic_mode_needs_failover_script() {
        let err =
            ClusterConfig::from_json(r#"{"servers": ["db1"], "interactive": false}"#).unwrap_err();
        assert!(err.message.contains("failover_script"));

        ClusterConfig::from_json(
            r#"{"servers": ["db1"], "interactive": false, "failover_script": "/bin/elect"}"#,
        )
        .unwrap();
    }

    #[test]
    fn test_status_queries_bounded_separately() {
        let config = ClusterConfig::from_json(
            r#"{"servers": ["db1"], "probe_timeout_ms": 500, "status_timeout_ms": 250}"#,
        )
        .unwrap();
        assert_eq!(config.status_timeout(), Duration::from_millis(250));
        assert_eq!(config.check_timeout(), Duration::from_millis(1500));
        assert_eq!(config.command_timeout(), Duration::from_secs(3600));

        let defaults = ClusterConfig::from_json(r#"{"servers": ["db1"]}"#).unwrap();
        assert_eq!(defaults.status_timeout(), Duration::from_secs(5));
        assert!(ClusterConfig::from_json(r#"{"servers": ["db1"], "status_timeout_ms": 0}"#).is_err());
    }

    #[test]
    fn test_log_level() {
        let config = ClusterConfig::from_json(r#"{"servers": ["db1"], "log_level": "WARN"}"#).unwrap();
        assert_eq!(config.log_severity().unwrap(), Severity::Warn);
        assert!(ClusterConfig::from_json(r#"{"servers": ["db1"], "log_level": "loud"}"#).is_err());
    }

    #[test]
    fn test_zero_max_fail_rejected() {
        assert!(ClusterConfig::from_json(r#"{"servers": ["db1"], "max_fail": 0}"#).is_err());
    }

    #[test]
    fn test_rejoin_settings() {
        let config = ClusterConfig::from_json(
            r#"{"servers": ["db1"], "rpl_user": "r", "rpl_password": "p", "binlog_relay": "mxs:4000"}"#,
        )
        .unwrap();
        let settings = config.rejoin_settings().unwrap();
        assert_eq!(settings.replication, Credentials::new("r", "p"));
        assert_eq!(settings.binlog_relay, Some(ServerEndpoint::new("mxs", 4000)));
    }

    #[test]
    fn test_redacted_json_masks_passwords() {
        let config = ClusterConfig::from_json(
            r#"{"servers": ["db1"], "password": "topsecret", "rpl_password": "alsosecret"}"#,
        )
        .unwrap();
        let shown = config.redacted_json();
        assert!(!shown.contains("topsecret"));
        assert!(!shown.contains("alsosecret"));
        assert!(shown.contains("\"servers\""));
    }
}
