//! `mysql` client backed driver
//!
//! Statements run through the stock `mysql` command line client in batch
//! vertical mode; liveness is a plain TCP connect. Targets MariaDB, whose
//! `SHOW ALL SLAVES STATUS` carries the connection name and heartbeat
//! counter on every channel row.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::errors::{DriverError, DriverResult};
use super::parse::{self, Row};
use super::sql;
use super::types::{ChangeMasterOpts, NodeStatus, ServerEndpoint, SlaveStatus};
use super::ServerDriver;
use crate::exec::{CommandRunner, CommandSpec};
use crate::gtid::GtidList;

/// Credentials and client binary used to reach a node.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub client_path: String,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
}

/// [`ServerDriver`] that shells out to the `mysql` client.
pub struct MysqlCliDriver {
    endpoint: ServerEndpoint,
    options: ClientOptions,
    runner: Arc<dyn CommandRunner>,
}

impl MysqlCliDriver {
    pub fn new(
        endpoint: ServerEndpoint,
        options: ClientOptions,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            endpoint,
            options,
            runner,
        }
    }

    /// The client invocation without a statement; also used as the
    /// consumer side of flashback and dump pipelines.
    pub fn client_command(&self) -> CommandSpec {
        client_command(&self.options.client_path, &self.endpoint, &self.options.user, &self.options.password)
            .arg(format!(
                "--connect-timeout={}",
                self.options.connect_timeout.as_secs().max(1)
            ))
    }

    async fn execute(&self, statement: &str) -> DriverResult<String> {
        let cmd = self
            .client_command()
            .arg("--batch")
            .arg("--vertical")
            .arg(format!("--execute={}", statement));

        self.runner
            .run(&cmd)
            .await
            .map(|out| out.stdout)
            .map_err(|source| DriverError::Statement {
                url: self.endpoint.url(),
                source,
            })
    }

    async fn rows(&self, statement: &str) -> DriverResult<Vec<Row>> {
        Ok(parse::vertical_rows(&self.execute(statement).await?))
    }

    fn parse_error(&self, reason: String) -> DriverError {
        DriverError::Parse {
            url: self.endpoint.url(),
            reason,
        }
    }

    async fn channel_row(&self, channel: &str) -> DriverResult<Option<Row>> {
        let rows = self.rows(sql::SHOW_ALL_SLAVES_STATUS).await?;
        Ok(rows.into_iter().find(|row| {
            row.get("Connection_name").map(String::as_str).unwrap_or("") == channel
        }))
    }
}

/// `mysql --host=H --port=P --user=U --password=P`.
pub fn client_command(
    client_path: &str,
    endpoint: &ServerEndpoint,
    user: &str,
    password: &str,
) -> CommandSpec {
    CommandSpec::new(client_path)
        .arg(format!("--host={}", endpoint.host))
        .arg(format!("--port={}", endpoint.port))
        .arg(format!("--user={}", user))
        .arg(format!("--password={}", password))
}

#[async_trait]
impl ServerDriver for MysqlCliDriver {
    async fn probe(&self) -> DriverResult<()> {
        super::probe::tcp_probe(&self.endpoint, self.options.connect_timeout).await
    }

    async fn node_status(&self) -> DriverResult<NodeStatus> {
        let variables = self.rows(sql::SELECT_NODE_VARIABLES).await?;
        let variables = variables
            .first()
            .ok_or_else(|| self.parse_error("server variables returned no row".to_string()))?;
        let master = self.rows(sql::SHOW_MASTER_STATUS).await?;
        let semi_sync = self.rows(sql::SHOW_SEMI_SYNC_SLAVE_STATUS).await?;

        parse::node_status(variables, master.first(), semi_sync.first())
            .map_err(|reason| self.parse_error(reason))
    }

    async fn slave_status(&self, channel: &str) -> DriverResult<Option<SlaveStatus>> {
        match self.channel_row(channel).await? {
            Some(row) => parse::slave_status(&row)
                .map(Some)
                .map_err(|reason| self.parse_error(reason)),
            None => Ok(None),
        }
    }

    async fn received_heartbeats(&self, channel: &str) -> DriverResult<u64> {
        Ok(self
            .slave_status(channel)
            .await?
            .map(|status| status.received_heartbeats)
            .unwrap_or(0))
    }

    async fn change_master(&self, opts: &ChangeMasterOpts) -> DriverResult<()> {
        self.execute(&sql::change_master(opts)).await.map(|_| ())
    }

    async fn start_slave(&self, channel: &str) -> DriverResult<()> {
        self.execute(&sql::start_slave(channel)).await.map(|_| ())
    }

    async fn stop_slave(&self, channel: &str) -> DriverResult<()> {
        self.execute(&sql::stop_slave(channel)).await.map(|_| ())
    }

    async fn set_gtid_slave_pos(&self, gtid: &GtidList) -> DriverResult<()> {
        self.execute(&sql::set_gtid_slave_pos(gtid)).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{CommandOutput, ExecResult};
    use std::sync::Mutex;

    /// Replies with canned output keyed by a substring of the statement.
    struct CannedRunner {
        replies: Vec<(&'static str, &'static str)>,
        seen: Mutex<Vec<CommandSpec>>,
    }

    #[async_trait]
    impl CommandRunner for CannedRunner {
        async fn run(&self, cmd: &CommandSpec) -> ExecResult<CommandOutput> {
            self.seen.lock().unwrap().push(cmd.clone());
            let statement = cmd.flag_value("--execute").unwrap_or("");
            let reply = self
                .replies
                .iter()
                .find(|(needle, _)| statement.contains(needle))
                .map(|(_, out)| *out)
                .unwrap_or("");
            Ok(CommandOutput::new(reply))
        }

        async fn run_with_input(&self, cmd: &CommandSpec, _input: &str) -> ExecResult<CommandOutput> {
            self.run(cmd).await
        }

        async fn pipe(&self, _p: &CommandSpec, c: &CommandSpec) -> ExecResult<CommandOutput> {
            self.run(c).await
        }
    }

    fn driver(replies: Vec<(&'static str, &'static str)>) -> (MysqlCliDriver, Arc<CannedRunner>) {
        let runner = Arc::new(CannedRunner {
            replies,
            seen: Mutex::new(Vec::new()),
        });
        let driver = MysqlCliDriver::new(
            ServerEndpoint::new("db1", 3306),
            ClientOptions {
                client_path: "mysql".into(),
                user: "root".into(),
                password: "secret".into(),
                connect_timeout: Duration::from_secs(2),
            },
            runner.clone(),
        );
        (driver, runner)
    }

    #[tokio::test]
    async fn test_slave_status_picks_channel() {
        let (driver, _) = driver(vec![(
            "SHOW ALL SLAVES STATUS",
            "*** 1. row ***\n Connection_name: \n Master_Host: db2\n Master_Port: 3306\n Slave_IO_Running: Yes\n Slave_SQL_Running: Yes\n*** 2. row ***\n Connection_name: east\n Master_Host: db5\n Master_Port: 3306\n Slave_received_heartbeats: 9\n",
        )]);

        let status = driver.slave_status("east").await.unwrap().unwrap();
        assert_eq!(status.master_host, "db5");
        assert_eq!(driver.received_heartbeats("east").await.unwrap(), 9);
        assert!(driver.slave_status("west").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_channel_is_none() {
        let (driver, _) = driver(vec![]);
        assert!(driver.slave_status("").await.unwrap().is_none());
        assert_eq!(driver.received_heartbeats("").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_change_master_sends_rendered_statement() {
        let (driver, runner) = driver(vec![]);
        let opts = ChangeMasterOpts {
            host: "db2".into(),
            port: 3306,
            user: "repl".into(),
            password: "r".into(),
            retry: 10,
            heartbeat: 1,
            mode: crate::driver::ReplicationMode::CurrentPos,
            logfile: String::new(),
            logpos: 0,
            channel: String::new(),
        };
        driver.change_master(&opts).await.unwrap();

        let seen = runner.seen.lock().unwrap();
        let cmd = &seen[0];
        assert_eq!(cmd.program, "mysql");
        assert!(cmd.has_arg("--host=db1"));
        assert!(cmd
            .flag_value("--execute")
            .unwrap()
            .contains("MASTER_USE_GTID=current_pos"));
    }

    #[tokio::test]
    async fn test_node_status_requires_variables_row() {
        let (driver, _) = driver(vec![]);
        assert!(matches!(
            driver.node_status().await,
            Err(DriverError::Parse { .. })
        ));
    }
}
