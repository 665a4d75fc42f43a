//! Rejoin executors
//!
//! Each method either fully succeeds or returns the first error. Nothing
//! is rolled back; the next qualifying check starts over.

use std::path::Path;

use chrono::Utc;

use super::binlog::{archive_capture, crash_backup_dir};
use super::commands;
use super::engine::RejoinEngine;
use super::errors::{RejoinError, RejoinResult};
use crate::crash::Crash;
use crate::driver::{ChangeMasterOpts, ReplicationMode, ServerEndpoint};
use crate::monitor::ServerMonitor;
use crate::observability::{log_event_with_fields, Event};

impl RejoinEngine {
    pub(super) fn change_master_opts(
        &self,
        target: &ServerEndpoint,
        mode: ReplicationMode,
        logfile: &str,
        logpos: u64,
    ) -> ChangeMasterOpts {
        ChangeMasterOpts {
            host: target.host.clone(),
            port: target.port,
            user: self.settings.replication.user.clone(),
            password: self.settings.replication.password.clone(),
            retry: self.settings.master_connect_retry,
            heartbeat: self.settings.master_heartbeat_period,
            mode,
            logfile: logfile.to_string(),
            logpos,
            channel: self.settings.channel.clone(),
        }
    }

    /// Options for a relay topology: positional at the crash coordinates.
    fn relay_opts(&self, relay: &ServerEndpoint, crash: &Crash) -> ChangeMasterOpts {
        self.change_master_opts(
            relay,
            ReplicationMode::Mxs,
            &crash.failover_master_log_file,
            crash.failover_master_log_pos,
        )
    }

    async fn point_and_start(&self, server: &ServerMonitor, opts: &ChangeMasterOpts) -> RejoinResult<()> {
        let driver = server.driver();
        driver.change_master(opts).await?;
        driver.start_slave(&self.settings.channel).await?;
        Ok(())
    }

    /// The server holds nothing the cluster lacks: replicate from the master.
    pub(super) async fn sync(
        &self,
        server: &ServerMonitor,
        master: &ServerEndpoint,
        crash: &Crash,
    ) -> RejoinResult<()> {
        let opts = if let Some(relay) = &self.settings.binlog_relay {
            self.relay_opts(relay, crash)
        } else if crash.used_gtid_at_election() {
            self.change_master_opts(master, ReplicationMode::CurrentPos, "", 0)
        } else {
            if crash.new_master_log_file.is_empty() {
                return Err(RejoinError::MissingCoordinates(server.url()));
            }
            self.change_master_opts(
                master,
                ReplicationMode::Positional,
                &crash.new_master_log_file,
                crash.new_master_log_pos,
            )
        };
        self.point_and_start(server, &opts).await
    }

    /// Undo the server's extra transactions with a reversed binlog, then
    /// resume from the election position.
    pub(super) async fn flashback(
        &self,
        server: &ServerMonitor,
        master: &ServerEndpoint,
        crash: &Crash,
        captured: Option<&Path>,
    ) -> RejoinResult<()> {
        let url = server.url();
        let captured = captured.ok_or_else(|| RejoinError::MissingCapture(url.clone()))?;
        let election_gtid = crash
            .failover_io_gtid
            .as_ref()
            .ok_or_else(|| RejoinError::NoElectionGtid(url.clone()))?;

        if !crash.failover_semi_sync_slave_status {
            let backup_dir = crash_backup_dir(&self.settings.working_dir, Utc::now());
            let archived = archive_capture(captured, &backup_dir)
                .await
                .map_err(|e| RejoinError::io(captured, e))?;
            log_event_with_fields(
                Event::BinlogCaptured,
                &[("url", &url), ("file", &archived.display().to_string()), ("archive", "true")],
            );
        }

        let producer = commands::flashback(&self.settings.tools, captured);
        let consumer = commands::client(
            &self.settings.tools,
            server.endpoint(),
            &self.settings.credentials,
        );
        self.runner.pipe(&producer, &consumer).await?;

        server.driver().set_gtid_slave_pos(election_gtid).await?;

        let opts = match &self.settings.binlog_relay {
            Some(relay) => self.relay_opts(relay, crash),
            None => self.change_master_opts(master, ReplicationMode::SlavePos, "", 0),
        };
        self.point_and_start(server, &opts).await
    }

    /// Reseed the server with a full dump of the master.
    pub(super) async fn mysqldump(&self, server: &ServerMonitor, master: &ServerEndpoint) -> RejoinResult<()> {
        let driver = server.driver();
        // The dump sets gtid_slave_pos; gtid_current_pos would still carry
        // this server's own divergent transactions.
        let opts = self.change_master_opts(master, ReplicationMode::SlavePos, "", 0);
        driver.change_master(&opts).await?;

        let producer = commands::mysqldump(&self.settings.tools, master, &self.settings.credentials);
        let consumer = commands::client(
            &self.settings.tools,
            server.endpoint(),
            &self.settings.credentials,
        );
        self.runner.pipe(&producer, &consumer).await?;

        driver.start_slave(&self.settings.channel).await?;
        Ok(())
    }

    /// Hand the server to the operator's script. Returns whether it ran
    /// successfully.
    pub(super) async fn run_rejoin_script(&self, server: &ServerMonitor, master: &ServerEndpoint) -> bool {
        let Some(script) = self.settings.rejoin_script.as_deref() else {
            return false;
        };
        let cmd = commands::rejoin_script(script, server.host(), &master.host);
        match self.runner.run(&cmd).await {
            Ok(_) => true,
            Err(e) => {
                log_event_with_fields(
                    Event::RejoinManual,
                    &[("url", &server.url()), ("script", script), ("reason", &e.to_string())],
                );
                false
            }
        }
    }
}
