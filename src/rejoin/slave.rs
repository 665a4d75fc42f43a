//! Indirect replica re-pointing
//!
//! A replica still following a node that is no longer the master is moved
//! under the current master, but only when it is strictly behind what the
//! elected master had received. A replica that is caught up or ahead is left
//! where it is.

use super::engine::RejoinEngine;
use super::errors::RejoinResult;
use crate::driver::{ReplicationMode, ServerEndpoint};
use crate::monitor::ServerMonitor;
use crate::observability::{log_event_with_fields, Event};

/// Sequences compared for one replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveLag {
    pub source_server_id: u64,
    pub slave_seq: u64,
    pub election_seq: u64,
}

impl SlaveLag {
    pub fn is_behind(&self) -> bool {
        self.slave_seq < self.election_seq
    }
}

impl RejoinEngine {
    /// Returns true when the replica was re-pointed.
    pub async fn rejoin_slave(&self, server: &ServerMonitor) -> RejoinResult<bool> {
        let url = server.url();
        let Some(status) = server.slave_status.as_ref() else {
            return Ok(false);
        };

        let (master, crash) = {
            let topology = self.topology.read();
            let Some(master) = topology.master.clone() else {
                return Ok(false);
            };
            if master == url {
                return Ok(false);
            }
            let crash = topology.crashes.get_by_elected_master(&master).cloned();
            (master, crash)
        };
        let Some(election_gtid) = crash.and_then(|c| c.failover_io_gtid) else {
            return Ok(false);
        };

        let lag = SlaveLag {
            source_server_id: status.master_server_id,
            slave_seq: server.slave_gtid.seq_for_server(status.master_server_id),
            election_seq: election_gtid.seq_for_server(status.master_server_id),
        };
        if !lag.is_behind() {
            return Ok(false);
        }

        let master = ServerEndpoint::parse(&master)?;
        let driver = server.driver();
        driver.stop_slave(&self.settings.channel).await?;
        let opts = self.change_master_opts(&master, ReplicationMode::CurrentPos, "", 0);
        driver.change_master(&opts).await?;
        driver.start_slave(&self.settings.channel).await?;

        log_event_with_fields(
            Event::SlaveRepointed,
            &[
                ("url", &url),
                ("from", &status.source_url()),
                ("master", &master.url()),
                ("slave_seq", &lag.slave_seq.to_string()),
                ("election_seq", &lag.election_seq.to_string()),
            ],
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_strictly_behind() {
        let lag = |slave_seq, election_seq| SlaveLag {
            source_server_id: 1,
            slave_seq,
            election_seq,
        };
        assert!(lag(5, 7).is_behind());
        assert!(!lag(7, 7).is_behind());
        assert!(!lag(9, 7).is_behind());
    }
}
