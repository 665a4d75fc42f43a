//! Statement rendering
//!
//! `CHANGE MASTER TO` differs between MariaDB GTID, MySQL GTID,
//! file/position replication, a MaxScale binlog relay and group
//! replication. The differences are confined to this file.

use super::types::{ChangeMasterOpts, ReplicationMode};
use crate::gtid::GtidList;

/// Channel used by MySQL group replication for distributed recovery.
pub const GROUP_REPLICATION_CHANNEL: &str = "group_replication_recovery";

/// Quote a string literal.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\'' => quoted.push_str("\\'"),
            '\\' => quoted.push_str("\\\\"),
            c => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

/// MariaDB multi-source connection name, `CHANGE MASTER 'name' TO`.
fn mariadb_connection(channel: &str) -> String {
    if channel.is_empty() {
        String::new()
    } else {
        format!("{} ", quote(channel))
    }
}

/// MySQL replication channel suffix, `FOR CHANNEL 'name'`.
fn mysql_channel(channel: &str) -> String {
    if channel.is_empty() {
        String::new()
    } else {
        format!(" FOR CHANNEL {}", quote(channel))
    }
}

/// Render `CHANGE MASTER TO` for `opts`.
pub fn change_master(opts: &ChangeMasterOpts) -> String {
    let mut settings = vec![
        format!("MASTER_HOST={}", quote(&opts.host)),
        format!("MASTER_PORT={}", opts.port),
        format!("MASTER_USER={}", quote(&opts.user)),
        format!("MASTER_PASSWORD={}", quote(&opts.password)),
        format!("MASTER_CONNECT_RETRY={}", opts.retry),
        format!("MASTER_HEARTBEAT_PERIOD={}", opts.heartbeat),
    ];

    match opts.mode {
        ReplicationMode::GroupRepl => {
            return format!(
                "CHANGE MASTER TO MASTER_USER={}, MASTER_PASSWORD={} FOR CHANNEL {}",
                quote(&opts.user),
                quote(&opts.password),
                quote(GROUP_REPLICATION_CHANNEL)
            );
        }
        ReplicationMode::MasterAutoPosition => {
            settings.push("MASTER_AUTO_POSITION=1".to_string());
            return format!(
                "CHANGE MASTER TO {}{}",
                settings.join(", "),
                mysql_channel(&opts.channel)
            );
        }
        ReplicationMode::CurrentPos => settings.push("MASTER_USE_GTID=current_pos".to_string()),
        ReplicationMode::SlavePos => settings.push("MASTER_USE_GTID=slave_pos".to_string()),
        ReplicationMode::Positional | ReplicationMode::Mxs => {
            settings.push(format!("MASTER_LOG_FILE={}", quote(&opts.logfile)));
            settings.push(format!("MASTER_LOG_POS={}", opts.logpos));
        }
    }

    format!(
        "CHANGE MASTER {}TO {}",
        mariadb_connection(&opts.channel),
        settings.join(", ")
    )
}

pub fn start_slave(channel: &str) -> String {
    if channel.is_empty() {
        "START SLAVE".to_string()
    } else {
        format!("START SLAVE {}", quote(channel))
    }
}

pub fn stop_slave(channel: &str) -> String {
    if channel.is_empty() {
        "STOP SLAVE".to_string()
    } else {
        format!("STOP SLAVE {}", quote(channel))
    }
}

pub fn set_gtid_slave_pos(gtid: &GtidList) -> String {
    format!("SET GLOBAL gtid_slave_pos = {}", quote(&gtid.to_string()))
}

pub const SHOW_ALL_SLAVES_STATUS: &str = "SHOW ALL SLAVES STATUS";

pub const SHOW_MASTER_STATUS: &str = "SHOW MASTER STATUS";

pub const SELECT_NODE_VARIABLES: &str = "SELECT @@server_id AS server_id, \
     @@gtid_current_pos AS gtid_current_pos, \
     @@gtid_slave_pos AS gtid_slave_pos, \
     @@gtid_binlog_pos AS gtid_binlog_pos, \
     @@read_only AS read_only";

pub const SHOW_SEMI_SYNC_SLAVE_STATUS: &str =
    "SHOW GLOBAL STATUS LIKE 'Rpl_semi_sync_slave_status'";
