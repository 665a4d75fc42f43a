//! Parsing of `mysql --vertical` output
//!
//! Vertical output prints each row as a `*** N. row ***` banner followed by
//! one `Column: value` line per column.

use std::collections::HashMap;

use super::types::{NodeStatus, SlaveStatus, ThreadRunning};
use crate::gtid::GtidList;

/// One row, column name to raw value.
pub type Row = HashMap<String, String>;

/// Split vertical output into rows.
pub fn vertical_rows(output: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    let mut current: Option<Row> = None;

    for line in output.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("***") {
            if let Some(row) = current.take() {
                rows.push(row);
            }
            current = Some(Row::new());
            continue;
        }
        if let (Some(row), Some((key, value))) = (current.as_mut(), trimmed.split_once(':')) {
            row.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    if let Some(row) = current {
        rows.push(row);
    }
    rows
}

fn text<'a>(row: &'a Row, key: &str) -> &'a str {
    row.get(key).map(String::as_str).unwrap_or("")
}

fn number(row: &Row, key: &str) -> Result<u64, String> {
    let raw = text(row, key);
    if raw.is_empty() || raw.eq_ignore_ascii_case("NULL") {
        return Ok(0);
    }
    raw.parse::<u64>()
        .map_err(|_| format!("column {} is not a number: '{}'", key, raw))
}

fn gtid(row: &Row, key: &str) -> Result<GtidList, String> {
    GtidList::parse(text(row, key)).map_err(|e| format!("column {}: {}", key, e))
}

/// Channel row from `SHOW ALL SLAVES STATUS`.
pub fn slave_status(row: &Row) -> Result<SlaveStatus, String> {
    let seconds = text(row, "Seconds_Behind_Master");
    let seconds_behind_master = if seconds.is_empty() || seconds.eq_ignore_ascii_case("NULL") {
        None
    } else {
        Some(
            seconds
                .parse::<u64>()
                .map_err(|_| format!("Seconds_Behind_Master is not a number: '{}'", seconds))?,
        )
    };

    let master_port = number(row, "Master_Port")?;

    Ok(SlaveStatus {
        connection_name: text(row, "Connection_name").to_string(),
        master_host: text(row, "Master_Host").to_string(),
        master_port: u16::try_from(master_port)
            .map_err(|_| format!("Master_Port out of range: {}", master_port))?,
        master_server_id: number(row, "Master_Server_Id")?,
        io_running: ThreadRunning::parse(text(row, "Slave_IO_Running")),
        sql_running: ThreadRunning::parse(text(row, "Slave_SQL_Running")),
        seconds_behind_master,
        last_io_error: text(row, "Last_IO_Error").to_string(),
        last_sql_error: text(row, "Last_SQL_Error").to_string(),
        gtid_io_pos: gtid(row, "Gtid_IO_Pos")?,
        using_gtid: text(row, "Using_Gtid").to_string(),
        master_log_file: text(row, "Master_Log_File").to_string(),
        read_master_log_pos: number(row, "Read_Master_Log_Pos")?,
        received_heartbeats: number(row, "Slave_received_heartbeats")?,
    })
}

/// Assemble node status from the variables row, the optional
/// `SHOW MASTER STATUS` row and the optional semi-sync status row.
pub fn node_status(
    variables: &Row,
    master: Option<&Row>,
    semi_sync: Option<&Row>,
) -> Result<NodeStatus, String> {
    let (binary_log_file, binary_log_pos) = match master {
        Some(row) => (text(row, "File").to_string(), number(row, "Position")?),
        None => (String::new(), 0),
    };

    let semi_sync_slave_status = semi_sync
        .map(|row| text(row, "Value").eq_ignore_ascii_case("ON"))
        .unwrap_or(false);

    Ok(NodeStatus {
        server_id: number(variables, "server_id")?,
        current_gtid: gtid(variables, "gtid_current_pos")?,
        slave_gtid: gtid(variables, "gtid_slave_pos")?,
        gtid_binlog_pos: gtid(variables, "gtid_binlog_pos")?,
        binary_log_file,
        binary_log_pos,
        semi_sync_slave_status,
        read_only: text(variables, "read_only") == "1",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_SLAVES: &str = "\
*************************** 1. row ***************************
              Connection_name:
              Slave_SQL_State: Slave has read all relay log
               Slave_IO_State: Waiting for master to send event
                  Master_Host: db1
                  Master_Port: 3306
              Master_Log_File: mariadb-bin.000004
          Read_Master_Log_Pos: 1290
             Slave_IO_Running: Yes
            Slave_SQL_Running: Yes
                Last_IO_Error:
               Last_SQL_Error:
        Seconds_Behind_Master: 0
             Master_Server_Id: 1
                   Using_Gtid: Current_Pos
                  Gtid_IO_Pos: 0-1-42
    Slave_received_heartbeats: 17
*************************** 2. row ***************************
              Connection_name: east
                  Master_Host: db7
                  Master_Port: 3307
             Slave_IO_Running: Connecting
            Slave_SQL_Running: Yes
                Last_IO_Error: error connecting to master 'repl@db7:3307' - retry-time: 10
        Seconds_Behind_Master: NULL
             Master_Server_Id: 7
                  Gtid_IO_Pos:
";

    #[test]
    fn test_vertical_rows_split() {
        let rows = vertical_rows(ALL_SLAVES);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Connection_name"], "");
        assert_eq!(rows[1]["Connection_name"], "east");
    }

    #[test]
    fn test_value_with_colon_kept_whole() {
        let rows = vertical_rows(ALL_SLAVES);
        assert_eq!(
            rows[1]["Last_IO_Error"],
            "error connecting to master 'repl@db7:3307' - retry-time: 10"
        );
    }

    #[test]
    fn test_slave_status_fields() {
        let rows = vertical_rows(ALL_SLAVES);
        let status = slave_status(&rows[0]).unwrap();
        assert_eq!(status.source_url(), "db1:3306");
        assert_eq!(status.io_running, ThreadRunning::Yes);
        assert_eq!(status.seconds_behind_master, Some(0));
        assert_eq!(status.gtid_io_pos.seq_for_server(1), 42);
        assert_eq!(status.received_heartbeats, 17);
        assert!(status.uses_gtid());

        let east = slave_status(&rows[1]).unwrap();
        assert_eq!(east.io_running, ThreadRunning::Connecting);
        assert_eq!(east.seconds_behind_master, None);
        assert!(east.gtid_io_pos.is_empty());
    }

    #[test]
    fn test_node_status() {
        let vars = vertical_rows(
            "*** 1. row ***\n server_id: 3\n gtid_current_pos: 0-3-10,0-1-7\n gtid_slave_pos: 0-1-7\n gtid_binlog_pos: 0-3-10\n read_only: 0\n",
        );
        let master = vertical_rows("*** 1. row ***\n File: mariadb-bin.000002\n Position: 889\n");
        let semi = vertical_rows(
            "*** 1. row ***\n Variable_name: Rpl_semi_sync_slave_status\n Value: ON\n",
        );

        let status = node_status(&vars[0], master.first(), semi.first()).unwrap();
        assert_eq!(status.server_id, 3);
        assert_eq!(status.current_gtid.seq_for_server(3), 10);
        assert_eq!(status.binary_log_file, "mariadb-bin.000002");
        assert_eq!(status.binary_log_pos, 889);
        assert!(status.semi_sync_slave_status);
        assert!(!status.read_only);
    }

    #[test]
    fn test_node_status_without_binlog() {
        let vars = vertical_rows("*** 1. row ***\n server_id: 4\n gtid_current_pos:\n");
        let status = node_status(&vars[0], None, None).unwrap();
        assert_eq!(status.binary_log_file, "");
        assert!(!status.semi_sync_slave_status);
    }

    #[test]
    fn test_bad_number_reported() {
        let rows = vertical_rows("*** 1. row ***\n Master_Port: abc\n");
        assert!(slave_status(&rows[0]).is_err());
    }
}
