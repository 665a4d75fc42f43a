//! Binlog capture and crash backups
//!
//! Before a returning master is reconciled, the part of its binlog written
//! after the election is copied off the server. Flashback replays that copy
//! in reverse; when the elected master was not semi-sync caught up, the copy
//! is also archived, since it holds the only trace of the discarded events.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::driver::ServerEndpoint;

/// Capture prefix for `server`, `<dir>/<host>_<port>-<timestamp>-`.
///
/// `mysqlbinlog --raw` appends the binlog name to it.
pub fn capture_prefix(working_dir: &Path, server: &ServerEndpoint, now: DateTime<Utc>) -> String {
    working_dir
        .join(format!(
            "{}_{}-{}-",
            server.host,
            server.port,
            now.format("%Y%m%d%H%M%S")
        ))
        .display()
        .to_string()
}

/// File a capture with `prefix` produces for `logfile`.
pub fn captured_file(prefix: &str, logfile: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", prefix, logfile))
}

/// Dated crash backup directory, `<dir>/crash-bin-<date>`.
pub fn crash_backup_dir(working_dir: &Path, now: DateTime<Utc>) -> PathBuf {
    working_dir.join(format!("crash-bin-{}", now.format("%Y%m%d")))
}

/// Copy a captured binlog into `backup_dir`. Returns the archived path.
pub async fn archive_capture(captured: &Path, backup_dir: &Path) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(backup_dir).await?;
    let name = captured
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "capture has no file name"))?;
    let target = backup_dir.join(name);
    tokio::fs::copy(captured, &target).await?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 5).unwrap()
    }

    #[test]
    fn test_capture_names() {
        let prefix = capture_prefix(Path::new("/var/lib/replwatch"), &ServerEndpoint::new("db1", 3306), noon());
        assert_eq!(prefix, "/var/lib/replwatch/db1_3306-20240309123005-");
        assert_eq!(
            captured_file(&prefix, "mariadb-bin.000009"),
            PathBuf::from("/var/lib/replwatch/db1_3306-20240309123005-mariadb-bin.000009")
        );
    }

    #[test]
    fn test_backup_dir_is_dated() {
        assert_eq!(
            crash_backup_dir(Path::new("/w"), noon()),
            PathBuf::from("/w/crash-bin-20240309")
        );
    }

    #[tokio::test]
    async fn test_archive_copies_capture() {
        let dir = TempDir::new().unwrap();
        let captured = dir.path().join("db1_3306-x-mariadb-bin.000009");
        std::fs::write(&captured, b"binlog bytes").unwrap();

        let backup = crash_backup_dir(dir.path(), noon());
        let archived = archive_capture(&captured, &backup).await.unwrap();

        assert_eq!(archived, backup.join("db1_3306-x-mariadb-bin.000009"));
        assert_eq!(std::fs::read(&archived).unwrap(), b"binlog bytes");
        assert!(captured.exists());
    }
}
