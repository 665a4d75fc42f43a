//! Controller counters
//!
//! Plain atomic counters, read as a [`MetricsSnapshot`]. Nothing is
//! exported; the snapshot is logged on shutdown.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Registry of controller counters
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    probes_failed: AtomicU64,
    state_changes: AtomicU64,
    failovers: AtomicU64,
    failovers_blocked: AtomicU64,
    rejoins_sync: AtomicU64,
    rejoins_flashback: AtomicU64,
    rejoins_mysqldump: AtomicU64,
    rejoins_failed: AtomicU64,
    binlog_capture_failures: AtomicU64,
    alerts_sent: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_probes_failed(&self) {
        self.probes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_state_changes(&self) {
        self.state_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failovers(&self) {
        self.failovers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failovers_blocked(&self) {
        self.failovers_blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejoins_sync(&self) {
        self.rejoins_sync.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejoins_flashback(&self) {
        self.rejoins_flashback.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejoins_mysqldump(&self) {
        self.rejoins_mysqldump.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejoins_failed(&self) {
        self.rejoins_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_binlog_capture_failures(&self) {
        self.binlog_capture_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_alerts_sent(&self) {
        self.alerts_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            probes_failed: self.probes_failed.load(Ordering::Relaxed),
            state_changes: self.state_changes.load(Ordering::Relaxed),
            failovers: self.failovers.load(Ordering::Relaxed),
            failovers_blocked: self.failovers_blocked.load(Ordering::Relaxed),
            rejoins_sync: self.rejoins_sync.load(Ordering::Relaxed),
            rejoins_flashback: self.rejoins_flashback.load(Ordering::Relaxed),
            rejoins_mysqldump: self.rejoins_mysqldump.load(Ordering::Relaxed),
            rejoins_failed: self.rejoins_failed.load(Ordering::Relaxed),
            binlog_capture_failures: self.binlog_capture_failures.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub probes_failed: u64,
    pub state_changes: u64,
    pub failovers: u64,
    pub failovers_blocked: u64,
    pub rejoins_sync: u64,
    pub rejoins_flashback: u64,
    pub rejoins_mysqldump: u64,
    pub rejoins_failed: u64,
    pub binlog_capture_failures: u64,
    pub alerts_sent: u64,
}

impl MetricsSnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
