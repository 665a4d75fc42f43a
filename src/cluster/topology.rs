//! Shared cluster state
//!
//! Everything health checks, admission and rejoins read or write across
//! servers sits in one [`Topology`] behind one `RwLock`. The lock is taken
//! for short synchronous sections only, never across an `.await`.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::crash::CrashRegistry;

/// Cluster-wide mutable state
#[derive(Debug, Clone)]
pub struct Topology {
    /// URL of the current master
    pub master: Option<String>,
    /// URLs of the replicas of the current master
    pub slaves: Vec<String>,
    pub failover_ctr: u32,
    /// Unix seconds of the last failover, 0 if none
    pub failover_ts: i64,
    /// Cleared for good by the first binlog capture failure
    pub can_flashback: bool,
    pub crashes: CrashRegistry,
    /// Monitor ticks since start
    pub heartbeat: u64,
    /// A failover or switchover is running
    pub in_failover: bool,
}

impl Topology {
    pub fn new(crashes: CrashRegistry) -> Self {
        Self {
            master: None,
            slaves: Vec::new(),
            failover_ctr: 0,
            failover_ts: 0,
            can_flashback: true,
            crashes,
            heartbeat: 0,
            in_failover: false,
        }
    }

    pub fn is_master(&self, url: &str) -> bool {
        self.master.as_deref() == Some(url)
    }

    pub fn add_slave(&mut self, url: &str) -> bool {
        if self.slaves.iter().any(|s| s == url) {
            return false;
        }
        self.slaves.push(url.to_string());
        true
    }

    pub fn remove_slave(&mut self, url: &str) -> bool {
        let before = self.slaves.len();
        self.slaves.retain(|s| s != url);
        self.slaves.len() != before
    }

    /// Never re-enabled in this process.
    pub fn disable_flashback(&mut self) {
        self.can_flashback = false;
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::new(CrashRegistry::new())
    }
}

/// Cheap-to-clone handle on the shared [`Topology`].
#[derive(Debug, Clone, Default)]
pub struct SharedTopology {
    inner: Arc<RwLock<Topology>>,
}

impl SharedTopology {
    pub fn new(topology: Topology) -> Self {
        Self {
            inner: Arc::new(RwLock::new(topology)),
        }
    }

    /// A panic while holding the lock leaves plain data behind, so a
    /// poisoned lock is recovered rather than propagated.
    pub fn read(&self) -> RwLockReadGuard<'_, Topology> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Topology> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> Topology {
        self.read().clone()
    }
}
