//! False-positive detection through replica heartbeats
//!
//! A replica whose `Slave_received_heartbeats` keeps rising is still
//! hearing from the master, so the master is not down whatever our own
//! probes say.

use std::sync::Arc;
use std::time::Duration;

use crate::driver::ServerDriver;
use crate::observability::{log_event_with_fields, Event};

/// Default gap between the two samples.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);

/// Two readings of one replica's heartbeat counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatSample {
    pub url: String,
    pub before: u64,
    pub after: u64,
}

impl HeartbeatSample {
    pub fn is_increasing(&self) -> bool {
        self.after > self.before
    }
}

/// First replica whose counter rose between the samples.
pub fn is_one_slave_heartbeat_increasing(samples: &[HeartbeatSample]) -> Option<&HeartbeatSample> {
    samples.iter().find(|s| s.is_increasing())
}

/// Replicas to sample.
pub struct HeartbeatCheck {
    pub slaves: Vec<(String, Arc<dyn ServerDriver>)>,
    pub channel: String,
    pub interval: Duration,
}

impl HeartbeatCheck {
    /// Read every replica, sleep `interval`, read again.
    ///
    /// Replicas that cannot be read in either round are left out.
    pub async fn sample(&self) -> Vec<HeartbeatSample> {
        let mut first = Vec::with_capacity(self.slaves.len());
        for (url, driver) in &self.slaves {
            match driver.received_heartbeats(&self.channel).await {
                Ok(count) => first.push((url, driver, count)),
                Err(e) => log_event_with_fields(
                    Event::StatusReadFailed,
                    &[("url", url), ("reason", &e.to_string())],
                ),
            }
        }

        tokio::time::sleep(self.interval).await;

        let mut samples = Vec::with_capacity(first.len());
        for (url, driver, before) in first {
            match driver.received_heartbeats(&self.channel).await {
                Ok(after) => samples.push(HeartbeatSample {
                    url: url.clone(),
                    before,
                    after,
                }),
                Err(e) => log_event_with_fields(
                    Event::StatusReadFailed,
                    &[("url", url), ("reason", &e.to_string())],
                ),
            }
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(url: &str, before: u64, after: u64) -> HeartbeatSample {
        HeartbeatSample {
            url: url.into(),
            before,
            after,
        }
    }

    #[test]
    fn test_rising_counter_detected() {
        let samples = vec![sample("db2:3306", 10, 10), sample("db3:3306", 4, 6)];
        let hit = is_one_slave_heartbeat_increasing(&samples).unwrap();
        assert_eq!(hit.url, "db3:3306");
    }

    #[test]
    fn test_unchanged_counters_pass() {
        let samples = vec![sample("db2:3306", 10, 10), sample("db3:3306", 0, 0)];
        assert!(is_one_slave_heartbeat_increasing(&samples).is_none());
        assert!(is_one_slave_heartbeat_increasing(&[]).is_none());
    }
}
