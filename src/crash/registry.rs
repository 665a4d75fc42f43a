//! Crash registry
//!
//! One record per failover episode, keyed by the deposed primary's URL.
//! Records are appended at election and consumed once by a successful
//! rejoin.

use serde::{Deserialize, Serialize};

use super::record::Crash;

/// How [`CrashRegistry::get`] resolves a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashLookup {
    /// Return the record whose URL matches exactly.
    #[default]
    Exact,

    /// Historical behaviour: with two or more records, the first record is
    /// relabelled with the queried URL and returned.
    Legacy,
}

/// Ordered collection of crash records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrashRegistry {
    crashes: Vec<Crash>,
    lookup: CrashLookup,
}

impl CrashRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_lookup(&mut self, lookup: CrashLookup) {
        self.lookup = lookup;
    }

    /// Append a record produced at election time.
    pub fn push(&mut self, crash: Crash) {
        self.crashes.push(crash);
    }

    /// Look up the record for `url`.
    pub fn get(&mut self, url: &str) -> Option<&Crash> {
        match self.lookup {
            CrashLookup::Exact => self.crashes.iter().find(|c| c.url == url),
            CrashLookup::Legacy => {
                if self.crashes.len() >= 2 {
                    let first = &mut self.crashes[0];
                    first.url = url.to_string();
                    Some(&*first)
                } else {
                    self.crashes.iter().find(|c| c.url == url)
                }
            }
        }
    }

    /// Record of the episode that elected `url`.
    pub fn get_by_elected_master(&self, url: &str) -> Option<&Crash> {
        self.crashes
            .iter()
            .rev()
            .find(|c| c.elected_master_url == url)
    }

    /// Remove the first record for `url` by swapping it with the last one.
    /// Returns the removed record.
    pub fn delete(&mut self, url: &str) -> Option<Crash> {
        let index = self.crashes.iter().position(|c| c.url == url)?;
        Some(self.crashes.swap_remove(index))
    }

    pub fn len(&self) -> usize {
        self.crashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crashes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Crash> {
        self.crashes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(urls: &[&str]) -> CrashRegistry {
        let mut registry = CrashRegistry::new();
        for url in urls {
            registry.push(Crash::new(*url, "db9:3306"));
        }
        registry
    }

    #[test]
    fn test_exact_lookup() {
        let mut reg = registry(&["db1:3306", "db2:3306"]);
        assert_eq!(reg.get("db2:3306").unwrap().url, "db2:3306");
        assert!(reg.get("db3:3306").is_none());
    }

    #[test]
    fn test_delete_swap_removes_one() {
        let mut reg = registry(&["db1:3306", "db2:3306", "db3:3306", "db4:3306"]);
        let removed = reg.delete("db2:3306").unwrap();
        assert_eq!(removed.url, "db2:3306");
        assert_eq!(reg.len(), 3);

        let mut remaining: Vec<&str> = reg.iter().map(|c| c.url.as_str()).collect();
        remaining.sort();
        assert_eq!(remaining, vec!["db1:3306", "db3:3306", "db4:3306"]);
    }

    #[test]
    fn test_delete_only_first_duplicate() {
        let mut reg = registry(&["db1:3306", "db1:3306"]);
        reg.delete("db1:3306");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let mut reg = registry(&["db1:3306"]);
        assert!(reg.delete("db7:3306").is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_legacy_lookup_relabels_first_entry() {
        let mut reg = registry(&["db1:3306", "db2:3306"]);
        reg.set_lookup(CrashLookup::Legacy);

        let found = reg.get("db2:3306").unwrap().clone();
        assert_eq!(found.url, "db2:3306");

        let urls: Vec<&str> = reg.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["db2:3306", "db2:3306"]);
    }

    #[test]
    fn test_legacy_lookup_single_entry_is_exact() {
        let mut reg = registry(&["db1:3306"]);
        reg.set_lookup(CrashLookup::Legacy);
        assert!(reg.get("db2:3306").is_none());
        assert!(reg.get("db1:3306").is_some());
    }

    #[test]
    fn test_lookup_by_elected_master_prefers_latest() {
        let mut reg = CrashRegistry::new();
        reg.push(Crash::new("db1:3306", "db2:3306"));
        reg.push(Crash::new("db3:3306", "db2:3306"));
        assert_eq!(reg.get_by_elected_master("db2:3306").unwrap().url, "db3:3306");
        assert!(reg.get_by_elected_master("db1:3306").is_none());
    }
}
