//! MariaDB GTID positions
//!
//! A GTID position such as `@@gtid_current_pos` is a comma separated list of
//! `domain-server-sequence` triples, one per (domain, origin server) pair.
//! Ahead/behind reasoning elsewhere in the crate goes through
//! [`GtidList::equal`] and [`GtidList::seq_for_server`] only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{GtidError, GtidResult};

/// A single `domain-server-sequence` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Gtid {
    /// Replication domain
    pub domain_id: u32,
    /// Server id of the node that originated the transaction
    pub server_id: u64,
    /// Monotonic sequence number within the domain
    pub seq_no: u64,
}

impl FromStr for Gtid {
    type Err = GtidError;

    fn from_str(s: &str) -> GtidResult<Self> {
        let trimmed = s.trim();
        let parts: Vec<&str> = trimmed.split('-').collect();
        if parts.len() != 3 {
            return Err(GtidError::Malformed(trimmed.to_string()));
        }

        let number = |value: &str| {
            value.parse::<u64>().map_err(|_| GtidError::InvalidNumber {
                gtid: trimmed.to_string(),
                value: value.to_string(),
            })
        };

        let domain_id = u32::try_from(number(parts[0])?).map_err(|_| GtidError::InvalidNumber {
            gtid: trimmed.to_string(),
            value: parts[0].to_string(),
        })?;

        Ok(Self {
            domain_id,
            server_id: number(parts[1])?,
            seq_no: number(parts[2])?,
        })
    }
}

impl fmt::Display for Gtid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.domain_id, self.server_id, self.seq_no)
    }
}

/// A GTID position: the last applied sequence per (domain, origin server).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GtidList {
    gtids: Vec<Gtid>,
}

impl GtidList {
    /// Create an empty position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the server's text form. Empty input yields an empty list.
    pub fn parse(s: &str) -> GtidResult<Self> {
        let gtids = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Gtid::from_str)
            .collect::<GtidResult<Vec<_>>>()?;
        Ok(Self { gtids })
    }

    pub fn is_empty(&self) -> bool {
        self.gtids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.gtids.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Gtid> {
        self.gtids.iter()
    }

    /// Same set of triples, regardless of the order the server printed them.
    pub fn equal(&self, other: &GtidList) -> bool {
        if self.gtids.len() != other.gtids.len() {
            return false;
        }
        let mut mine = self.gtids.clone();
        let mut theirs = other.gtids.clone();
        mine.sort();
        theirs.sort();
        mine == theirs
    }

    /// Highest sequence originated by `server_id` across all domains, or 0
    /// when the server never originated a transaction in this position.
    pub fn seq_for_server(&self, server_id: u64) -> u64 {
        self.gtids
            .iter()
            .filter(|g| g.server_id == server_id)
            .map(|g| g.seq_no)
            .max()
            .unwrap_or(0)
    }
}

impl FromStr for GtidList {
    type Err = GtidError;

    fn from_str(s: &str) -> GtidResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for GtidList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.gtids.iter().map(Gtid::to_string).collect();
        write!(f, "{}", rendered.join(","))
    }
}

impl TryFrom<String> for GtidList {
    type Error = GtidError;

    fn try_from(value: String) -> GtidResult<Self> {
        Self::parse(&value)
    }
}

impl From<GtidList> for String {
    fn from(list: GtidList) -> Self {
        list.to_string()
    }
}
