//! replwatch - failure detection, failover admission and crash-aware
//! rejoin for MariaDB/MySQL replication

pub mod cli;
pub mod cluster;
pub mod crash;
pub mod driver;
pub mod exec;
pub mod failover;
pub mod gtid;
pub mod monitor;
pub mod observability;
pub mod rejoin;
