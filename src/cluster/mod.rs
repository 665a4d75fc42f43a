//! Cluster
//!
//! The monitoring loop and everything it shares between servers:
//! configuration, topology, the election seam, alerts and the state hook.
//!
//! # Tick
//!
//! 1. Every server is checked on its own task; a qualifying server is
//!    rejoined on that same task
//! 2. Replica list, master and relay flags are updated from the results
//! 3. State changes raise alerts
//! 4. Failover admission runs once, then the failover itself

mod alert;
mod config;
mod controller;
mod elector;
mod errors;
mod hook;
mod topology;

pub use alert::{AlertError, AlertResult, AlertSink, Alerter, EmailAlert, ScriptAlert, StateAlert};
pub use config::{ClusterConfig, MailConfig};
pub use controller::{discover_master, Cluster, TickReport};
pub use elector::{parse_elected, Elector, ManualElector, ScriptElector};
pub use errors::{ClusterError, ClusterErrorKind, ClusterResult};
pub use hook::{ClusterStateEvent, LogStateHook, StateCode, StateHook};
pub use topology::{SharedTopology, Topology};
