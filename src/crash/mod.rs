//! Crash Registry
//!
//! Records the election-time state of every deposed primary. The rejoin
//! engine consumes a record exactly once, when the matching node has been
//! reconciled with the current topology.

mod errors;
mod record;
mod registry;
mod store;

pub use errors::{CrashStoreError, CrashStoreResult};
pub use record::Crash;
pub use registry::{CrashLookup, CrashRegistry};
pub use store::{CrashStore, CRASH_STATE_FILE};
