//! GTID ledger
//!
//! Per-origin-server sequence counters as reported by MariaDB in
//! `@@gtid_current_pos`, `@@gtid_slave_pos` and `Gtid_IO_Pos`.

mod errors;
mod list;

pub use errors::{GtidError, GtidResult};
pub use list::{Gtid, GtidList};
