//! CLI module for replwatch
//!
//! Provides command-line interface for:
//! - start: Run the monitoring loop
//! - check-config: Validate and print the effective configuration
//! - crashes: List persisted crash records

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{check_config, crashes, run, run_command, start};
pub use errors::{CliError, CliErrorCode, CliResult};
