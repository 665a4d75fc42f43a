//! CLI argument definitions using clap
//!
//! Commands:
//! - replwatch start --config <path> [--master <host:port>]
//! - replwatch check-config --config <path>
//! - replwatch crashes --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// replwatch - failure detection, failover admission and rejoin for
/// MariaDB/MySQL replication
#[derive(Parser, Debug)]
#[command(name = "replwatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the monitoring loop until interrupted
    Start {
        /// Path to configuration file
        #[arg(long, default_value = "./replwatch.json")]
        config: PathBuf,

        /// Current master, when it cannot be inferred from the topology
        #[arg(long)]
        master: Option<String>,
    },

    /// Validate the configuration and print it with defaults applied
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./replwatch.json")]
        config: PathBuf,
    },

    /// List the crash records persisted in the working directory
    Crashes {
        /// Path to configuration file
        #[arg(long, default_value = "./replwatch.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
