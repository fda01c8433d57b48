//! CLI argument definitions using clap
//!
//! Commands:
//! - closeguard plan --config <path>
//! - closeguard verify --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// closeguard - verify shard copies before an index is closed
#[derive(Parser, Debug)]
#[command(name = "closeguard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print which copies would be verified and which would be marked stale
    Plan {
        /// Path to simulation file
        #[arg(long, default_value = "./closeguard.json")]
        config: PathBuf,
    },

    /// Run verification across the simulated replication group
    Verify {
        /// Path to simulation file
        #[arg(long, default_value = "./closeguard.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verify() {
        let cli = Cli::try_parse_from(["closeguard", "verify", "--config", "sim.json"]).unwrap();
        match cli.command {
            Command::Verify { config } => assert_eq!(config, PathBuf::from("sim.json")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_plan_default_config() {
        let cli = Cli::try_parse_from(["closeguard", "plan"]).unwrap();
        assert!(matches!(cli.command, Command::Plan { ref config } if config == &PathBuf::from("./closeguard.json")));
    }
}
