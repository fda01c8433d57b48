//! CLI module for closeguard
//!
//! Runs the verify-before-close protocol against a simulated cluster
//! described in a JSON file:
//! - plan: show replication targets and copies that would be marked stale
//! - verify: run verification on in-memory shard copies

mod args;
mod commands;
mod errors;
mod io;
mod simulation;

pub use args::{Cli, Command};
pub use commands::{plan, plan_report, run, run_command, verify, verify_report};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
pub use simulation::{SimulatedReplica, Simulation, SimulationConfig};
