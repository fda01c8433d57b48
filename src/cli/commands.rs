//! CLI command implementations
//!
//! Both commands load the simulation file first; nothing runs against an
//! invalid file.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};
use super::simulation::SimulationConfig;
use crate::close::{LocalReplicas, ShardRequest, VerifyShardBeforeCloseAction};
use crate::cluster::{ClusterService, TaskId};
use crate::shard::IndexShard;
use crate::shard_state::MemoryShardStateReporter;
use crate::transport::CapturingTransport;

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Plan { config } => plan(&config),
        Command::Verify { config } => verify(&config),
    }
}

/// Print replication targets and copies that would be marked stale
pub fn plan(config_path: &Path) -> CliResult<()> {
    let config = SimulationConfig::load(config_path)?;
    write_response(plan_report(&config)?)
}

/// Targets and unavailable in-sync copies of the simulated shard
pub fn plan_report(config: &SimulationConfig) -> CliResult<Value> {
    let simulation = config.build()?;
    let group = simulation.state.replication_group(&simulation.shard_id)?;

    let targets: Vec<Value> = group
        .replication_targets()
        .map(|copy| {
            json!({
                "allocation_id": copy.allocation_id(),
                "node": copy.node_id(),
                "primary": copy.primary(),
                "in_sync": group.is_in_sync(copy.allocation_id()),
            })
        })
        .collect();
    let stale: Vec<&str> = group
        .unavailable_in_sync_shards()
        .iter()
        .map(|id| id.as_str())
        .collect();

    Ok(json!({
        "shard": simulation.shard_id.to_string(),
        "primary_term": config.primary_term,
        "total": targets.len(),
        "targets": targets,
        "mark_stale": stale,
    }))
}

/// Run verification on the simulated shard and print the outcome
pub fn verify(config_path: &Path) -> CliResult<()> {
    let config = SimulationConfig::load(config_path)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::runtime_failed(format!("Failed to create tokio runtime: {}", e)))?;

    match rt.block_on(verify_report(&config)) {
        Ok(report) => write_response(report),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// ShardInfo, demoted copies and counters of one verification run
pub async fn verify_report(config: &SimulationConfig) -> CliResult<Value> {
    let simulation = config.build()?;
    let cluster = Arc::new(ClusterService::new(simulation.state.clone()));
    let reporter = Arc::new(MemoryShardStateReporter::new().with_current_primary_term(config.primary_term));
    // copies are reached in-process; nothing goes over this transport
    let transport = Arc::new(CapturingTransport::new());

    let action = Arc::new(VerifyShardBeforeCloseAction::new(
        cluster.clone(),
        transport,
        reporter.clone(),
        config.replication.clone(),
    )?);

    let mut replicas = LocalReplicas::new(Arc::clone(&action), config.primary_term);
    for shard in &simulation.replicas {
        replicas = replicas.with_shard(shard.clone());
    }
    for allocation_id in &simulation.unreachable {
        replicas = replicas.with_unreachable(allocation_id.clone());
    }

    let request = ShardRequest::new(
        simulation.shard_id.clone(),
        simulation.block.clone(),
        TaskId::new(cluster.local_node(), 1),
    );
    let info = action
        .execute_with(request, simulation.primary.clone(), Arc::new(replicas))
        .await?;

    let flushed: Vec<String> = std::iter::once(&simulation.primary)
        .chain(simulation.replicas.iter())
        .filter(|shard| !shard.flush_requests().is_empty())
        .map(|shard| shard.routing_entry().allocation_id().to_string())
        .collect();

    Ok(json!({
        "shard": simulation.shard_id.to_string(),
        "shard_info": info,
        "flushed": flushed,
        "demoted": reporter.entries(),
        "metrics": action.metrics().snapshot(),
    }))
}
