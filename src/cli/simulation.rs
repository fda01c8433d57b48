//! Simulated cluster description
//!
//! A JSON file describing one shard and its copies. Every field except
//! `index` has a default, so `{"index": "logs"}` is a valid file: one
//! blocked primary and no replicas.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::cluster::{
    AllocationId, ClusterBlock, ClusterState, ClusterStateBuilder, IndexMetadata, IndexShardRoutingTable, NodeId,
    ShardId, ShardRouting, ShardRoutingState,
};
use crate::replication::ReplicationConfig;
use crate::shard::MemoryShard;

/// One replica copy of the simulated shard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedReplica {
    /// Node holding the copy
    pub node: String,

    #[serde(default = "default_state")]
    pub state: ShardRoutingState,

    /// Whether the copy is in the in-sync set
    #[serde(default = "default_true")]
    pub in_sync: bool,

    /// Whether the copy still has a routing entry
    #[serde(default = "default_true")]
    pub in_routing_table: bool,

    /// Whether requests to the copy get an answer
    #[serde(default = "default_true")]
    pub reachable: bool,

    #[serde(default)]
    pub active_operations: usize,

    /// Consistency check failure to inject
    #[serde(default)]
    pub fail_verification: Option<String>,
}

/// Simulation file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Index name (required)
    pub index: String,

    #[serde(default = "default_index_uuid")]
    pub index_uuid: String,

    #[serde(default)]
    pub shard: u32,

    #[serde(default = "default_primary_term")]
    pub primary_term: u64,

    #[serde(default = "default_primary_node")]
    pub primary_node: String,

    #[serde(default)]
    pub primary_active_operations: usize,

    #[serde(default)]
    pub replicas: Vec<SimulatedReplica>,

    /// Whether the index carries the closing block
    #[serde(default = "default_true")]
    pub blocked: bool,

    #[serde(default)]
    pub replication: ReplicationConfig,
}

fn default_state() -> ShardRoutingState {
    ShardRoutingState::Started
}

fn default_true() -> bool {
    true
}

fn default_index_uuid() -> String {
    "_na_".to_string()
}

fn default_primary_term() -> u64 {
    1
}

fn default_primary_node() -> String {
    "node_0".to_string()
}

impl SimulationConfig {
    /// Load a simulation from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read simulation: {}", e)))?;

        let config: SimulationConfig = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid simulation JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Reject files that describe an impossible shard
    pub fn validate(&self) -> CliResult<()> {
        if self.index.trim().is_empty() {
            return Err(CliError::config_error("index must not be empty"));
        }
        if self.primary_term == 0 {
            return Err(CliError::config_error("primary_term must be > 0"));
        }

        let mut nodes = HashSet::new();
        nodes.insert(self.primary_node.as_str());
        for replica in &self.replicas {
            if !nodes.insert(replica.node.as_str()) {
                return Err(CliError::config_error(format!(
                    "node '{}' holds more than one copy of the shard",
                    replica.node
                )));
            }
        }

        self.replication.validate()?;
        Ok(())
    }

    pub fn shard_id(&self) -> ShardId {
        ShardId::new(self.index.clone(), self.index_uuid.clone(), self.shard)
    }

    /// Build the cluster state and in-memory copies
    pub fn build(&self) -> CliResult<Simulation> {
        let shard_id = self.shard_id();
        let block = ClusterBlock::index_closing();
        let primary_node = NodeId::new(self.primary_node.clone());

        let primary_routing = ShardRouting::new(
            shard_id.clone(),
            AllocationId::new("primary"),
            primary_node.clone(),
            true,
            ShardRoutingState::Started,
        );
        let primary = Arc::new(MemoryShard::new(primary_routing.clone()));
        primary.set_active_operations(self.primary_active_operations);

        let mut routings = vec![primary_routing.clone()];
        let mut in_sync = vec![primary_routing.allocation_id().clone()];
        let mut replicas = Vec::new();
        let mut unreachable = Vec::new();

        for (i, replica) in self.replicas.iter().enumerate() {
            let allocation_id = AllocationId::new(format!("replica_{}", i));
            if replica.in_sync {
                in_sync.push(allocation_id.clone());
            }
            if !replica.in_routing_table {
                continue;
            }

            let routing = ShardRouting::new(
                shard_id.clone(),
                allocation_id.clone(),
                NodeId::new(replica.node.clone()),
                false,
                replica.state,
            );
            let shard = Arc::new(MemoryShard::new(routing.clone()));
            shard.set_active_operations(replica.active_operations);
            if let Some(message) = &replica.fail_verification {
                shard.fail_verification(message.clone());
            }
            if !replica.reachable {
                unreachable.push(allocation_id);
            }
            routings.push(routing);
            replicas.push(shard);
        }

        let table = IndexShardRoutingTable::new(shard_id.clone(), routings)?;
        let metadata = IndexMetadata::new(self.index.clone(), self.index_uuid.clone()).with_shard(
            self.shard,
            self.primary_term,
            in_sync,
        );
        let mut builder = ClusterStateBuilder::new(primary_node.clone())
            .master_node(primary_node)
            .add_index(metadata)
            .add_routing_table(table);
        if self.blocked {
            builder = builder.add_index_block(self.index.clone(), block.clone());
        }

        Ok(Simulation {
            shard_id,
            block,
            state: builder.build(),
            primary,
            replicas,
            unreachable,
        })
    }
}

/// A built simulation, ready to run
pub struct Simulation {
    pub shard_id: ShardId,
    /// Block the verification request names
    pub block: ClusterBlock,
    pub state: ClusterState,
    pub primary: Arc<MemoryShard>,
    /// Copies with a routing entry
    pub replicas: Vec<Arc<MemoryShard>>,
    pub unreachable: Vec<AllocationId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: &str) -> SimulationConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_minimal_file() {
        let config = config(r#"{"index": "logs"}"#);
        assert!(config.validate().is_ok());
        assert!(config.blocked);
        assert_eq!(config.primary_term, 1);
        assert_eq!(config.replication, ReplicationConfig::default());

        let simulation = config.build().unwrap();
        assert!(simulation.replicas.is_empty());
        assert!(simulation
            .state
            .blocks()
            .has_index_block("logs", &simulation.block));
    }

    #[test]
    fn test_duplicate_nodes_rejected() {
        let config = config(r#"{"index": "logs", "replicas": [{"node": "node_0"}]}"#);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_removed_copy_stays_in_sync() {
        let config = config(
            r#"{"index": "logs", "replicas": [{"node": "a"}, {"node": "b", "in_routing_table": false}]}"#,
        );
        let simulation = config.build().unwrap();
        assert_eq!(simulation.replicas.len(), 1);

        let group = simulation.state.replication_group(&simulation.shard_id).unwrap();
        assert!(group.is_in_sync(&AllocationId::new("replica_1")));
        assert!(group.unavailable_in_sync_shards().contains(&AllocationId::new("replica_1")));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = config(r#"{"index": "logs", "replication": {"replica_timeout_ms": 0}}"#);
        assert!(config.validate().is_err());
    }
}
