//! Shared cluster fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use closeguard::close::{ShardRequest, VerifyShardBeforeCloseAction};
use closeguard::cluster::{
    AllocationId, ClusterBlock, ClusterService, ClusterState, ClusterStateBuilder, IndexMetadata,
    IndexShardRoutingTable, NodeId, ShardId, ShardRouting, ShardRoutingState, TaskId,
};
use closeguard::replication::ReplicationConfig;
use closeguard::shard_state::ShardStateAction;
use closeguard::transport::CapturingTransport;

pub const PRIMARY_TERM: u64 = 1;

/// One shard of one index: a started primary on node_0 and started
/// replicas on node_1.., all in sync, index blocked for closing
pub struct ShardSetup {
    pub shard_id: ShardId,
    pub block: ClusterBlock,
    pub primary: ShardRouting,
    pub replicas: Vec<ShardRouting>,
}

impl ShardSetup {
    pub fn new(replicas: usize) -> Self {
        let shard_id = ShardId::new("test", "_na_", 0);
        let primary = copy(&shard_id, "p", "node_0", true, ShardRoutingState::Started);
        let replicas = (1..=replicas)
            .map(|i| {
                copy(
                    &shard_id,
                    &format!("r{}", i),
                    &format!("node_{}", i),
                    false,
                    ShardRoutingState::Started,
                )
            })
            .collect();
        Self {
            shard_id,
            block: ClusterBlock::index_closing(),
            primary,
            replicas,
        }
    }

    pub fn all_copies(&self) -> Vec<ShardRouting> {
        std::iter::once(self.primary.clone())
            .chain(self.replicas.iter().cloned())
            .collect()
    }

    pub fn all_allocation_ids(&self) -> Vec<AllocationId> {
        self.all_copies()
            .iter()
            .map(|copy| copy.allocation_id().clone())
            .collect()
    }

    /// Blocked state where every copy is routed and in sync
    pub fn state(&self) -> ClusterState {
        self.state_with(self.all_copies(), self.all_allocation_ids(), true)
    }

    pub fn state_with(&self, routings: Vec<ShardRouting>, in_sync: Vec<AllocationId>, blocked: bool) -> ClusterState {
        let table = IndexShardRoutingTable::new(self.shard_id.clone(), routings).unwrap();
        let mut builder = ClusterStateBuilder::new(NodeId::new("node_0"))
            .master_node(NodeId::new("master"))
            .add_index(IndexMetadata::new("test", "_na_").with_shard(0, PRIMARY_TERM, in_sync))
            .add_routing_table(table);
        if blocked {
            builder = builder.add_index_block("test", self.block.clone());
        }
        builder.build()
    }

    pub fn request(&self) -> ShardRequest {
        ShardRequest::new(
            self.shard_id.clone(),
            self.block.clone(),
            TaskId::new(NodeId::new("node_0"), 42),
        )
    }
}

pub fn copy(shard_id: &ShardId, aid: &str, node: &str, primary: bool, state: ShardRoutingState) -> ShardRouting {
    ShardRouting::new(
        shard_id.clone(),
        AllocationId::new(aid),
        NodeId::new(node),
        primary,
        state,
    )
}

/// Action wired to `transport` for both replica requests and shard
/// failure reports
pub fn action(state: ClusterState, transport: Arc<CapturingTransport>) -> Arc<VerifyShardBeforeCloseAction> {
    action_with_config(state, transport, ReplicationConfig::default())
}

pub fn action_with_config(
    state: ClusterState,
    transport: Arc<CapturingTransport>,
    config: ReplicationConfig,
) -> Arc<VerifyShardBeforeCloseAction> {
    let cluster = Arc::new(ClusterService::new(state));
    let shard_state = Arc::new(ShardStateAction::new(
        cluster.clone(),
        transport.clone(),
        config.shard_failed_timeout(),
    ));
    Arc::new(VerifyShardBeforeCloseAction::new(cluster, transport, shard_state, config).unwrap())
}
