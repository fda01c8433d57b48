//! Cluster state snapshots
//!
//! A `ClusterState` is immutable once built. The `ClusterService` swaps the
//! whole snapshot atomically; readers hold an `Arc` to the version they
//! started with and never observe a partially applied update.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use super::block::{ClusterBlock, ClusterBlocks};
use super::errors::{ClusterError, ClusterResult};
use super::group::ReplicationGroup;
use super::ids::{AllocationId, NodeId, ShardId};
use super::routing::IndexShardRoutingTable;

/// Per-index metadata relevant to replication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    name: String,
    uuid: String,
    primary_terms: BTreeMap<u32, u64>,
    in_sync_allocation_ids: BTreeMap<u32, BTreeSet<AllocationId>>,
}

impl IndexMetadata {
    pub fn new(name: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid.into(),
            primary_terms: BTreeMap::new(),
            in_sync_allocation_ids: BTreeMap::new(),
        }
    }

    /// Register a shard with its primary term and in-sync copies.
    pub fn with_shard(
        mut self,
        shard: u32,
        primary_term: u64,
        in_sync: impl IntoIterator<Item = AllocationId>,
    ) -> Self {
        self.primary_terms.insert(shard, primary_term);
        self.in_sync_allocation_ids
            .insert(shard, in_sync.into_iter().collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn number_of_shards(&self) -> usize {
        self.primary_terms.len()
    }

    pub fn primary_term(&self, shard: u32) -> Option<u64> {
        self.primary_terms.get(&shard).copied()
    }

    pub fn in_sync_allocation_ids(&self, shard: u32) -> Option<&BTreeSet<AllocationId>> {
        self.in_sync_allocation_ids.get(&shard)
    }
}

/// Immutable view of the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterState {
    version: u64,
    local_node: NodeId,
    master_node: Option<NodeId>,
    blocks: ClusterBlocks,
    indices: BTreeMap<String, IndexMetadata>,
    routing: BTreeMap<ShardId, IndexShardRoutingTable>,
}

impl ClusterState {
    /// Empty state: no indices, no blocks, no master
    pub fn empty(local_node: NodeId) -> Self {
        ClusterStateBuilder::new(local_node).build()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn local_node(&self) -> &NodeId {
        &self.local_node
    }

    pub fn master_node(&self) -> Option<&NodeId> {
        self.master_node.as_ref()
    }

    pub fn blocks(&self) -> &ClusterBlocks {
        &self.blocks
    }

    pub fn index(&self, name: &str) -> ClusterResult<&IndexMetadata> {
        self.indices
            .get(name)
            .ok_or_else(|| ClusterError::IndexNotFound(name.to_string()))
    }

    pub fn routing_table(&self, shard_id: &ShardId) -> ClusterResult<&IndexShardRoutingTable> {
        self.routing
            .get(shard_id)
            .ok_or_else(|| ClusterError::ShardNotFound(shard_id.to_string()))
    }

    pub fn primary_term(&self, shard_id: &ShardId) -> ClusterResult<u64> {
        self.index(shard_id.index_name())?
            .primary_term(shard_id.id())
            .ok_or_else(|| ClusterError::ShardNotFound(shard_id.to_string()))
    }

    /// Replication group of a shard as recorded in this snapshot.
    ///
    /// Tracked copies are every routed copy plus every in-sync copy, so a
    /// copy that vanished from routing stays tracked until the master
    /// removes it from the in-sync set.
    pub fn replication_group(&self, shard_id: &ShardId) -> ClusterResult<ReplicationGroup> {
        let metadata = self.index(shard_id.index_name())?;
        let routing_table = self.routing_table(shard_id)?;
        let in_sync = metadata
            .in_sync_allocation_ids(shard_id.id())
            .cloned()
            .unwrap_or_default();

        let mut tracked: BTreeSet<AllocationId> = routing_table.all_allocation_ids().cloned().collect();
        tracked.extend(in_sync.iter().cloned());

        ReplicationGroup::new(routing_table.clone(), in_sync, tracked)
    }
}

/// Builder for `ClusterState`
#[derive(Debug, Clone)]
pub struct ClusterStateBuilder {
    state: ClusterState,
}

impl ClusterStateBuilder {
    pub fn new(local_node: NodeId) -> Self {
        Self {
            state: ClusterState {
                version: 0,
                local_node,
                master_node: None,
                blocks: ClusterBlocks::new(),
                indices: BTreeMap::new(),
                routing: BTreeMap::new(),
            },
        }
    }

    /// Start from an existing state with its version bumped
    pub fn from_state(state: &ClusterState) -> Self {
        let mut state = state.clone();
        state.version += 1;
        Self { state }
    }

    pub fn version(mut self, version: u64) -> Self {
        self.state.version = version;
        self
    }

    pub fn master_node(mut self, node: NodeId) -> Self {
        self.state.master_node = Some(node);
        self
    }

    pub fn add_index(mut self, metadata: IndexMetadata) -> Self {
        self.state.indices.insert(metadata.name().to_string(), metadata);
        self
    }

    pub fn add_routing_table(mut self, table: IndexShardRoutingTable) -> Self {
        self.state.routing.insert(table.shard_id().clone(), table);
        self
    }

    pub fn add_index_block(mut self, index: impl Into<String>, block: ClusterBlock) -> Self {
        self.state.blocks.add_index_block(index, block);
        self
    }

    pub fn blocks(mut self, blocks: ClusterBlocks) -> Self {
        self.state.blocks = blocks;
        self
    }

    pub fn build(self) -> ClusterState {
        self.state
    }
}

/// Read-only access to the current cluster state.
///
/// Each call returns a point-in-time view; callers that need several reads
/// to agree should take one `state()` snapshot and read from it.
pub trait ClusterStateReader: Send + Sync {
    fn state(&self) -> Arc<ClusterState>;

    fn current_blocks_for(&self, index: &str) -> Vec<ClusterBlock> {
        self.state().blocks().blocks_for(index).to_vec()
    }

    fn current_routing_group(&self, shard_id: &ShardId) -> ClusterResult<ReplicationGroup> {
        self.state().replication_group(shard_id)
    }
}

/// Holder of the latest applied cluster state
#[derive(Debug)]
pub struct ClusterService {
    current: RwLock<Arc<ClusterState>>,
}

impl ClusterService {
    pub fn new(initial: ClusterState) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Replace the current state
    pub fn set_state(&self, state: ClusterState) {
        let mut current = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = Arc::new(state);
    }

    pub fn local_node(&self) -> NodeId {
        self.state().local_node().clone()
    }
}

impl ClusterStateReader for ClusterService {
    fn state(&self) -> Arc<ClusterState> {
        let current = match self.current.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(&current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ShardRouting, ShardRoutingState};

    fn sample_state(block: &ClusterBlock) -> ClusterState {
        let shard_id = ShardId::new("test", "_na_", 0);
        let primary = ShardRouting::new(
            shard_id.clone(),
            AllocationId::new("p"),
            NodeId::new("node_0"),
            true,
            ShardRoutingState::Started,
        );
        let replica = ShardRouting::new(
            shard_id.clone(),
            AllocationId::new("r1"),
            NodeId::new("node_1"),
            false,
            ShardRoutingState::Started,
        );
        let table = IndexShardRoutingTable::new(shard_id.clone(), vec![primary, replica.clone()]).unwrap();
        let table = table.without(replica.allocation_id());

        ClusterStateBuilder::new(NodeId::new("node_0"))
            .master_node(NodeId::new("master"))
            .add_index(IndexMetadata::new("test", "_na_").with_shard(
                0,
                3,
                [AllocationId::new("p"), AllocationId::new("r1")],
            ))
            .add_routing_table(table)
            .add_index_block("test", block.clone())
            .build()
    }

    #[test]
    fn test_replication_group_tracks_in_sync_copies() {
        let state = sample_state(&ClusterBlock::index_closing());
        let group = state.replication_group(&ShardId::new("test", "_na_", 0)).unwrap();

        assert!(group.tracked_allocation_ids().contains(&AllocationId::new("r1")));
        assert_eq!(group.unavailable_in_sync_shards().len(), 1);
    }

    #[test]
    fn test_primary_term_lookup() {
        let state = sample_state(&ClusterBlock::index_closing());
        assert_eq!(state.primary_term(&ShardId::new("test", "_na_", 0)).unwrap(), 3);
        assert!(state.primary_term(&ShardId::new("test", "_na_", 1)).is_err());
        assert!(matches!(
            state.primary_term(&ShardId::new("missing", "_na_", 0)),
            Err(ClusterError::IndexNotFound(_))
        ));
    }

    #[test]
    fn test_service_swaps_snapshots() {
        let block = ClusterBlock::index_closing();
        let service = ClusterService::new(sample_state(&block));

        let before = service.state();
        assert_eq!(service.current_blocks_for("test"), vec![block.clone()]);

        service.set_state(ClusterState::empty(NodeId::new("node_0")));
        assert!(service.current_blocks_for("test").is_empty());

        // old snapshot is untouched
        assert!(before.blocks().has_index_block("test", &block));
    }

    #[test]
    fn test_from_state_bumps_version() {
        let state = sample_state(&ClusterBlock::index_closing());
        let next = ClusterStateBuilder::from_state(&state).build();
        assert_eq!(next.version(), state.version() + 1);
    }
}
