//! Replication group snapshot
//!
//! Invariants:
//! - in-sync ids ⊆ tracked ids
//! - the snapshot is never mutated after construction; demotions are
//!   reported to the master, not applied here

use std::collections::BTreeSet;

use super::errors::{ClusterError, ClusterResult};
use super::ids::AllocationId;
use super::routing::{IndexShardRoutingTable, ShardRouting};

/// Copies of a shard as seen by the primary at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationGroup {
    routing_table: IndexShardRoutingTable,
    in_sync_allocation_ids: BTreeSet<AllocationId>,
    tracked_allocation_ids: BTreeSet<AllocationId>,
    unavailable_in_sync_shards: BTreeSet<AllocationId>,
}

impl ReplicationGroup {
    pub fn new(
        routing_table: IndexShardRoutingTable,
        in_sync_allocation_ids: BTreeSet<AllocationId>,
        tracked_allocation_ids: BTreeSet<AllocationId>,
    ) -> ClusterResult<Self> {
        if let Some(untracked) = in_sync_allocation_ids
            .iter()
            .find(|id| !tracked_allocation_ids.contains(*id))
        {
            return Err(ClusterError::InvalidReplicationGroup(format!(
                "in-sync allocation [{}] of shard {} is not tracked",
                untracked,
                routing_table.shard_id()
            )));
        }

        let reachable: BTreeSet<&AllocationId> = routing_table
            .shards()
            .iter()
            .filter(|s| s.started())
            .map(ShardRouting::allocation_id)
            .collect();
        let unavailable_in_sync_shards = in_sync_allocation_ids
            .iter()
            .filter(|id| !reachable.contains(id))
            .cloned()
            .collect();

        Ok(Self {
            routing_table,
            in_sync_allocation_ids,
            tracked_allocation_ids,
            unavailable_in_sync_shards,
        })
    }

    pub fn routing_table(&self) -> &IndexShardRoutingTable {
        &self.routing_table
    }

    pub fn in_sync_allocation_ids(&self) -> &BTreeSet<AllocationId> {
        &self.in_sync_allocation_ids
    }

    pub fn tracked_allocation_ids(&self) -> &BTreeSet<AllocationId> {
        &self.tracked_allocation_ids
    }

    /// In-sync copies that have no started routing entry.
    ///
    /// No request can be sent to these; they must be marked stale.
    pub fn unavailable_in_sync_shards(&self) -> &BTreeSet<AllocationId> {
        &self.unavailable_in_sync_shards
    }

    /// Started, tracked copies eligible to receive a request, primary included.
    pub fn replication_targets(&self) -> impl Iterator<Item = &ShardRouting> {
        self.routing_table
            .shards()
            .iter()
            .filter(|s| s.started() && self.tracked_allocation_ids.contains(s.allocation_id()))
    }

    /// Whether the copy is in the in-sync set
    pub fn is_in_sync(&self, allocation_id: &AllocationId) -> bool {
        self.in_sync_allocation_ids.contains(allocation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{NodeId, ShardId, ShardRoutingState};

    fn copy(shard_id: &ShardId, aid: &str, primary: bool, state: ShardRoutingState) -> ShardRouting {
        ShardRouting::new(
            shard_id.clone(),
            AllocationId::new(aid),
            NodeId::new(format!("node_{}", aid)),
            primary,
            state,
        )
    }

    fn ids(values: &[&str]) -> BTreeSet<AllocationId> {
        values.iter().map(|v| AllocationId::new(*v)).collect()
    }

    #[test]
    fn test_in_sync_must_be_tracked() {
        let shard_id = ShardId::new("test", "_na_", 0);
        let table = IndexShardRoutingTable::new(
            shard_id.clone(),
            vec![copy(&shard_id, "p", true, ShardRoutingState::Started)],
        )
        .unwrap();

        let result = ReplicationGroup::new(table, ids(&["p", "r1"]), ids(&["p"]));
        assert!(matches!(result, Err(ClusterError::InvalidReplicationGroup(_))));
    }

    #[test]
    fn test_removed_copy_is_unavailable() {
        let shard_id = ShardId::new("test", "_na_", 0);
        let table = IndexShardRoutingTable::new(
            shard_id.clone(),
            vec![
                copy(&shard_id, "p", true, ShardRoutingState::Started),
                copy(&shard_id, "r1", false, ShardRoutingState::Started),
                copy(&shard_id, "r2", false, ShardRoutingState::Started),
            ],
        )
        .unwrap();
        let table = table.without(&AllocationId::new("r2"));

        let group = ReplicationGroup::new(table, ids(&["p", "r1", "r2"]), ids(&["p", "r1", "r2"])).unwrap();

        assert_eq!(group.unavailable_in_sync_shards(), &ids(&["r2"]));
        let targets: Vec<&str> = group
            .replication_targets()
            .map(|s| s.allocation_id().as_str())
            .collect();
        assert_eq!(targets, vec!["p", "r1"]);
    }

    #[test]
    fn test_non_started_in_sync_copy_is_unavailable() {
        let shard_id = ShardId::new("test", "_na_", 0);
        let table = IndexShardRoutingTable::new(
            shard_id.clone(),
            vec![
                copy(&shard_id, "p", true, ShardRoutingState::Started),
                copy(&shard_id, "r1", false, ShardRoutingState::Relocating),
            ],
        )
        .unwrap();

        let group = ReplicationGroup::new(table, ids(&["p", "r1"]), ids(&["p", "r1"])).unwrap();
        assert_eq!(group.unavailable_in_sync_shards(), &ids(&["r1"]));
        assert_eq!(group.replication_targets().count(), 1);
    }

    #[test]
    fn test_tracked_not_in_sync_copy_is_targeted() {
        let shard_id = ShardId::new("test", "_na_", 0);
        let table = IndexShardRoutingTable::new(
            shard_id.clone(),
            vec![
                copy(&shard_id, "p", true, ShardRoutingState::Started),
                copy(&shard_id, "r1", false, ShardRoutingState::Started),
                copy(&shard_id, "r2", false, ShardRoutingState::Started),
            ],
        )
        .unwrap();

        let group = ReplicationGroup::new(table, ids(&["p"]), ids(&["p", "r1"])).unwrap();
        let targets: Vec<&str> = group
            .replication_targets()
            .map(|s| s.allocation_id().as_str())
            .collect();
        assert_eq!(targets, vec!["p", "r1"]);
        assert!(group.unavailable_in_sync_shards().is_empty());
        assert!(!group.is_in_sync(&AllocationId::new("r1")));
    }
}
