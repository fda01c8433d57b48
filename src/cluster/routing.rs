//! Shard routing entries and per-shard routing tables

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{ClusterError, ClusterResult};
use super::ids::{AllocationId, NodeId, ShardId};

/// Lifecycle state of a shard copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardRoutingState {
    /// Copy is recovering and not yet serving
    Initializing,
    /// Copy is serving
    Started,
    /// Copy is serving and being moved to another node
    Relocating,
}

impl ShardRoutingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "INITIALIZING",
            Self::Started => "STARTED",
            Self::Relocating => "RELOCATING",
        }
    }
}

/// Routing entry for one copy of a shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRouting {
    shard_id: ShardId,
    allocation_id: AllocationId,
    node_id: NodeId,
    primary: bool,
    state: ShardRoutingState,
}

impl ShardRouting {
    pub fn new(
        shard_id: ShardId,
        allocation_id: AllocationId,
        node_id: NodeId,
        primary: bool,
        state: ShardRoutingState,
    ) -> Self {
        Self {
            shard_id,
            allocation_id,
            node_id,
            primary,
            state,
        }
    }

    pub fn shard_id(&self) -> &ShardId {
        &self.shard_id
    }

    pub fn allocation_id(&self) -> &AllocationId {
        &self.allocation_id
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn primary(&self) -> bool {
        self.primary
    }

    pub fn state(&self) -> ShardRoutingState {
        self.state
    }

    /// Only started copies may receive verification requests
    pub fn started(&self) -> bool {
        self.state == ShardRoutingState::Started
    }
}

impl fmt::Display for ShardRouting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, node[{}], [{}], s[{}], a[id={}]",
            self.shard_id,
            self.node_id,
            if self.primary { "P" } else { "R" },
            self.state.as_str(),
            self.allocation_id
        )
    }
}

/// All copies of one shard, primary first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexShardRoutingTable {
    shard_id: ShardId,
    shards: Vec<ShardRouting>,
}

impl IndexShardRoutingTable {
    /// Build a routing table.
    ///
    /// Every copy must belong to `shard_id`, allocation ids must be unique,
    /// and at most one copy may be primary.
    pub fn new(shard_id: ShardId, shards: Vec<ShardRouting>) -> ClusterResult<Self> {
        let mut primaries = 0;
        for (i, shard) in shards.iter().enumerate() {
            if shard.shard_id() != &shard_id {
                return Err(ClusterError::InvalidRoutingTable(format!(
                    "copy {} does not belong to shard {}",
                    shard, shard_id
                )));
            }
            if shards[..i]
                .iter()
                .any(|other| other.allocation_id() == shard.allocation_id())
            {
                return Err(ClusterError::InvalidRoutingTable(format!(
                    "duplicate allocation id [{}]",
                    shard.allocation_id()
                )));
            }
            if shard.primary() {
                primaries += 1;
            }
        }
        if primaries > 1 {
            return Err(ClusterError::InvalidRoutingTable(format!(
                "shard {} has {} primaries",
                shard_id, primaries
            )));
        }

        let mut shards = shards;
        shards.sort_by_key(|s| !s.primary());
        Ok(Self { shard_id, shards })
    }

    pub fn shard_id(&self) -> &ShardId {
        &self.shard_id
    }

    pub fn shards(&self) -> &[ShardRouting] {
        &self.shards
    }

    pub fn primary_shard(&self) -> Option<&ShardRouting> {
        self.shards.iter().find(|s| s.primary())
    }

    pub fn replica_shards(&self) -> impl Iterator<Item = &ShardRouting> {
        self.shards.iter().filter(|s| !s.primary())
    }

    pub fn all_allocation_ids(&self) -> impl Iterator<Item = &AllocationId> {
        self.shards.iter().map(ShardRouting::allocation_id)
    }

    pub fn get(&self, allocation_id: &AllocationId) -> Option<&ShardRouting> {
        self.shards.iter().find(|s| s.allocation_id() == allocation_id)
    }

    /// Copy of this table without the given copy.
    ///
    /// Used to model a copy that dropped out of routing while still being
    /// recorded as in-sync.
    pub fn without(&self, allocation_id: &AllocationId) -> Self {
        Self {
            shard_id: self.shard_id.clone(),
            shards: self
                .shards
                .iter()
                .filter(|s| s.allocation_id() != allocation_id)
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copy(shard_id: &ShardId, aid: &str, primary: bool) -> ShardRouting {
        ShardRouting::new(
            shard_id.clone(),
            AllocationId::new(aid),
            NodeId::new(format!("node_{}", aid)),
            primary,
            ShardRoutingState::Started,
        )
    }

    #[test]
    fn test_primary_sorted_first() {
        let shard_id = ShardId::new("test", "_na_", 0);
        let table = IndexShardRoutingTable::new(
            shard_id.clone(),
            vec![copy(&shard_id, "r1", false), copy(&shard_id, "p", true)],
        )
        .unwrap();

        assert_eq!(table.shards()[0].allocation_id().as_str(), "p");
        assert_eq!(table.primary_shard().unwrap().allocation_id().as_str(), "p");
        assert_eq!(table.replica_shards().count(), 1);
    }

    #[test]
    fn test_rejects_two_primaries() {
        let shard_id = ShardId::new("test", "_na_", 0);
        let result = IndexShardRoutingTable::new(
            shard_id.clone(),
            vec![copy(&shard_id, "a", true), copy(&shard_id, "b", true)],
        );
        assert!(matches!(result, Err(ClusterError::InvalidRoutingTable(_))));
    }

    #[test]
    fn test_rejects_duplicate_allocation() {
        let shard_id = ShardId::new("test", "_na_", 0);
        let result = IndexShardRoutingTable::new(
            shard_id.clone(),
            vec![copy(&shard_id, "a", true), copy(&shard_id, "a", false)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_foreign_copy() {
        let shard_id = ShardId::new("test", "_na_", 0);
        let other = ShardId::new("test", "_na_", 1);
        let result = IndexShardRoutingTable::new(shard_id, vec![copy(&other, "a", true)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_without_removes_copy() {
        let shard_id = ShardId::new("test", "_na_", 0);
        let table = IndexShardRoutingTable::new(
            shard_id.clone(),
            vec![copy(&shard_id, "p", true), copy(&shard_id, "r1", false)],
        )
        .unwrap();

        let trimmed = table.without(&AllocationId::new("r1"));
        assert_eq!(trimmed.shards().len(), 1);
        assert!(trimmed.get(&AllocationId::new("r1")).is_none());
        assert_eq!(table.shards().len(), 2);
    }
}
