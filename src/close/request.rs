//! Verify-before-close request

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cluster::{ClusterBlock, ShardId, TaskId};
use crate::replication::ReplicationRequest;

/// Request to verify one shard before its index is closed.
///
/// Built once per close attempt and shard, then replayed unchanged on the
/// primary and every replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRequest {
    shard_id: ShardId,
    cluster_block: ClusterBlock,
    parent_task_id: TaskId,
}

impl ShardRequest {
    pub fn new(shard_id: ShardId, cluster_block: ClusterBlock, parent_task_id: TaskId) -> Self {
        Self {
            shard_id,
            cluster_block,
            parent_task_id,
        }
    }

    /// Block the index must carry for the shard to pass verification
    pub fn cluster_block(&self) -> &ClusterBlock {
        &self.cluster_block
    }

    pub fn parent_task_id(&self) -> &TaskId {
        &self.parent_task_id
    }
}

impl ReplicationRequest for ShardRequest {
    fn shard_id(&self) -> &ShardId {
        &self.shard_id
    }
}

impl fmt::Display for ShardRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "verify shard {} before close with block {}", self.shard_id, self.cluster_block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::NodeId;

    #[test]
    fn test_wire_form_keeps_block_identity() {
        let block = ClusterBlock::index_closing();
        let request = ShardRequest::new(
            ShardId::new("logs", "uuid", 2),
            block.clone(),
            TaskId::new(NodeId::new("node_0"), 7),
        );

        let bytes = serde_json::to_vec(&request).unwrap();
        let decoded: ShardRequest = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoded.cluster_block(), &block);
        assert_ne!(decoded.cluster_block(), &ClusterBlock::index_closing());
    }

    #[test]
    fn test_display_names_shard_and_block() {
        let request = ShardRequest::new(
            ShardId::new("logs", "uuid", 2),
            ClusterBlock::index_closing(),
            TaskId::new(NodeId::new("node_0"), 7),
        );
        let text = request.to_string();
        assert!(text.starts_with("verify shard [logs][2] before close with block 4,"));
    }
}
