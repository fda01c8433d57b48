//! Replication wire messages and outcome model

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{ReplicationError, ReplicationErrorKind, ReplicationResult};
use crate::cluster::{AllocationId, NodeId, ShardId};

/// Sequence number placeholder for envelopes that carry no checkpoint,
/// such as a delivery to the primary
pub const UNASSIGNED_SEQ_NO: i64 = -2;

/// Request as delivered to one specific shard copy.
///
/// The inner request is replayed verbatim; the envelope only adds
/// addressing and the primary's view of the checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcreteShardRequest<R> {
    pub request: R,
    pub target_allocation_id: AllocationId,
    pub primary_term: u64,
    pub global_checkpoint: i64,
    pub max_seq_no_of_updates_or_deletes: i64,
}

/// Replica acknowledgement.
///
/// Verification does not advance sequence numbers, so both checkpoints
/// are reported as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaResponse {
    pub local_checkpoint: i64,
    pub global_checkpoint: i64,
}

impl ReplicaResponse {
    pub fn new(local_checkpoint: i64, global_checkpoint: i64) -> Self {
        Self {
            local_checkpoint,
            global_checkpoint,
        }
    }

    /// Acknowledgement carrying no checkpoint progress
    pub fn unused() -> Self {
        Self::new(0, 0)
    }
}

/// Failure of one copy, as recorded in ShardInfo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardFailure {
    pub shard_id: ShardId,
    pub allocation_id: AllocationId,
    pub node_id: NodeId,
    pub primary: bool,
    pub kind: ReplicationErrorKind,
    pub reason: String,
}

impl ShardFailure {
    pub fn new(
        shard_id: ShardId,
        allocation_id: AllocationId,
        node_id: NodeId,
        primary: bool,
        cause: &ReplicationError,
    ) -> Self {
        Self {
            shard_id,
            allocation_id,
            node_id,
            primary,
            kind: cause.kind(),
            reason: cause.to_string(),
        }
    }
}

impl fmt::Display for ShardFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on node [{}] (allocation [{}]): {}",
            self.shard_id, self.node_id, self.allocation_id, self.reason
        )
    }
}

/// Aggregated outcome of one replication operation.
///
/// `failed` always equals the number of failure records, and
/// `successful + failed <= total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    total: usize,
    successful: usize,
    failures: Vec<ShardFailure>,
}

impl ShardInfo {
    pub fn new(total: usize, successful: usize, failures: Vec<ShardFailure>) -> ReplicationResult<Self> {
        if successful + failures.len() > total {
            return Err(ReplicationError::internal(format!(
                "shard info accounts for {} copies but only {} were attempted",
                successful + failures.len(),
                total
            )));
        }
        Ok(Self {
            total,
            successful,
            failures,
        })
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn successful(&self) -> usize {
        self.successful
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[ShardFailure] {
        &self.failures
    }
}

impl fmt::Display for ShardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ShardInfo{{total={}, successful={}, failed={}}}",
            self.total,
            self.successful,
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> ShardFailure {
        ShardFailure::new(
            ShardId::new("test", "_na_", 0),
            AllocationId::new("r1"),
            NodeId::new("node_1"),
            false,
            &ReplicationError::Flush("disk".into()),
        )
    }

    #[test]
    fn test_failed_tracks_failures() {
        let info = ShardInfo::new(3, 1, vec![failure()]).unwrap();
        assert_eq!(info.failed(), 1);
        assert_eq!(info.failures()[0].kind, ReplicationErrorKind::Flush);
    }

    #[test]
    fn test_rejects_overcounting() {
        assert!(ShardInfo::new(1, 1, vec![failure()]).is_err());
        assert!(ShardInfo::new(2, 3, Vec::new()).is_err());
    }

    #[test]
    fn test_replica_response_wire_shape() {
        let json = serde_json::to_value(ReplicaResponse::unused()).unwrap();
        assert_eq!(json, serde_json::json!({"local_checkpoint": 0, "global_checkpoint": 0}));
    }

    #[test]
    fn test_failure_display_names_copy() {
        let text = failure().to_string();
        assert!(text.contains("[test][0]"));
        assert!(text.contains("node_1"));
        assert!(text.contains("r1"));
    }
}
