//! Storage handle contract

use serde::{Deserialize, Serialize};

use super::errors::ShardResult;
use crate::cluster::{AllocationId, ShardId, ShardRouting};

/// Parameters of a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushRequest {
    force: bool,
    wait_if_ongoing: bool,
}

impl FlushRequest {
    pub fn new() -> Self {
        Self {
            force: false,
            wait_if_ongoing: true,
        }
    }

    /// Flush even if the engine reports nothing to flush
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn wait_if_ongoing(mut self, wait: bool) -> Self {
        self.wait_if_ongoing = wait;
        self
    }

    pub fn is_force(&self) -> bool {
        self.force
    }

    pub fn is_wait_if_ongoing(&self) -> bool {
        self.wait_if_ongoing
    }
}

impl Default for FlushRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Durable commit point produced by a flush
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitId {
    pub generation: u64,
}

/// A local shard copy.
///
/// The operation counter is owned by the storage layer; the close
/// protocol only reads it.
pub trait IndexShard: Send + Sync {
    fn shard_id(&self) -> &ShardId;

    fn routing_entry(&self) -> ShardRouting;

    /// Number of write operations currently holding a permit on the shard
    fn active_operations_count(&self) -> usize;

    /// Engine consistency check run before a shard may be closed
    fn verify_shard_before_index_closing(&self) -> ShardResult<()>;

    /// Flush and wait until the commit is durable
    fn flush(&self, request: FlushRequest) -> ShardResult<CommitId>;

    /// Fail the local copy. Idempotent.
    fn fail_shard(&self, reason: &str, cause: &str);

    fn local_checkpoint(&self) -> i64;

    fn global_checkpoint(&self) -> i64;

    fn max_seq_no_of_updates_or_deletes(&self) -> i64;

    /// Record the local checkpoint a replica reported
    fn update_local_checkpoint_for_shard(&self, allocation_id: &AllocationId, checkpoint: i64);

    /// Record the global checkpoint a replica reported
    fn update_global_checkpoint_for_shard(&self, allocation_id: &AllocationId, checkpoint: i64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_request_defaults() {
        let request = FlushRequest::new();
        assert!(!request.is_force());
        assert!(request.is_wait_if_ongoing());

        let forced = request.force(true);
        assert!(forced.is_force());
    }
}
