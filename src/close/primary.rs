//! Primary shard reference
//!
//! `Primary` implementation over a local shard copy. The shard work runs
//! on a blocking worker; flush waits on disk.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::action::VerifyShardBeforeCloseAction;
use super::request::ShardRequest;
use crate::cluster::{AllocationId, ReplicationGroup, ShardRouting};
use crate::replication::{Primary, PrimaryResult, ReplicationError, ReplicationResult};
use crate::shard::IndexShard;

/// The local primary copy, bound to the replication group snapshot the
/// operation runs against
pub struct PrimaryShardReference {
    action: Arc<VerifyShardBeforeCloseAction>,
    shard: Arc<dyn IndexShard>,
    routing: ShardRouting,
    group: ReplicationGroup,
}

impl PrimaryShardReference {
    /// Fails if `shard` is not the primary copy named by `group`
    pub fn new(
        action: Arc<VerifyShardBeforeCloseAction>,
        shard: Arc<dyn IndexShard>,
        group: ReplicationGroup,
    ) -> ReplicationResult<Self> {
        let routing = shard.routing_entry();
        let expected = group.routing_table().primary_shard();
        if !routing.primary() || expected.map(|p| p.allocation_id()) != Some(routing.allocation_id()) {
            return Err(ReplicationError::ShardNotFound(format!(
                "{} is not the active primary of {}",
                routing,
                routing.shard_id()
            )));
        }
        Ok(Self {
            action,
            shard,
            routing,
            group,
        })
    }
}

impl Primary<ShardRequest> for PrimaryShardReference {
    fn routing_entry(&self) -> &ShardRouting {
        &self.routing
    }

    fn replication_group(&self) -> &ReplicationGroup {
        &self.group
    }

    fn perform(&self, request: ShardRequest) -> BoxFuture<'_, ReplicationResult<PrimaryResult<ShardRequest>>> {
        let action = Arc::clone(&self.action);
        let shard = Arc::clone(&self.shard);
        async move {
            tokio::task::spawn_blocking(move || action.shard_operation_on_primary(&request, shard.as_ref()))
                .await
                .map_err(|e| ReplicationError::internal(format!("primary operation aborted: {}", e)))?
        }
        .boxed()
    }

    fn fail_shard(&self, message: &str, cause: &ReplicationError) {
        self.shard.fail_shard(message, &cause.to_string());
    }

    fn update_local_checkpoint_for_shard(&self, allocation_id: &AllocationId, checkpoint: i64) {
        self.shard.update_local_checkpoint_for_shard(allocation_id, checkpoint);
    }

    fn update_global_checkpoint_for_shard(&self, allocation_id: &AllocationId, checkpoint: i64) {
        self.shard.update_global_checkpoint_for_shard(allocation_id, checkpoint);
    }

    fn local_checkpoint(&self) -> i64 {
        self.shard.local_checkpoint()
    }

    fn global_checkpoint(&self) -> i64 {
        self.shard.global_checkpoint()
    }

    fn max_seq_no_of_updates_or_deletes(&self) -> i64 {
        self.shard.max_seq_no_of_updates_or_deletes()
    }
}
