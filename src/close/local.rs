//! In-process replicas
//!
//! `Replicas` implementation that runs the replica operation directly on
//! shard copies held in this process. Copies not registered, or marked
//! unreachable, answer as a disconnected node would.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;

use super::action::VerifyShardBeforeCloseAction;
use super::request::ShardRequest;
use crate::cluster::{AllocationId, ShardId, ShardRouting};
use crate::replication::{ReplicaResponse, ReplicationError, ReplicationResult, Replicas};
use crate::shard::IndexShard;
use crate::shard_state::{FailedShardEntry, ShardStateReporter};

pub struct LocalReplicas {
    action: Arc<VerifyShardBeforeCloseAction>,
    primary_term: u64,
    shards: HashMap<AllocationId, Arc<dyn IndexShard>>,
    unreachable: HashSet<AllocationId>,
}

impl LocalReplicas {
    pub fn new(action: Arc<VerifyShardBeforeCloseAction>, primary_term: u64) -> Self {
        Self {
            action,
            primary_term,
            shards: HashMap::new(),
            unreachable: HashSet::new(),
        }
    }

    /// Register a replica copy under its allocation id
    pub fn with_shard(mut self, shard: Arc<dyn IndexShard>) -> Self {
        let allocation_id = shard.routing_entry().allocation_id().clone();
        self.shards.insert(allocation_id, shard);
        self
    }

    /// Make requests to `allocation_id` fail as if its node were down
    pub fn with_unreachable(mut self, allocation_id: AllocationId) -> Self {
        self.unreachable.insert(allocation_id);
        self
    }

    fn shard_state(&self) -> &Arc<dyn ShardStateReporter> {
        self.action.shard_state()
    }
}

impl Replicas<ShardRequest> for LocalReplicas {
    fn perform_on(
        &self,
        replica: &ShardRouting,
        request: ShardRequest,
        _global_checkpoint: i64,
        _max_seq_no_of_updates_or_deletes: i64,
    ) -> BoxFuture<'static, ReplicationResult<ReplicaResponse>> {
        let shard = match self.shards.get(replica.allocation_id()) {
            Some(shard) if !self.unreachable.contains(replica.allocation_id()) => Arc::clone(shard),
            _ => {
                return future::ready(Err(ReplicationError::Unreachable {
                    node: replica.node_id().clone(),
                    allocation_id: replica.allocation_id().clone(),
                    reason: format!("node [{}] disconnected", replica.node_id()),
                }))
                .boxed();
            }
        };

        let action = Arc::clone(&self.action);
        async move {
            tokio::task::spawn_blocking(move || action.shard_operation_on_replica(&request, shard.as_ref()))
                .await
                .map_err(|e| ReplicationError::CopyFailure(format!("replica operation aborted: {}", e)))?
                .map_err(|e| ReplicationError::CopyFailure(e.to_string()))
        }
        .boxed()
    }

    fn fail_shard_if_needed(
        &self,
        replica: &ShardRouting,
        message: String,
        cause: ReplicationError,
    ) -> BoxFuture<'static, ReplicationResult<()>> {
        self.shard_state().report_failed_shard(FailedShardEntry::failed(
            replica.shard_id().clone(),
            replica.allocation_id().clone(),
            self.primary_term,
            message,
            cause.to_string(),
        ))
    }

    fn mark_shard_copy_as_stale_if_needed(
        &self,
        shard_id: &ShardId,
        allocation_id: &AllocationId,
    ) -> BoxFuture<'static, ReplicationResult<()>> {
        self.shard_state().report_failed_shard(FailedShardEntry::stale(
            shard_id.clone(),
            allocation_id.clone(),
            self.primary_term,
        ))
    }
}
