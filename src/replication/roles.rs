//! Primary and replica role contracts
//!
//! The coordinator only talks to these traits. Production implementations
//! sit on a local shard and a transport; tests plug in doubles.

use futures_util::future::BoxFuture;

use super::errors::{ReplicationError, ReplicationResult};
use super::request::{PrimaryResult, ReplicationRequest};
use super::response::ReplicaResponse;
use crate::cluster::{AllocationId, ReplicationGroup, ShardId, ShardRouting};

/// The primary copy of the shard being replicated
pub trait Primary<R: ReplicationRequest>: Send + Sync {
    /// Routing entry of the primary copy
    fn routing_entry(&self) -> &ShardRouting;

    /// Replication group snapshot the operation runs against
    fn replication_group(&self) -> &ReplicationGroup;

    /// Run the operation on the primary copy
    fn perform(&self, request: R) -> BoxFuture<'_, ReplicationResult<PrimaryResult<R>>>;

    /// Fail the primary copy locally
    fn fail_shard(&self, message: &str, cause: &ReplicationError);

    fn update_local_checkpoint_for_shard(&self, allocation_id: &AllocationId, checkpoint: i64);

    fn update_global_checkpoint_for_shard(&self, allocation_id: &AllocationId, checkpoint: i64);

    fn local_checkpoint(&self) -> i64;

    fn global_checkpoint(&self) -> i64;

    fn max_seq_no_of_updates_or_deletes(&self) -> i64;
}

/// Access to the replica copies of the shard.
///
/// Every returned future is `'static` so the coordinator can spawn it, and
/// must resolve: success, remote failure, or timeout/disconnect.
pub trait Replicas<R: ReplicationRequest>: Send + Sync {
    /// Send the request to one replica copy
    fn perform_on(
        &self,
        replica: &ShardRouting,
        request: R,
        global_checkpoint: i64,
        max_seq_no_of_updates_or_deletes: i64,
    ) -> BoxFuture<'static, ReplicationResult<ReplicaResponse>>;

    /// Report a copy that failed the request so it leaves the in-sync set
    fn fail_shard_if_needed(
        &self,
        replica: &ShardRouting,
        message: String,
        cause: ReplicationError,
    ) -> BoxFuture<'static, ReplicationResult<()>>;

    /// Report an in-sync copy that could not be sent the request at all
    fn mark_shard_copy_as_stale_if_needed(
        &self,
        shard_id: &ShardId,
        allocation_id: &AllocationId,
    ) -> BoxFuture<'static, ReplicationResult<()>>;
}
