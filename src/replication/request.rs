//! Request contract and primary result

use std::fmt;

use super::errors::ReplicationResult;
use super::response::ShardInfo;
use super::set_once::SetOnce;
use crate::cluster::ShardId;

/// A request that can be replicated across a shard's copies.
///
/// Requests are immutable once built and cloned unchanged for every copy.
pub trait ReplicationRequest: Clone + fmt::Debug + Send + Sync + 'static {
    fn shard_id(&self) -> &ShardId;
}

/// Outcome of the primary step.
///
/// Holds the request to replay on replicas and the ShardInfo cell the
/// coordinator fills once every replica has answered.
#[derive(Debug)]
pub struct PrimaryResult<R> {
    replica_request: R,
    shard_info: SetOnce<ShardInfo>,
}

impl<R: ReplicationRequest> PrimaryResult<R> {
    pub fn new(replica_request: R) -> Self {
        Self {
            replica_request,
            shard_info: SetOnce::new("shard info"),
        }
    }

    /// Request to send to every replica
    pub fn replica_request(&self) -> &R {
        &self.replica_request
    }

    /// Publish the final ShardInfo. Fails on a second call.
    pub fn set_shard_info(&self, shard_info: ShardInfo) -> ReplicationResult<()> {
        self.shard_info.set(shard_info)
    }

    /// Final ShardInfo. Fails before the coordinator finalized it.
    pub fn shard_info(&self) -> ReplicationResult<&ShardInfo> {
        self.shard_info.get()
    }
}
