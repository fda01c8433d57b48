//! Replicas proxy
//!
//! `Replicas` implementation that delivers requests over the transport.
//! Outcomes per copy:
//! - acknowledged: `ReplicaResponse`
//! - remote checks failed, or the reply is unreadable: `CopyFailure`
//! - disconnect or no answer within the timeout: `Unreachable`
//!
//! Failed and stale copies are reported through the shard state reporter
//! under the primary term the proxy was created with.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;

use super::action::REPLICA_ACTION_NAME;
use super::request::ShardRequest;
use crate::cluster::{AllocationId, ShardId, ShardRouting};
use crate::replication::{ConcreteShardRequest, ReplicaResponse, ReplicationError, ReplicationResult, Replicas};
use crate::shard_state::{FailedShardEntry, ShardStateReporter};
use crate::transport::{decode, encode, Transport, TransportError};

pub struct ReplicasProxy {
    transport: Arc<dyn Transport>,
    shard_state: Arc<dyn ShardStateReporter>,
    primary_term: u64,
    timeout: Duration,
}

impl ReplicasProxy {
    pub fn new(
        transport: Arc<dyn Transport>,
        shard_state: Arc<dyn ShardStateReporter>,
        primary_term: u64,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            shard_state,
            primary_term,
            timeout,
        }
    }

    pub fn primary_term(&self) -> u64 {
        self.primary_term
    }
}

/// Map a transport failure of one replica delivery to its copy-level error
fn copy_error(replica: &ShardRouting, error: TransportError) -> ReplicationError {
    match error {
        TransportError::Remote { message, .. } => ReplicationError::CopyFailure(message),
        TransportError::Codec(message) => ReplicationError::Codec(message),
        unreachable => ReplicationError::Unreachable {
            node: replica.node_id().clone(),
            allocation_id: replica.allocation_id().clone(),
            reason: unreachable.to_string(),
        },
    }
}

impl Replicas<ShardRequest> for ReplicasProxy {
    fn perform_on(
        &self,
        replica: &ShardRouting,
        request: ShardRequest,
        global_checkpoint: i64,
        max_seq_no_of_updates_or_deletes: i64,
    ) -> BoxFuture<'static, ReplicationResult<ReplicaResponse>> {
        let envelope = ConcreteShardRequest {
            request,
            target_allocation_id: replica.allocation_id().clone(),
            primary_term: self.primary_term,
            global_checkpoint,
            max_seq_no_of_updates_or_deletes,
        };
        let payload = match encode(&envelope) {
            Ok(payload) => payload,
            Err(e) => return future::ready(Err(ReplicationError::Codec(e.to_string()))).boxed(),
        };

        let response = self
            .transport
            .send_request(replica.node_id(), REPLICA_ACTION_NAME, payload);
        let replica = replica.clone();
        let timeout = self.timeout;

        async move {
            let outcome = match tokio::time::timeout(timeout, response).await {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::Timeout {
                    action: REPLICA_ACTION_NAME.to_string(),
                    node: replica.node_id().clone(),
                    millis: timeout.as_millis() as u64,
                }),
            };
            let bytes = outcome.map_err(|e| copy_error(&replica, e))?;
            decode::<ReplicaResponse>(&bytes)
                .map_err(|e| ReplicationError::CopyFailure(format!("malformed response from {}: {}", replica, e)))
        }
        .boxed()
    }

    fn fail_shard_if_needed(
        &self,
        replica: &ShardRouting,
        message: String,
        cause: ReplicationError,
    ) -> BoxFuture<'static, ReplicationResult<()>> {
        self.shard_state.report_failed_shard(FailedShardEntry::failed(
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
        self.shard_state.report_failed_shard(FailedShardEntry::stale(
            shard_id.clone(),
            allocation_id.clone(),
            self.primary_term,
        ))
    }
}
