//! Verify shard before close action
//!
//! Entry points of the verify-before-close step for one shard:
//! - `send_to_primary` routes it from any node to the node holding the primary
//! - `handle_primary_request` and `execute` run it across the replication
//!   group from the primary node
//! - `handle_replica_request` serves the replica half on a replica node
//!
//! Deliveries to either copy are rejected when they target another
//! allocation or carry a primary term older than the receiver's.
//!
//! Primary and replica run the same checks, in order, and stop at the
//! first failure:
//! 1. no operation holds a permit on the shard
//! 2. the index carries the exact block named in the request
//! 3. the engine consistency check passes
//! 4. a forced flush completes

use std::sync::Arc;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;

use super::primary::PrimaryShardReference;
use super::proxy::ReplicasProxy;
use super::request::ShardRequest;
use crate::cluster::{ClusterStateReader, ShardRouting, ShardRoutingState};
use crate::observability::{log_event, Event, MetricsRegistry};
use crate::replication::{
    ConcreteShardRequest, PrimaryResult, ReplicaResponse, ReplicationConfig, ReplicationError,
    ReplicationErrorKind, ReplicationOperation, ReplicationRequest, ReplicationResult, Replicas, ShardInfo,
    UNASSIGNED_SEQ_NO,
};
use crate::shard::{FlushRequest, IndexShard};
use crate::shard_state::ShardStateReporter;
use crate::transport::{decode, encode, Transport, TransportError, TransportResult};

/// Wire name of the action
pub const NAME: &str = "indices:admin/close[s]";

/// Action name for delivery to the primary copy
pub const PRIMARY_ACTION_NAME: &str = "indices:admin/close[s][p]";

/// Action name for delivery to replica copies
pub const REPLICA_ACTION_NAME: &str = "indices:admin/close[s][r]";

/// Verifies shard copies before their index is closed
pub struct VerifyShardBeforeCloseAction {
    cluster: Arc<dyn ClusterStateReader>,
    transport: Arc<dyn Transport>,
    shard_state: Arc<dyn ShardStateReporter>,
    config: ReplicationConfig,
    metrics: Arc<MetricsRegistry>,
}

impl VerifyShardBeforeCloseAction {
    pub fn new(
        cluster: Arc<dyn ClusterStateReader>,
        transport: Arc<dyn Transport>,
        shard_state: Arc<dyn ShardStateReporter>,
        config: ReplicationConfig,
    ) -> ReplicationResult<Self> {
        config.validate()?;
        Ok(Self {
            cluster,
            transport,
            shard_state,
            config,
            metrics: Arc::new(MetricsRegistry::new()),
        })
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn shard_state(&self) -> &Arc<dyn ShardStateReporter> {
        &self.shard_state
    }

    /// Run the checks on the primary copy
    pub fn shard_operation_on_primary(
        &self,
        request: &ShardRequest,
        shard: &dyn IndexShard,
    ) -> ReplicationResult<PrimaryResult<ShardRequest>> {
        self.execute_shard_operation(request, shard)?;
        Ok(PrimaryResult::new(request.clone()))
    }

    /// Run the checks on a replica copy
    pub fn shard_operation_on_replica(
        &self,
        request: &ShardRequest,
        shard: &dyn IndexShard,
    ) -> ReplicationResult<ReplicaResponse> {
        self.execute_shard_operation(request, shard)?;
        Ok(ReplicaResponse::unused())
    }

    fn execute_shard_operation(&self, request: &ShardRequest, shard: &dyn IndexShard) -> ReplicationResult<()> {
        let shard_id = shard.shard_id();
        let routing = shard.routing_entry();
        let shard_name = shard_id.to_string();
        self.metrics.increment_shard_verifications();
        log_event(
            Event::VerifyShardBegin,
            &[
                ("shard", &shard_name),
                ("allocation_id", routing.allocation_id().as_str()),
                ("primary", if routing.primary() { "true" } else { "false" }),
            ],
        );

        if shard.active_operations_count() != 0 {
            return Err(self.rejected(
                &shard_name,
                ReplicationError::precondition(format!(
                    "On-going operations in progress while checking index shard {} before closing",
                    shard_id
                )),
            ));
        }

        // live read: a block removed since the operation started must fail the check
        let blocks = self.cluster.current_blocks_for(shard_id.index_name());
        if !blocks.contains(request.cluster_block()) {
            return Err(self.rejected(
                &shard_name,
                ReplicationError::precondition(format!(
                    "Index shard {} must be blocked by {} before closing",
                    shard_id,
                    request.cluster_block()
                )),
            ));
        }

        shard
            .verify_shard_before_index_closing()
            .map_err(|e| self.rejected(&shard_name, e.into()))?;

        let commit = shard
            .flush(FlushRequest::new().force(true))
            .map_err(|e| self.rejected(&shard_name, e.into()))?;
        self.metrics.increment_forced_flushes();
        log_event(
            Event::ShardFlushForced,
            &[("shard", &shard_name), ("generation", &commit.generation.to_string())],
        );

        log_event(
            Event::VerifyShardComplete,
            &[("shard", &shard_name), ("allocation_id", routing.allocation_id().as_str())],
        );
        Ok(())
    }

    fn rejected(&self, shard: &str, cause: ReplicationError) -> ReplicationError {
        self.metrics.increment_shard_verifications_rejected();
        log_event(
            Event::VerifyShardRejected,
            &[("shard", shard), ("kind", cause.kind().as_str()), ("reason", &cause.to_string())],
        );
        cause
    }

    /// Replicas view sending requests over the transport, reporting
    /// failed copies under `primary_term`
    pub fn new_replicas_proxy(&self, primary_term: u64) -> ReplicasProxy {
        ReplicasProxy::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.shard_state),
            primary_term,
            self.config.replica_timeout(),
        )
    }

    fn check_delivery(
        &self,
        envelope: &ConcreteShardRequest<ShardRequest>,
        shard: &dyn IndexShard,
    ) -> ReplicationResult<()> {
        let routing = shard.routing_entry();
        if routing.allocation_id() != &envelope.target_allocation_id {
            return Err(ReplicationError::ShardNotFound(format!(
                "{} has allocation [{}], request targets [{}]",
                routing.shard_id(),
                routing.allocation_id(),
                envelope.target_allocation_id
            )));
        }

        let current_term = self.cluster.state().primary_term(routing.shard_id())?;
        if envelope.primary_term < current_term {
            return Err(ReplicationError::NoLongerPrimary {
                term: envelope.primary_term,
                reason: format!(
                    "operation primary term [{}] is too old (current [{}])",
                    envelope.primary_term, current_term
                ),
            });
        }
        Ok(())
    }

    /// Serve a replica delivery for the local copy `shard`.
    ///
    /// Returns the encoded `ReplicaResponse`, or the failure as a remote
    /// transport error.
    pub async fn handle_replica_request(
        self: Arc<Self>,
        payload: Vec<u8>,
        shard: Arc<dyn IndexShard>,
    ) -> TransportResult<Vec<u8>> {
        let envelope: ConcreteShardRequest<ShardRequest> = decode(&payload)?;
        self.check_delivery(&envelope, shard.as_ref())
            .map_err(|e| e.to_remote())?;

        let response = tokio::task::spawn_blocking(move || {
            self.shard_operation_on_replica(&envelope.request, shard.as_ref())
        })
        .await
        .map_err(|e| ReplicationError::internal(format!("replica operation aborted: {}", e)).to_remote())?
        .map_err(|e| e.to_remote())?;

        encode(&response)
    }

    /// Serve a primary delivery for the local primary copy: run the whole
    /// operation and return the encoded `ShardInfo`
    pub async fn handle_primary_request(
        self: Arc<Self>,
        payload: Vec<u8>,
        primary: Arc<dyn IndexShard>,
    ) -> TransportResult<Vec<u8>> {
        let envelope: ConcreteShardRequest<ShardRequest> = decode(&payload)?;
        self.check_delivery(&envelope, primary.as_ref())
            .map_err(|e| e.to_remote())?;

        let info = self
            .execute(envelope.request, primary)
            .await
            .map_err(|e| e.to_remote())?;
        encode(&info)
    }

    /// Send `request` to the node holding the primary copy and wait for the
    /// operation's ShardInfo.
    ///
    /// The request leaves before the returned future is first polled.
    pub fn send_to_primary(&self, request: ShardRequest) -> BoxFuture<'static, ReplicationResult<ShardInfo>> {
        let state = self.cluster.state();
        let target = state.routing_table(request.shard_id()).map(|table| table.primary_shard().cloned());
        let primary = match target {
            Ok(Some(primary)) if primary.state() != ShardRoutingState::Initializing => primary,
            Ok(_) => {
                let cause = ReplicationError::ShardNotFound(format!("no active primary for {}", request.shard_id()));
                return future::ready(Err(cause)).boxed();
            }
            Err(e) => return future::ready(Err(e.into())).boxed(),
        };
        let primary_term = match state.primary_term(request.shard_id()) {
            Ok(term) => term,
            Err(e) => return future::ready(Err(e.into())).boxed(),
        };

        let envelope = ConcreteShardRequest {
            request,
            target_allocation_id: primary.allocation_id().clone(),
            primary_term,
            global_checkpoint: UNASSIGNED_SEQ_NO,
            max_seq_no_of_updates_or_deletes: UNASSIGNED_SEQ_NO,
        };
        let payload = match encode(&envelope) {
            Ok(payload) => payload,
            Err(e) => return future::ready(Err(ReplicationError::Codec(e.to_string()))).boxed(),
        };

        let response = self
            .transport
            .send_request(primary.node_id(), PRIMARY_ACTION_NAME, payload);
        let timeout = self.config.primary_timeout();

        async move {
            let outcome = match tokio::time::timeout(timeout, response).await {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::Timeout {
                    action: PRIMARY_ACTION_NAME.to_string(),
                    node: primary.node_id().clone(),
                    millis: timeout.as_millis() as u64,
                }),
            };
            let bytes = outcome.map_err(|e| primary_error(&primary, e))?;
            decode::<ShardInfo>(&bytes).map_err(|e| ReplicationError::Codec(e.to_string()))
        }
        .boxed()
    }

    /// Verify `request` on `primary` and every replica, over the transport
    pub async fn execute(
        self: &Arc<Self>,
        request: ShardRequest,
        primary: Arc<dyn IndexShard>,
    ) -> ReplicationResult<ShardInfo> {
        let primary_term = self.cluster.state().primary_term(request.shard_id())?;
        let replicas = Arc::new(self.new_replicas_proxy(primary_term));
        self.execute_with(request, primary, replicas).await
    }

    /// Verify `request` on `primary` and every replica reachable through
    /// `replicas`
    pub async fn execute_with<Rep>(
        self: &Arc<Self>,
        request: ShardRequest,
        primary: Arc<dyn IndexShard>,
        replicas: Arc<Rep>,
    ) -> ReplicationResult<ShardInfo>
    where
        Rep: Replicas<ShardRequest> + 'static,
    {
        // one snapshot for the whole operation
        let state = self.cluster.state();
        let group = state.replication_group(request.shard_id())?;
        let reference = PrimaryShardReference::new(Arc::clone(self), primary, group)?;

        let result = ReplicationOperation::new(request, Arc::new(reference), replicas, NAME)
            .with_metrics(Arc::clone(&self.metrics))
            .execute()
            .await?;
        Ok(result.shard_info()?.clone())
    }
}

/// Map a failed primary delivery back to the error the primary raised
fn primary_error(primary: &ShardRouting, error: TransportError) -> ReplicationError {
    match error {
        TransportError::Remote { kind, message } => {
            if kind == ReplicationErrorKind::PreconditionViolation.as_str() {
                ReplicationError::PreconditionViolation(message)
            } else if kind == ReplicationErrorKind::StorageInconsistency.as_str() {
                ReplicationError::StorageInconsistency(message)
            } else if kind == ReplicationErrorKind::ShardNotFound.as_str() {
                ReplicationError::ShardNotFound(message)
            } else {
                ReplicationError::CopyFailure(message)
            }
        }
        TransportError::Codec(message) => ReplicationError::Codec(message),
        unreachable => ReplicationError::Unreachable {
            node: primary.node_id().clone(),
            allocation_id: primary.allocation_id().clone(),
            reason: unreachable.to_string(),
        },
    }
}
