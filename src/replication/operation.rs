//! Replication Operation
//!
//! Runs one request across a shard's replication group:
//! 1. perform on the primary; any failure ends the operation
//! 2. mark in-sync copies that have no started routing entry as stale
//! 3. send the request to every started, tracked replica concurrently
//! 4. fold each answer into the tally; copies that failed or could not be
//!    reached are reported for removal from the in-sync set
//! 5. publish ShardInfo once the last dispatched request resolved
//!
//! A replica task that panics counts as a failure of that copy, so the
//! tally always hears from every dispatched request. The copy itself is
//! not demoted for a coordinator-side fault.
//!
//! Quorum: only the primary must succeed. Any subset of replicas may fail
//! or be unreachable; they shrink the success count and get demoted.
//!
//! Stale and failure reports are fire-and-forget. ShardInfo does not wait
//! for the master to acknowledge them.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::oneshot;

use super::errors::{ReplicationError, ReplicationResult};
use super::phase::OperationPhase;
use super::request::{PrimaryResult, ReplicationRequest};
use super::response::ReplicaResponse;
use super::roles::{Primary, Replicas};
use super::tally::ShardTally;
use crate::cluster::{AllocationId, ShardId, ShardRouting};
use crate::observability::{log_event, Event, MetricsRegistry};

/// One replication of `request` across the primary's replication group
pub struct ReplicationOperation<R, P, Rep> {
    request: R,
    primary: Arc<P>,
    replicas: Arc<Rep>,
    op_type: String,
    metrics: Arc<MetricsRegistry>,
}

impl<R, P, Rep> ReplicationOperation<R, P, Rep>
where
    R: ReplicationRequest,
    P: Primary<R> + 'static,
    Rep: Replicas<R> + 'static,
{
    pub fn new(request: R, primary: Arc<P>, replicas: Arc<Rep>, op_type: impl Into<String>) -> Self {
        Self {
            request,
            primary,
            replicas,
            op_type: op_type.into(),
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Count outcomes into a shared registry
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run the operation to completion.
    ///
    /// Resolves with the primary result, ShardInfo published, or with the
    /// primary's failure. Never waits on a replica past its own transport
    /// timeout.
    pub async fn execute(self) -> ReplicationResult<PrimaryResult<R>> {
        let shard = self.request.shard_id().to_string();
        // snapshot: nothing below re-reads the group from the primary
        let group = self.primary.replication_group().clone();
        let primary_routing = self.primary.routing_entry().clone();

        let phase = OperationPhase::Init.begin_primary()?;
        log_event(
            Event::ReplicationPrimaryBegin,
            &[
                ("shard", &shard),
                ("op", &self.op_type),
                ("allocation_id", primary_routing.allocation_id().as_str()),
            ],
        );

        let primary_result = match self.primary.perform(self.request.clone()).await {
            Ok(result) => result,
            Err(cause) => {
                phase.fail()?;
                self.metrics.increment_operations_failed();
                log_event(
                    Event::ReplicationPrimaryFailed,
                    &[("shard", &shard), ("op", &self.op_type), ("reason", &cause.to_string())],
                );
                return Err(cause);
            }
        };
        let phase = phase.begin_replicating()?;
        self.primary.update_local_checkpoint_for_shard(
            primary_routing.allocation_id(),
            self.primary.local_checkpoint(),
        );
        self.primary.update_global_checkpoint_for_shard(
            primary_routing.allocation_id(),
            self.primary.global_checkpoint(),
        );

        let shard_id = self.request.shard_id().clone();
        for allocation_id in group.unavailable_in_sync_shards() {
            if allocation_id != primary_routing.allocation_id() {
                self.mark_stale(&shard_id, allocation_id);
            }
        }

        let targets: Vec<ShardRouting> = group
            .replication_targets()
            .filter(|copy| copy.allocation_id() != primary_routing.allocation_id())
            .cloned()
            .collect();

        let replica_request = primary_result.replica_request().clone();
        let global_checkpoint = self.primary.global_checkpoint();
        let max_seq_no = self.primary.max_seq_no_of_updates_or_deletes();

        let (sender, receiver) = oneshot::channel();
        let tally = Arc::new(ShardTally::new(1 + targets.len(), primary_result, sender));
        for target in targets {
            self.dispatch(&tally, target, replica_request.clone(), global_checkpoint, max_seq_no);
        }
        tally.dispatch_complete();
        // only the replica tasks keep the tally alive from here on
        drop(tally);

        let result = receiver
            .await
            .map_err(|_| ReplicationError::internal("tally dropped before every copy answered"))??;
        phase.complete()?;
        self.metrics.increment_operations_completed();
        Ok(result)
    }

    fn dispatch(
        &self,
        tally: &Arc<ShardTally<R>>,
        target: ShardRouting,
        request: R,
        global_checkpoint: i64,
        max_seq_no: i64,
    ) {
        tally.begin_dispatch();
        log_event(
            Event::ReplicationReplicaDispatch,
            &[
                ("shard", &target.shard_id().to_string()),
                ("allocation_id", target.allocation_id().as_str()),
                ("node", target.node_id().as_str()),
            ],
        );

        // request leaves here, before the task is scheduled
        let response = self
            .replicas
            .perform_on(&target, request, global_checkpoint, max_seq_no);

        let tally = Arc::clone(tally);
        let primary = Arc::clone(&self.primary);
        let replicas = Arc::clone(&self.replicas);
        let metrics = Arc::clone(&self.metrics);
        let op_type = self.op_type.clone();
        tokio::spawn(async move {
            let handled = AssertUnwindSafe(Self::on_replica_response(
                response, &target, &tally, &primary, &replicas, &metrics, &op_type,
            ))
            .catch_unwind()
            .await;
            if handled.is_err() {
                let cause = ReplicationError::internal(format!("replica task for {} panicked", target));
                Self::log_replica_failure(&target, &cause);
                metrics.increment_replica_failures();
                tally.record_failure(&target, &cause);
            }
        });
    }

    async fn on_replica_response(
        response: BoxFuture<'static, ReplicationResult<ReplicaResponse>>,
        target: &ShardRouting,
        tally: &ShardTally<R>,
        primary: &Arc<P>,
        replicas: &Rep,
        metrics: &MetricsRegistry,
        op_type: &str,
    ) {
        match response.await {
            Ok(ack) => {
                primary.update_local_checkpoint_for_shard(target.allocation_id(), ack.local_checkpoint);
                primary.update_global_checkpoint_for_shard(target.allocation_id(), ack.global_checkpoint);
                metrics.increment_replica_successes();
                log_event(
                    Event::ReplicationReplicaSuccess,
                    &[
                        ("shard", &target.shard_id().to_string()),
                        ("allocation_id", target.allocation_id().as_str()),
                    ],
                );
                tally.record_success(target);
            }
            Err(cause) => {
                metrics.increment_replica_failures();
                Self::log_replica_failure(target, &cause);
                if cause.is_copy_level() {
                    let message = format!("failed to perform {} on replica {}", op_type, target);
                    let report = replicas.fail_shard_if_needed(target, message, cause.clone());
                    Self::spawn_report(
                        Arc::clone(primary),
                        report,
                        target.shard_id().to_string(),
                        target.allocation_id().clone(),
                    );
                }
                tally.record_failure(target, &cause);
            }
        }
    }

    fn log_replica_failure(target: &ShardRouting, cause: &ReplicationError) {
        log_event(
            Event::ReplicationReplicaFailed,
            &[
                ("shard", &target.shard_id().to_string()),
                ("allocation_id", target.allocation_id().as_str()),
                ("node", target.node_id().as_str()),
                ("kind", cause.kind().as_str()),
                ("reason", &cause.to_string()),
            ],
        );
    }

    fn mark_stale(&self, shard_id: &ShardId, allocation_id: &AllocationId) {
        self.metrics.increment_stale_copies_reported();
        log_event(
            Event::ShardCopyMarkedStale,
            &[("shard", &shard_id.to_string()), ("allocation_id", allocation_id.as_str())],
        );
        let report = self
            .replicas
            .mark_shard_copy_as_stale_if_needed(shard_id, allocation_id);
        Self::spawn_report(
            Arc::clone(&self.primary),
            report,
            shard_id.to_string(),
            allocation_id.clone(),
        );
    }

    // A rejected report means the master knows a newer primary; this copy
    // must stop acting as primary.
    fn spawn_report(
        primary: Arc<P>,
        report: BoxFuture<'static, ReplicationResult<()>>,
        shard: String,
        allocation_id: AllocationId,
    ) {
        tokio::spawn(async move {
            match report.await {
                Ok(()) => {}
                Err(cause @ ReplicationError::NoLongerPrimary { .. }) => {
                    log_event(
                        Event::PrimaryShardFailed,
                        &[("shard", &shard), ("reason", &cause.to_string())],
                    );
                    primary.fail_shard("primary shard is no longer primary while demoting a copy", &cause);
                }
                Err(cause) => {
                    log_event(
                        Event::ShardStateReportFailed,
                        &[
                            ("shard", &shard),
                            ("allocation_id", allocation_id.as_str()),
                            ("reason", &cause.to_string()),
                        ],
                    );
                }
            }
        });
    }
}
