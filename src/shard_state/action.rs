//! Shard state action
//!
//! Sends failed/stale copy reports to the elected master over the
//! transport. The master answers with an ack, or rejects the report when
//! the sender's primary term has been superseded.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;

use super::entry::{FailedShardEntry, ShardFailedAck, SHARD_FAILED_ACTION_NAME};
use super::ShardStateReporter;
use crate::cluster::ClusterStateReader;
use crate::observability::{log_event, Event};
use crate::replication::{ReplicationError, ReplicationErrorKind, ReplicationResult};
use crate::transport::{decode, encode, Transport, TransportError};

/// Reports shard failures to the master node
pub struct ShardStateAction {
    cluster: Arc<dyn ClusterStateReader>,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl ShardStateAction {
    pub fn new(cluster: Arc<dyn ClusterStateReader>, transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            cluster,
            transport,
            timeout,
        }
    }
}

impl ShardStateReporter for ShardStateAction {
    fn report_failed_shard(&self, entry: FailedShardEntry) -> BoxFuture<'static, ReplicationResult<()>> {
        let Some(master) = self.cluster.state().master_node().cloned() else {
            let cause = ReplicationError::internal(format!("no master known, cannot report {}", entry));
            return future::ready(Err(cause)).boxed();
        };
        let payload = match encode(&entry) {
            Ok(payload) => payload,
            Err(e) => return future::ready(Err(ReplicationError::Codec(e.to_string()))).boxed(),
        };

        // sent now, not on first poll
        let response = self.transport.send_request(&master, SHARD_FAILED_ACTION_NAME, payload);
        let timeout = self.timeout;

        async move {
            let outcome = match tokio::time::timeout(timeout, response).await {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::Timeout {
                    action: SHARD_FAILED_ACTION_NAME.to_string(),
                    node: master.clone(),
                    millis: timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(bytes) => {
                    let ack: ShardFailedAck = decode(&bytes).map_err(|e| ReplicationError::Codec(e.to_string()))?;
                    if !ack.acknowledged {
                        return Err(ReplicationError::internal(format!(
                            "master [{}] did not acknowledge {}",
                            master, entry
                        )));
                    }
                    log_event(
                        Event::ShardFailedReported,
                        &[
                            ("shard", &entry.shard_id.to_string()),
                            ("allocation_id", entry.allocation_id.as_str()),
                            ("primary_term", &entry.primary_term.to_string()),
                            ("node", master.as_str()),
                        ],
                    );
                    Ok(())
                }
                Err(TransportError::Remote { kind, message })
                    if kind == ReplicationErrorKind::NoLongerPrimary.as_str() =>
                {
                    Err(ReplicationError::NoLongerPrimary {
                        term: entry.primary_term,
                        reason: message,
                    })
                }
                Err(e) => Err(ReplicationError::internal(format!(
                    "failed to report {} to master [{}]: {}",
                    entry, master, e
                ))),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{AllocationId, ClusterService, ClusterStateBuilder, NodeId, ShardId};
    use crate::transport::CapturingTransport;

    fn setup(master: Option<&str>) -> (Arc<CapturingTransport>, ShardStateAction) {
        let mut builder = ClusterStateBuilder::new(NodeId::new("local"));
        if let Some(master) = master {
            builder = builder.master_node(NodeId::new(master));
        }
        let cluster = Arc::new(ClusterService::new(builder.build()));
        let transport = Arc::new(CapturingTransport::new());
        let action = ShardStateAction::new(cluster, transport.clone(), Duration::from_secs(5));
        (transport, action)
    }

    fn entry() -> FailedShardEntry {
        FailedShardEntry::stale(ShardId::new("i", "_na_", 0), AllocationId::new("a"), 2)
    }

    #[tokio::test]
    async fn test_sends_to_master() {
        let (transport, action) = setup(Some("master"));
        let report = action.report_failed_shard(entry());

        let captured = transport.captured_requests();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].node, NodeId::new("master"));
        assert_eq!(captured[0].action, SHARD_FAILED_ACTION_NAME);
        assert_eq!(captured[0].decode::<FailedShardEntry>().unwrap(), entry());

        transport
            .handle_response(captured[0].request_id, &ShardFailedAck { acknowledged: true })
            .unwrap();
        assert!(report.await.is_ok());
    }

    #[tokio::test]
    async fn test_no_master_is_error() {
        let (transport, action) = setup(None);
        assert!(action.report_failed_shard(entry()).await.is_err());
        assert!(transport.captured_requests().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_maps_to_no_longer_primary() {
        let (transport, action) = setup(Some("master"));
        let report = action.report_failed_shard(entry());
        let id = transport.captured_requests()[0].request_id;
        transport.handle_error(id, TransportError::remote("no_longer_primary", "term 2 < 3"));

        let result = report.await;
        assert_eq!(
            result,
            Err(ReplicationError::NoLongerPrimary {
                term: 2,
                reason: "term 2 < 3".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_disconnect_is_plain_failure() {
        let (transport, action) = setup(Some("master"));
        let report = action.report_failed_shard(entry());
        let id = transport.captured_requests()[0].request_id;
        transport.handle_disconnect(id);

        let result = report.await;
        assert!(matches!(result, Err(ReplicationError::Internal(_))));
    }
}
