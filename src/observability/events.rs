//! Observable events
//!
//! Every log line emitted by the close protocol names one of these.

use std::fmt;

/// Events emitted while verifying shards before close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Shard-level verification
    /// Verification of a local copy started
    VerifyShardBegin,
    /// Local copy verified and flushed
    VerifyShardComplete,
    /// Local copy failed a precondition, the consistency check or the flush
    VerifyShardRejected,
    /// Forced flush issued
    ShardFlushForced,

    // Replication coordination
    /// Primary step started
    ReplicationPrimaryBegin,
    /// Primary step failed; operation aborted
    ReplicationPrimaryFailed,
    /// Request sent to a replica copy
    ReplicationReplicaDispatch,
    /// Replica copy acknowledged
    ReplicationReplicaSuccess,
    /// Replica copy failed or was unreachable
    ReplicationReplicaFailed,
    /// All copies answered; ShardInfo finalized
    ReplicationComplete,
    /// Coordinator attempted a phase change it does not allow
    IllegalPhaseTransition,

    // Shard state reporting
    /// Unreachable in-sync copy reported as stale
    ShardCopyMarkedStale,
    /// Failed copy reported to the master
    ShardFailedReported,
    /// Report to the master did not go through
    ShardStateReportFailed,
    /// Primary failed locally after losing its term
    PrimaryShardFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::VerifyShardBegin => "VERIFY_SHARD_BEGIN",
            Event::VerifyShardComplete => "VERIFY_SHARD_COMPLETE",
            Event::VerifyShardRejected => "VERIFY_SHARD_REJECTED",
            Event::ShardFlushForced => "SHARD_FLUSH_FORCED",

            Event::ReplicationPrimaryBegin => "REPLICATION_PRIMARY_BEGIN",
            Event::ReplicationPrimaryFailed => "REPLICATION_PRIMARY_FAILED",
            Event::ReplicationReplicaDispatch => "REPLICATION_REPLICA_DISPATCH",
            Event::ReplicationReplicaSuccess => "REPLICATION_REPLICA_SUCCESS",
            Event::ReplicationReplicaFailed => "REPLICATION_REPLICA_FAILED",
            Event::ReplicationComplete => "REPLICATION_COMPLETE",
            Event::IllegalPhaseTransition => "ILLEGAL_PHASE_TRANSITION",

            Event::ShardCopyMarkedStale => "SHARD_COPY_MARKED_STALE",
            Event::ShardFailedReported => "SHARD_FAILED_REPORTED",
            Event::ShardStateReportFailed => "SHARD_STATE_REPORT_FAILED",
            Event::PrimaryShardFailed => "PRIMARY_SHARD_FAILED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> super::Severity {
        use super::Severity;
        match self {
            Event::VerifyShardBegin
            | Event::VerifyShardComplete
            | Event::ShardFlushForced
            | Event::ReplicationPrimaryBegin
            | Event::ReplicationComplete => Severity::Info,
            Event::ReplicationReplicaDispatch | Event::ReplicationReplicaSuccess => Severity::Trace,
            Event::VerifyShardRejected
            | Event::ReplicationReplicaFailed
            | Event::ShardCopyMarkedStale
            | Event::ShardFailedReported => Severity::Warn,
            Event::ReplicationPrimaryFailed
            | Event::IllegalPhaseTransition
            | Event::ShardStateReportFailed => Severity::Error,
            Event::PrimaryShardFailed => Severity::Fatal,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::Severity;

    #[test]
    fn test_event_names_are_upper_snake() {
        let events = [
            Event::VerifyShardBegin,
            Event::VerifyShardComplete,
            Event::VerifyShardRejected,
            Event::ShardFlushForced,
            Event::ReplicationPrimaryBegin,
            Event::ReplicationPrimaryFailed,
            Event::ReplicationReplicaDispatch,
            Event::ReplicationReplicaSuccess,
            Event::ReplicationReplicaFailed,
            Event::ReplicationComplete,
            Event::IllegalPhaseTransition,
            Event::ShardCopyMarkedStale,
            Event::ShardFailedReported,
            Event::ShardStateReportFailed,
            Event::PrimaryShardFailed,
        ];
        for event in events {
            assert!(event.as_str().chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_failures_are_not_info() {
        assert_eq!(Event::ReplicationPrimaryFailed.severity(), Severity::Error);
        assert_eq!(Event::ShardCopyMarkedStale.severity(), Severity::Warn);
        assert_eq!(Event::ReplicationComplete.severity(), Severity::Info);
    }
}
