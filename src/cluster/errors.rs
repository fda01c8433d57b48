//! Cluster model errors

use thiserror::Error;

/// Result type for cluster model operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors raised while reading or building cluster snapshots
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// Index is not present in the cluster metadata
    #[error("no such index [{0}]")]
    IndexNotFound(String),

    /// Shard has no routing table in the snapshot
    #[error("no routing table for shard {0}")]
    ShardNotFound(String),

    /// Replication group violates its own invariants
    #[error("invalid replication group: {0}")]
    InvalidReplicationGroup(String),

    /// Routing table cannot be built from the given copies
    #[error("invalid routing table: {0}")]
    InvalidRoutingTable(String),
}
