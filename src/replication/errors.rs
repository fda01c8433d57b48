//! Replication Error Types
//!
//! Two classes of failure:
//! - Primary-level: precondition, consistency and flush failures on the
//!   primary abort the whole operation
//! - Copy-level: a replica that fails or cannot be reached only shrinks the
//!   success tally and is demoted
//!
//! Any other error met while replicating (encoding the request, a panicked
//! replica task) is still counted against the copy but does not demote it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cluster::{AllocationId, ClusterError, NodeId};
use crate::shard::ShardError;
use crate::transport::TransportError;

/// Result type for replication operations
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Replication errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicationError {
    /// A precondition for closing does not hold (in-flight operations,
    /// missing block)
    #[error("{0}")]
    PreconditionViolation(String),

    /// Engine-level consistency check failed
    #[error("{0}")]
    StorageInconsistency(String),

    /// Forced flush failed
    #[error("flush failed: {0}")]
    Flush(String),

    /// Copy did not answer: disconnect or timeout
    #[error("shard copy [{allocation_id}] on node [{node}] is unreachable: {reason}")]
    Unreachable {
        node: NodeId,
        allocation_id: AllocationId,
        reason: String,
    },

    /// Copy ran its checks and reported a failure
    #[error("shard copy failed: {0}")]
    CopyFailure(String),

    /// Target copy does not exist on the receiving node
    #[error("shard not found: {0}")]
    ShardNotFound(String),

    /// The primary term used for a request has been superseded
    #[error("primary term [{term}] is no longer current: {reason}")]
    NoLongerPrimary { term: u64, reason: String },

    /// A write-once value was written twice
    #[error("{0} has already been set")]
    AlreadySet(&'static str),

    /// A write-once value was read before being written
    #[error("{0} has not been set")]
    NotSet(&'static str),

    /// Coordinator phase change not allowed by the state machine
    #[error("illegal phase transition: {from} -> {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },

    /// Cluster snapshot does not contain what the operation needs
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// Message could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Bug or runtime failure outside the protocol
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error kinds, stable across the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationErrorKind {
    PreconditionViolation,
    StorageInconsistency,
    Flush,
    Unreachable,
    CopyFailure,
    ShardNotFound,
    NoLongerPrimary,
    AlreadySet,
    NotSet,
    IllegalTransition,
    Cluster,
    Codec,
    Configuration,
    Internal,
}

impl ReplicationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreconditionViolation => "precondition_violation",
            Self::StorageInconsistency => "storage_inconsistency",
            Self::Flush => "flush",
            Self::Unreachable => "unreachable",
            Self::CopyFailure => "copy_failure",
            Self::ShardNotFound => "shard_not_found",
            Self::NoLongerPrimary => "no_longer_primary",
            Self::AlreadySet => "already_set",
            Self::NotSet => "not_set",
            Self::IllegalTransition => "illegal_transition",
            Self::Cluster => "cluster",
            Self::Codec => "codec",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ReplicationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ReplicationError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionViolation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn kind(&self) -> ReplicationErrorKind {
        match self {
            Self::PreconditionViolation(_) => ReplicationErrorKind::PreconditionViolation,
            Self::StorageInconsistency(_) => ReplicationErrorKind::StorageInconsistency,
            Self::Flush(_) => ReplicationErrorKind::Flush,
            Self::Unreachable { .. } => ReplicationErrorKind::Unreachable,
            Self::CopyFailure(_) => ReplicationErrorKind::CopyFailure,
            Self::ShardNotFound(_) => ReplicationErrorKind::ShardNotFound,
            Self::NoLongerPrimary { .. } => ReplicationErrorKind::NoLongerPrimary,
            Self::AlreadySet(_) => ReplicationErrorKind::AlreadySet,
            Self::NotSet(_) => ReplicationErrorKind::NotSet,
            Self::IllegalTransition { .. } => ReplicationErrorKind::IllegalTransition,
            Self::Cluster(_) => ReplicationErrorKind::Cluster,
            Self::Codec(_) => ReplicationErrorKind::Codec,
            Self::Configuration(_) => ReplicationErrorKind::Configuration,
            Self::Internal(_) => ReplicationErrorKind::Internal,
        }
    }

    /// Failures that only demote the copy they happened on
    pub fn is_copy_level(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::CopyFailure(_) | Self::ShardNotFound(_)
        )
    }

    /// Failure as it would cross the wire from a remote handler
    pub fn to_remote(&self) -> TransportError {
        TransportError::remote(self.kind().as_str(), self.to_string())
    }
}

impl From<ShardError> for ReplicationError {
    fn from(e: ShardError) -> Self {
        match e {
            ShardError::Inconsistent(message) => Self::StorageInconsistency(message),
            ShardError::Flush(message) => Self::Flush(message),
            ShardError::Closed(shard) => Self::ShardNotFound(format!("shard {} is closed", shard)),
        }
    }
}

impl From<serde_json::Error> for ReplicationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_message_is_verbatim() {
        let err = ReplicationError::precondition("Index shard [i][0] must be blocked");
        assert_eq!(err.to_string(), "Index shard [i][0] must be blocked");
        assert_eq!(err.kind(), ReplicationErrorKind::PreconditionViolation);
    }

    #[test]
    fn test_copy_level_errors() {
        assert!(ReplicationError::CopyFailure("x".into()).is_copy_level());
        assert!(ReplicationError::Unreachable {
            node: NodeId::new("n"),
            allocation_id: AllocationId::new("a"),
            reason: "timeout".into(),
        }
        .is_copy_level());
        assert!(!ReplicationError::Flush("x".into()).is_copy_level());
        assert!(!ReplicationError::precondition("x").is_copy_level());
        assert!(!ReplicationError::internal("replica task panicked").is_copy_level());
        assert!(!ReplicationError::Codec("eof".into()).is_copy_level());
    }

    #[test]
    fn test_shard_errors_map_to_taxonomy() {
        assert_eq!(
            ReplicationError::from(ShardError::Inconsistent("test".into())),
            ReplicationError::StorageInconsistency("test".into())
        );
        assert_eq!(
            ReplicationError::from(ShardError::Flush("io".into())).kind(),
            ReplicationErrorKind::Flush
        );
    }

    #[test]
    fn test_to_remote_keeps_kind() {
        let remote = ReplicationError::StorageInconsistency("dangling".into()).to_remote();
        assert_eq!(
            remote,
            TransportError::remote("storage_inconsistency", "dangling")
        );
    }
}
