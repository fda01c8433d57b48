//! Coordinator phase state machine
//!
//! ```text
//! Init -> PrimaryPending -> Replicating -> Done
//!               |
//!               +-> Failed
//! ```
//!
//! Done and Failed are terminal. Replicas are never contacted before the
//! primary step succeeded.

use std::fmt;

use super::errors::{ReplicationError, ReplicationResult};

/// Phase of one replication operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    /// Replication group captured, nothing sent yet
    Init,
    /// Primary is verifying and flushing
    PrimaryPending,
    /// Primary succeeded; replica requests are in flight
    Replicating,
    /// Every dispatched request resolved; ShardInfo published
    Done,
    /// Primary step failed; no replica was contacted
    Failed,
}

impl OperationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::PrimaryPending => "PRIMARY_PENDING",
            Self::Replicating => "REPLICATING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Start the primary step. Valid only from Init.
    pub fn begin_primary(self) -> ReplicationResult<Self> {
        match self {
            Self::Init => Ok(Self::PrimaryPending),
            other => Err(other.illegal(Self::PrimaryPending)),
        }
    }

    /// Start replicating. Valid only after the primary step.
    pub fn begin_replicating(self) -> ReplicationResult<Self> {
        match self {
            Self::PrimaryPending => Ok(Self::Replicating),
            other => Err(other.illegal(Self::Replicating)),
        }
    }

    /// All replicas answered
    pub fn complete(self) -> ReplicationResult<Self> {
        match self {
            Self::Replicating => Ok(Self::Done),
            other => Err(other.illegal(Self::Done)),
        }
    }

    /// Primary step failed
    pub fn fail(self) -> ReplicationResult<Self> {
        match self {
            Self::PrimaryPending => Ok(Self::Failed),
            other => Err(other.illegal(Self::Failed)),
        }
    }

    fn illegal(self, to: Self) -> ReplicationError {
        ReplicationError::IllegalTransition {
            from: self.as_str(),
            to: to.as_str(),
        }
    }
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
