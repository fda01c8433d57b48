//! Shard failure report messages

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cluster::{AllocationId, ShardId};

/// Action the master listens on for failed and stale copy reports
pub const SHARD_FAILED_ACTION_NAME: &str = "internal:cluster/shard/failure";

/// A request to remove one shard copy from the in-sync set, or to fail it.
///
/// `mark_as_stale` distinguishes a copy that could not be reached at all
/// (stale) from one that ran the request and failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedShardEntry {
    pub shard_id: ShardId,
    pub allocation_id: AllocationId,
    pub primary_term: u64,
    pub message: String,
    pub failure: Option<String>,
    pub mark_as_stale: bool,
}

impl FailedShardEntry {
    /// Report for a copy that failed the request
    pub fn failed(
        shard_id: ShardId,
        allocation_id: AllocationId,
        primary_term: u64,
        message: impl Into<String>,
        failure: impl Into<String>,
    ) -> Self {
        Self {
            shard_id,
            allocation_id,
            primary_term,
            message: message.into(),
            failure: Some(failure.into()),
            mark_as_stale: true,
        }
    }

    /// Report for an in-sync copy that has no live routing entry
    pub fn stale(shard_id: ShardId, allocation_id: AllocationId, primary_term: u64) -> Self {
        Self {
            shard_id,
            allocation_id,
            primary_term,
            message: "mark copy as stale".to_string(),
            failure: None,
            mark_as_stale: true,
        }
    }
}

impl fmt::Display for FailedShardEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shard id [{}], allocation id [{}], primary term [{}], message [{}]",
            self.shard_id, self.allocation_id, self.primary_term, self.message
        )?;
        if let Some(failure) = &self.failure {
            write!(f, ", failure [{}]", failure)?;
        }
        write!(f, ", markAsStale [{}]", self.mark_as_stale)
    }
}

/// Master acknowledgement of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardFailedAck {
    pub acknowledged: bool,
}
