//! Identity types
//!
//! All identities are immutable and compared by value.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a single shard of an index.
///
/// Displayed as `[index][shard]`, which is the form used in every
/// user-facing error message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId {
    index: String,
    index_uuid: String,
    id: u32,
}

impl ShardId {
    /// Create a new shard id.
    pub fn new(index: impl Into<String>, index_uuid: impl Into<String>, id: u32) -> Self {
        Self {
            index: index.into(),
            index_uuid: index_uuid.into(),
            id,
        }
    }

    /// Name of the owning index
    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// UUID of the owning index
    pub fn index_uuid(&self) -> &str {
        &self.index_uuid
    }

    /// Shard number within the index
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}]", self.index, self.id)
    }
}

/// Identity of a cluster node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one allocated copy of a shard.
///
/// In-sync and tracked sets are expressed in allocation ids, never in
/// node ids, because a node may host a new copy after a failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationId(String);

impl AllocationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh allocation id.
    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the task that initiated a request.
///
/// Opaque to the replication protocol; carried for cancellation and audit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId {
    node_id: NodeId,
    id: u64,
}

impl TaskId {
    pub fn new(node_id: NodeId, id: u64) -> Self {
        Self { node_id, id }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_id, self.id)
    }
}
