//! Cluster blocks
//!
//! A block marks an index as forbidding a class of operations. Closing an
//! index first installs a closing block with a fresh uuid; verification
//! then checks that the *same* block instance is still present.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id shared by all index-closed blocks
pub const INDEX_CLOSED_BLOCK_ID: u32 = 4;

/// Operation class forbidden by a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterBlockLevel {
    Read,
    Write,
    MetadataRead,
    MetadataWrite,
}

impl ClusterBlockLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::MetadataRead => "METADATA_READ",
            Self::MetadataWrite => "METADATA_WRITE",
        }
    }
}

/// A block attached to an index.
///
/// Identity is `(id, uuid)`: two closing blocks created by different close
/// attempts share an id but never a uuid, so they are not equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterBlock {
    id: u32,
    uuid: Option<String>,
    description: String,
    retryable: bool,
    levels: Vec<ClusterBlockLevel>,
}

impl ClusterBlock {
    pub fn new(
        id: u32,
        uuid: Option<String>,
        description: impl Into<String>,
        retryable: bool,
        levels: Vec<ClusterBlockLevel>,
    ) -> Self {
        Self {
            id,
            uuid,
            description: description.into(),
            retryable,
            levels,
        }
    }

    /// Create the block installed while an index is being closed.
    ///
    /// Each call yields a distinct block.
    pub fn index_closing() -> Self {
        Self::new(
            INDEX_CLOSED_BLOCK_ID,
            Some(Uuid::new_v4().simple().to_string()),
            "index preparing to close. Reopen the index to allow writes again or retry closing the index to fully close the index.",
            false,
            vec![ClusterBlockLevel::Write],
        )
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn retryable(&self) -> bool {
        self.retryable
    }

    pub fn levels(&self) -> &[ClusterBlockLevel] {
        &self.levels
    }

    /// Whether this block forbids the given level
    pub fn contains(&self, level: ClusterBlockLevel) -> bool {
        self.levels.contains(&level)
    }
}

impl PartialEq for ClusterBlock {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.uuid == other.uuid
    }
}

impl Eq for ClusterBlock {}

impl Hash for ClusterBlock {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.uuid.hash(state);
    }
}

impl fmt::Display for ClusterBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},", self.id)?;
        if let Some(uuid) = &self.uuid {
            write!(f, "{},", uuid)?;
        }
        let levels: Vec<&str> = self.levels.iter().map(|l| l.as_str()).collect();
        write!(f, "{}, blocks {}", self.description, levels.join(","))
    }
}

/// Blocks per index name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterBlocks {
    indices: BTreeMap<String, Vec<ClusterBlock>>,
}

impl ClusterBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a block to an index. Adding an equal block twice is a no-op.
    pub fn add_index_block(&mut self, index: impl Into<String>, block: ClusterBlock) {
        let blocks = self.indices.entry(index.into()).or_default();
        if !blocks.contains(&block) {
            blocks.push(block);
        }
    }

    /// Remove a block from an index. Returns whether it was present.
    pub fn remove_index_block(&mut self, index: &str, block: &ClusterBlock) -> bool {
        let Some(blocks) = self.indices.get_mut(index) else {
            return false;
        };
        let before = blocks.len();
        blocks.retain(|b| b != block);
        let removed = blocks.len() != before;
        if blocks.is_empty() {
            self.indices.remove(index);
        }
        removed
    }

    /// Blocks currently attached to an index
    pub fn blocks_for(&self, index: &str) -> &[ClusterBlock] {
        self.indices.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the exact block instance is attached to the index
    pub fn has_index_block(&self, index: &str, block: &ClusterBlock) -> bool {
        self.blocks_for(index).contains(block)
    }
}
