//! Shard State Reporting
//!
//! Removal of shard copies from the in-sync set. Reports are sent to the
//! master, which owns the metadata; the sender never edits cluster state
//! itself.

mod action;
mod entry;
mod memory;

pub use action::ShardStateAction;
pub use entry::{FailedShardEntry, ShardFailedAck, SHARD_FAILED_ACTION_NAME};
pub use memory::MemoryShardStateReporter;

use futures_util::future::BoxFuture;

use crate::replication::ReplicationResult;

/// Reports a shard copy as failed or stale.
///
/// Resolves once the master acknowledged the report. Fails with
/// `NoLongerPrimary` if the reporting term has been superseded.
pub trait ShardStateReporter: Send + Sync {
    fn report_failed_shard(&self, entry: FailedShardEntry) -> BoxFuture<'static, ReplicationResult<()>>;
}
