//! In-memory shard state reporter

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;

use super::entry::FailedShardEntry;
use super::ShardStateReporter;
use crate::replication::{ReplicationError, ReplicationResult};

/// Reporter that records entries in memory.
///
/// With a current primary term set, reports carrying an older term are
/// rejected the way a master rejects a deposed primary.
#[derive(Debug, Default)]
pub struct MemoryShardStateReporter {
    entries: Mutex<Vec<FailedShardEntry>>,
    current_primary_term: AtomicU64,
}

impl MemoryShardStateReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject reports whose primary term is below `term`
    pub fn with_current_primary_term(self, term: u64) -> Self {
        self.current_primary_term.store(term, Ordering::SeqCst);
        self
    }

    /// Entries accepted so far, in arrival order
    pub fn entries(&self) -> Vec<FailedShardEntry> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ShardStateReporter for MemoryShardStateReporter {
    fn report_failed_shard(&self, entry: FailedShardEntry) -> BoxFuture<'static, ReplicationResult<()>> {
        let current = self.current_primary_term.load(Ordering::SeqCst);
        if entry.primary_term < current {
            return future::ready(Err(ReplicationError::NoLongerPrimary {
                term: entry.primary_term,
                reason: format!("current primary term is [{}]", current),
            }))
            .boxed();
        }

        match self.entries.lock() {
            Ok(mut guard) => guard.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
        future::ready(Ok(())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{AllocationId, ShardId};

    #[tokio::test]
    async fn test_records_entries() {
        let reporter = MemoryShardStateReporter::new();
        let entry = FailedShardEntry::stale(ShardId::new("i", "_na_", 0), AllocationId::new("a"), 1);
        reporter.report_failed_shard(entry.clone()).await.unwrap();
        assert_eq!(reporter.entries(), vec![entry]);
    }

    #[tokio::test]
    async fn test_rejects_outdated_term() {
        let reporter = MemoryShardStateReporter::new().with_current_primary_term(5);
        let entry = FailedShardEntry::stale(ShardId::new("i", "_na_", 0), AllocationId::new("a"), 4);
        let result = reporter.report_failed_shard(entry).await;
        assert!(matches!(result, Err(ReplicationError::NoLongerPrimary { term: 4, .. })));
        assert!(reporter.entries().is_empty());
    }
}
