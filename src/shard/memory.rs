//! In-memory shard copy
//!
//! Records every verification and flush call so callers can assert on
//! them, and lets failures be injected per call site.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::errors::{ShardError, ShardResult};
use super::handle::{CommitId, FlushRequest, IndexShard};
use crate::cluster::{AllocationId, ShardId, ShardRouting};

#[derive(Debug, Default)]
struct Injected {
    verify_failure: Option<String>,
    flush_failure: Option<String>,
}

/// Shard copy backed by process memory
#[derive(Debug)]
pub struct MemoryShard {
    routing: ShardRouting,
    active_operations: AtomicUsize,
    verify_calls: AtomicUsize,
    flushes: Mutex<Vec<FlushRequest>>,
    commit_generation: AtomicU64,
    injected: Mutex<Injected>,
    failure: Mutex<Option<String>>,
    local_checkpoint: AtomicI64,
    global_checkpoint: AtomicI64,
    checkpoints: Mutex<BTreeMap<AllocationId, (i64, i64)>>,
}

impl MemoryShard {
    pub fn new(routing: ShardRouting) -> Self {
        Self {
            routing,
            active_operations: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            flushes: Mutex::new(Vec::new()),
            commit_generation: AtomicU64::new(0),
            injected: Mutex::new(Injected::default()),
            failure: Mutex::new(None),
            local_checkpoint: AtomicI64::new(0),
            global_checkpoint: AtomicI64::new(0),
            checkpoints: Mutex::new(BTreeMap::new()),
        }
    }

    /// Set the number of operations in flight
    pub fn set_active_operations(&self, count: usize) {
        self.active_operations.store(count, Ordering::SeqCst);
    }

    /// Set this copy's own checkpoints
    pub fn set_checkpoints(&self, local: i64, global: i64) {
        self.local_checkpoint.store(local, Ordering::SeqCst);
        self.global_checkpoint.store(global, Ordering::SeqCst);
    }

    /// Make every later consistency check fail with `message`
    pub fn fail_verification(&self, message: impl Into<String>) {
        lock(&self.injected).verify_failure = Some(message.into());
    }

    /// Make every later flush fail with `message`
    pub fn fail_flush(&self, message: impl Into<String>) {
        lock(&self.injected).flush_failure = Some(message.into());
    }

    /// How many times the consistency check ran
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// Flush requests received, in order
    pub fn flush_requests(&self) -> Vec<FlushRequest> {
        lock(&self.flushes).clone()
    }

    /// Reason the shard was failed with, if any
    pub fn failure(&self) -> Option<String> {
        lock(&self.failure).clone()
    }

    /// Checkpoints last reported for a peer copy
    pub fn checkpoints_for(&self, allocation_id: &AllocationId) -> Option<(i64, i64)> {
        lock(&self.checkpoints).get(allocation_id).copied()
    }
}

impl IndexShard for MemoryShard {
    fn shard_id(&self) -> &ShardId {
        self.routing.shard_id()
    }

    fn routing_entry(&self) -> ShardRouting {
        self.routing.clone()
    }

    fn active_operations_count(&self) -> usize {
        self.active_operations.load(Ordering::SeqCst)
    }

    fn verify_shard_before_index_closing(&self) -> ShardResult<()> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        match &lock(&self.injected).verify_failure {
            Some(message) => Err(ShardError::Inconsistent(message.clone())),
            None => Ok(()),
        }
    }

    fn flush(&self, request: FlushRequest) -> ShardResult<CommitId> {
        lock(&self.flushes).push(request);
        if lock(&self.failure).is_some() {
            return Err(ShardError::Closed(self.routing.shard_id().to_string()));
        }
        if let Some(message) = &lock(&self.injected).flush_failure {
            return Err(ShardError::Flush(message.clone()));
        }
        let generation = self.commit_generation.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CommitId { generation })
    }

    fn fail_shard(&self, reason: &str, cause: &str) {
        let mut failure = lock(&self.failure);
        if failure.is_none() {
            *failure = Some(format!("{}: {}", reason, cause));
        }
    }

    fn local_checkpoint(&self) -> i64 {
        self.local_checkpoint.load(Ordering::SeqCst)
    }

    fn global_checkpoint(&self) -> i64 {
        self.global_checkpoint.load(Ordering::SeqCst)
    }

    fn max_seq_no_of_updates_or_deletes(&self) -> i64 {
        0
    }

    fn update_local_checkpoint_for_shard(&self, allocation_id: &AllocationId, checkpoint: i64) {
        lock(&self.checkpoints)
            .entry(allocation_id.clone())
            .or_insert((0, 0))
            .0 = checkpoint;
    }

    fn update_global_checkpoint_for_shard(&self, allocation_id: &AllocationId, checkpoint: i64) {
        lock(&self.checkpoints)
            .entry(allocation_id.clone())
            .or_insert((0, 0))
            .1 = checkpoint;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
