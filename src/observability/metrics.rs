//! Close-protocol counters
//!
//! Monotonic counters only. Relaxed ordering: readers see eventually
//! consistent values, which is all a report needs.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for shard verification and replication outcomes
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    shard_verifications: AtomicU64,
    shard_verifications_rejected: AtomicU64,
    forced_flushes: AtomicU64,
    operations_completed: AtomicU64,
    operations_failed: AtomicU64,
    replica_successes: AtomicU64,
    replica_failures: AtomicU64,
    stale_copies_reported: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_shard_verifications(&self) {
        self.shard_verifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_shard_verifications_rejected(&self) {
        self.shard_verifications_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_forced_flushes(&self) {
        self.forced_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_operations_completed(&self) {
        self.operations_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_operations_failed(&self) {
        self.operations_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_replica_successes(&self) {
        self.replica_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_replica_failures(&self) {
        self.replica_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stale_copies_reported(&self) {
        self.stale_copies_reported.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            shard_verifications: self.shard_verifications.load(Ordering::Relaxed),
            shard_verifications_rejected: self.shard_verifications_rejected.load(Ordering::Relaxed),
            forced_flushes: self.forced_flushes.load(Ordering::Relaxed),
            operations_completed: self.operations_completed.load(Ordering::Relaxed),
            operations_failed: self.operations_failed.load(Ordering::Relaxed),
            replica_successes: self.replica_successes.load(Ordering::Relaxed),
            replica_failures: self.replica_failures.load(Ordering::Relaxed),
            stale_copies_reported: self.stale_copies_reported.load(Ordering::Relaxed),
        }
    }
}

/// Serializable counter values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub shard_verifications: u64,
    pub shard_verifications_rejected: u64,
    pub forced_flushes: u64,
    pub operations_completed: u64,
    pub operations_failed: u64,
    pub replica_successes: u64,
    pub replica_failures: u64,
    pub stale_copies_reported: u64,
}
