//! Shard outcome tally
//!
//! Shared accumulator for the fanned-out replica tasks. Every update and
//! the "was this the last outstanding request" check happen under one
//! lock, so exactly one caller finalizes.
//!
//! `pending` starts at 1 for the dispatch loop itself; the loop releases
//! that slot once every request is out, so finalization cannot run while
//! requests are still being dispatched.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;

use super::errors::{ReplicationError, ReplicationErrorKind, ReplicationResult};
use super::request::{PrimaryResult, ReplicationRequest};
use super::response::{ShardFailure, ShardInfo};
use crate::cluster::{AllocationId, ShardRouting};
use crate::observability::{log_event, Event};

/// Final outcome of one replica copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CopyOutcome {
    Succeeded,
    Failed(ReplicationErrorKind),
}

type CompletionSender<R> = oneshot::Sender<ReplicationResult<PrimaryResult<R>>>;

struct Completion<R> {
    result: PrimaryResult<R>,
    sender: CompletionSender<R>,
}

struct TallyState<R> {
    pending: usize,
    successful: usize,
    failures: Vec<ShardFailure>,
    outcomes: BTreeMap<AllocationId, CopyOutcome>,
    completion: Option<Completion<R>>,
}

pub(crate) struct ShardTally<R> {
    total: usize,
    state: Mutex<TallyState<R>>,
}

impl<R: ReplicationRequest> ShardTally<R> {
    /// Tally for `total` copies, the primary already counted as successful
    pub(crate) fn new(total: usize, result: PrimaryResult<R>, sender: CompletionSender<R>) -> Self {
        Self {
            total,
            state: Mutex::new(TallyState {
                pending: 1,
                successful: 1,
                failures: Vec::new(),
                outcomes: BTreeMap::new(),
                completion: Some(Completion { result, sender }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TallyState<R>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a request about to be sent
    pub(crate) fn begin_dispatch(&self) {
        self.lock().pending += 1;
    }

    /// Release the dispatch loop's slot
    pub(crate) fn dispatch_complete(&self) {
        let mut state = self.lock();
        self.resolve(&mut state);
    }

    pub(crate) fn record_success(&self, copy: &ShardRouting) {
        let mut state = self.lock();
        if !Self::claim(&mut state, copy, CopyOutcome::Succeeded) {
            return;
        }
        state.successful += 1;
        self.resolve(&mut state);
    }

    pub(crate) fn record_failure(&self, copy: &ShardRouting, cause: &ReplicationError) {
        let mut state = self.lock();
        if !Self::claim(&mut state, copy, CopyOutcome::Failed(cause.kind())) {
            return;
        }
        state.failures.push(ShardFailure::new(
            copy.shard_id().clone(),
            copy.allocation_id().clone(),
            copy.node_id().clone(),
            copy.primary(),
            cause,
        ));
        self.resolve(&mut state);
    }

    /// Outcomes recorded so far, per copy
    #[cfg(test)]
    pub(crate) fn outcomes(&self) -> BTreeMap<AllocationId, CopyOutcome> {
        self.lock().outcomes.clone()
    }

    // Each copy contributes exactly once; a repeated outcome is dropped.
    fn claim(state: &mut TallyState<R>, copy: &ShardRouting, outcome: CopyOutcome) -> bool {
        if state.outcomes.contains_key(copy.allocation_id()) {
            log_event(
                Event::IllegalPhaseTransition,
                &[
                    ("shard", &copy.shard_id().to_string()),
                    ("allocation_id", copy.allocation_id().as_str()),
                    ("reason", "duplicate outcome for shard copy"),
                ],
            );
            return false;
        }
        state.outcomes.insert(copy.allocation_id().clone(), outcome);
        true
    }

    fn resolve(&self, state: &mut TallyState<R>) {
        state.pending = state.pending.saturating_sub(1);
        if state.pending > 0 {
            return;
        }
        let Some(Completion { result, sender }) = state.completion.take() else {
            return;
        };

        let outcome = ShardInfo::new(self.total, state.successful, state.failures.clone())
            .and_then(|info| {
                log_event(
                    Event::ReplicationComplete,
                    &[
                        ("shard", &result.replica_request().shard_id().to_string()),
                        ("total", &info.total().to_string()),
                        ("successful", &info.successful().to_string()),
                        ("failed", &info.failed().to_string()),
                    ],
                );
                result.set_shard_info(info)
            })
            .map(|()| result);

        // the coordinator may have been dropped; nothing left to notify then
        let _ = sender.send(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{NodeId, ShardId, ShardRoutingState};

    #[derive(Debug, Clone)]
    struct Req(ShardId);

    impl ReplicationRequest for Req {
        fn shard_id(&self) -> &ShardId {
            &self.0
        }
    }

    fn copy(aid: &str) -> ShardRouting {
        ShardRouting::new(
            ShardId::new("test", "_na_", 0),
            AllocationId::new(aid),
            NodeId::new(format!("node_{}", aid)),
            false,
            ShardRoutingState::Started,
        )
    }

    fn tally(total: usize) -> (ShardTally<Req>, oneshot::Receiver<ReplicationResult<PrimaryResult<Req>>>) {
        let (sender, receiver) = oneshot::channel();
        let result = PrimaryResult::new(Req(ShardId::new("test", "_na_", 0)));
        (ShardTally::new(total, result, sender), receiver)
    }

    #[test]
    fn test_no_replicas_finalizes_on_dispatch_complete() {
        let (tally, mut receiver) = tally(1);
        tally.dispatch_complete();

        let result = receiver.try_recv().unwrap().unwrap();
        let info = result.shard_info().unwrap();
        assert_eq!((info.total(), info.successful(), info.failed()), (1, 1, 0));
    }

    #[test]
    fn test_waits_for_dispatch_loop() {
        let (tally, mut receiver) = tally(2);
        tally.begin_dispatch();
        tally.record_success(&copy("r1"));

        // dispatch loop still holds its slot
        assert!(receiver.try_recv().is_err());

        tally.dispatch_complete();
        let result = receiver.try_recv().unwrap().unwrap();
        assert_eq!(result.shard_info().unwrap().successful(), 2);
    }

    #[test]
    fn test_failure_recorded_with_copy() {
        let (tally, mut receiver) = tally(3);
        tally.begin_dispatch();
        tally.begin_dispatch();
        tally.dispatch_complete();
        tally.record_failure(&copy("r1"), &ReplicationError::Flush("io".into()));
        tally.record_success(&copy("r2"));

        let result = receiver.try_recv().unwrap().unwrap();
        let info = result.shard_info().unwrap();
        assert_eq!((info.total(), info.successful(), info.failed()), (3, 2, 1));
        assert_eq!(info.failures()[0].allocation_id, AllocationId::new("r1"));
        assert_eq!(
            tally.outcomes().get(&AllocationId::new("r1")),
            Some(&CopyOutcome::Failed(ReplicationErrorKind::Flush))
        );
    }

    #[test]
    fn test_duplicate_outcome_is_ignored() {
        let (tally, mut receiver) = tally(3);
        tally.begin_dispatch();
        tally.begin_dispatch();
        tally.dispatch_complete();
        tally.record_success(&copy("r1"));
        tally.record_success(&copy("r1"));

        // the duplicate must not stand in for r2
        assert!(receiver.try_recv().is_err());

        tally.record_success(&copy("r2"));
        let result = receiver.try_recv().unwrap().unwrap();
        assert_eq!(result.shard_info().unwrap().successful(), 3);
    }

    #[test]
    fn test_concurrent_updates_finalize_once() {
        let (tally, mut receiver) = tally(17);
        let tally = std::sync::Arc::new(tally);
        for _ in 0..16 {
            tally.begin_dispatch();
        }

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let tally = std::sync::Arc::clone(&tally);
                std::thread::spawn(move || {
                    let target = copy(&format!("r{}", i));
                    if i % 4 == 0 {
                        tally.record_failure(&target, &ReplicationError::CopyFailure("no".into()));
                    } else {
                        tally.record_success(&target);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(receiver.try_recv().is_err());

        tally.dispatch_complete();
        let result = receiver.try_recv().unwrap().unwrap();
        let info = result.shard_info().unwrap();
        assert_eq!(info.successful(), 13);
        assert_eq!(info.failed(), 4);
    }
}
