//! Migration coordinator
//!
//! Owns the fixed worker pool, assigns admitted items to workers in
//! round-robin order, tracks one pending completion per worker, tallies
//! outcomes and decides global completion.
//!
//! Completion is exactly the conjunction "the producer has finished
//! enumerating" AND "no worker holds a pending completion", re-evaluated
//! after every worker result and after the producer-done event, since either
//! side can become true independently and out of order. Assignment happens
//! synchronously inside the slot-release path, so the predicate can never
//! observe an admitted item that is not yet recorded against a worker.

use crate::core::{OutcomeKind, TransferOutcome, WorkItem, WorkerCommand, WorkerHandle};
use crate::progress::ProgressReporter;
use crate::queue::SlotRelease;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Event consumed by the coordinator's serialized event loop
#[derive(Debug)]
pub enum CoordinatorEvent {
    /// A worker finished one item
    WorkerResult {
        /// Pool index of the reporting worker
        worker: usize,
        /// Terminal outcome of the item
        outcome: TransferOutcome,
    },
    /// The producer has enumerated every source page it will enumerate
    ProducerDone,
}

/// Monotonic outcome counts for one migration run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Items copied to the destination
    pub added: u64,
    /// Items that already existed on the destination
    pub skipped: u64,
    /// Items with a terminal error
    pub errored: u64,
}

impl Tally {
    /// Total number of items with a terminal outcome
    pub fn completed(&self) -> u64 {
        self.added + self.skipped + self.errored
    }
}

struct CoordinatorState {
    workers: Vec<WorkerHandle>,
    /// Round-robin cursor over the pool
    next: usize,
    /// One optional pending completion per worker; `None` means idle
    pending: Vec<Option<SlotRelease>>,
    /// Set exactly once, false to true
    producer_done: bool,
    tally: Tally,
}

/// Coordinates the worker pool and decides global completion
///
/// Cloneable; all clones share one state record. Every mutation happens
/// either in the serialized event loop or synchronously inside the admission
/// queue's dispatch path.
#[derive(Clone)]
pub struct Coordinator {
    state: Arc<Mutex<CoordinatorState>>,
    progress: Arc<ProgressReporter>,
}

impl Coordinator {
    /// Create a coordinator over a fixed worker pool
    pub fn new(workers: Vec<WorkerHandle>, progress: Arc<ProgressReporter>) -> Self {
        let pending = workers.iter().map(|_| None).collect();
        Self {
            state: Arc::new(Mutex::new(CoordinatorState {
                workers,
                next: 0,
                pending,
                producer_done: false,
                tally: Tally::default(),
            })),
            progress,
        }
    }

    /// Admission queue capacity for a pool of the given size
    ///
    /// One less than the pool, so a just-freed worker can receive new work
    /// without waiting on the queue's own bookkeeping; never below 1.
    pub fn queue_capacity(pool_size: usize) -> usize {
        pool_size.saturating_sub(1).max(1)
    }

    /// Assign an admitted item to the next idle worker
    ///
    /// Round-robin over the full pool, skipping workers that still hold a
    /// pending completion. Because the queue capacity stays below the pool
    /// size, an idle worker always exists, and no worker ever holds two
    /// pending items.
    pub fn assign(&self, item: WorkItem, slot: SlotRelease) {
        let mut state = self.state.lock().unwrap();
        let worker = Self::next_idle_worker(&mut state)
            .expect("admission capacity must stay below the worker pool size");

        debug!("assigning {} to worker {}", item.identifier, worker);
        state.workers[worker].send(WorkerCommand::Transfer(item));
        state.pending[worker] = Some(slot);
    }

    fn next_idle_worker(state: &mut CoordinatorState) -> Option<usize> {
        let pool = state.workers.len();
        for _ in 0..pool {
            let candidate = state.next;
            state.next = (state.next + 1) % pool;
            if state.pending[candidate].is_none() {
                return Some(candidate);
            }
        }
        None
    }

    /// Handle one worker result: tally, release the slot, re-check completion
    ///
    /// Returns whether the run is now complete.
    pub fn on_worker_result(&self, worker: usize, outcome: &TransferOutcome) -> bool {
        let slot = {
            let mut state = self.state.lock().unwrap();
            match outcome.kind {
                OutcomeKind::Added => state.tally.added += 1,
                OutcomeKind::Skipped => state.tally.skipped += 1,
                OutcomeKind::Errored => state.tally.errored += 1,
            }
            state.pending.get_mut(worker).and_then(Option::take)
        };

        if outcome.kind == OutcomeKind::Errored {
            warn!(
                "{} failed - {}",
                outcome.identifier,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
        self.progress.record(&outcome.identifier, outcome.kind);

        // Releasing the slot may synchronously admit and assign the next
        // item, possibly to the worker that just reported.
        if let Some(slot) = slot {
            slot.release();
        }

        self.is_complete()
    }

    /// Record that enumeration is exhausted, re-check completion
    ///
    /// Returns whether the run is now complete.
    pub fn on_producer_done(&self) -> bool {
        self.state.lock().unwrap().producer_done = true;
        self.is_complete()
    }

    /// Global completion predicate
    ///
    /// True only when the producer is done AND every worker is idle. Once
    /// true it can never flip back: `producer_done` is monotonic and no new
    /// assignment can happen without a pending queue item, which the
    /// predicate's truth rules out.
    pub fn is_complete(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.producer_done && state.pending.iter().all(Option::is_none)
    }

    /// Snapshot of the current tally
    pub fn tally(&self) -> Tally {
        self.state.lock().unwrap().tally
    }

    /// Consume coordinator events until the run completes
    ///
    /// Events are processed strictly one at a time in receipt order; this
    /// loop is the only consumer of the channel. On completion every worker
    /// is told to shut down and the final tally is returned.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<CoordinatorEvent>) -> Tally {
        while let Some(event) = events.recv().await {
            let complete = match event {
                CoordinatorEvent::WorkerResult { worker, outcome } => {
                    self.on_worker_result(worker, &outcome)
                }
                CoordinatorEvent::ProducerDone => {
                    debug!("producer done, waiting for in-flight items");
                    self.on_producer_done()
                }
            };

            if complete {
                break;
            }
        }

        self.shutdown_workers();
        let tally = self.tally();
        info!(
            "migration complete: {} added, {} skipped, {} errored",
            tally.added, tally.skipped, tally.errored
        );
        tally
    }

    fn shutdown_workers(&self) {
        let state = self.state.lock().unwrap();
        for worker in &state.workers {
            worker.send(WorkerCommand::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{WorkItem, WorkerCommand};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn stub_pool(size: usize) -> (Vec<WorkerHandle>, Vec<UnboundedReceiver<WorkerCommand>>) {
        let mut handles = Vec::with_capacity(size);
        let mut mailboxes = Vec::with_capacity(size);
        for id in 0..size {
            let (tx, rx) = mpsc::unbounded_channel();
            handles.push(WorkerHandle::new(id, tx));
            mailboxes.push(rx);
        }
        (handles, mailboxes)
    }

    fn coordinator(size: usize) -> (Coordinator, Vec<UnboundedReceiver<WorkerCommand>>) {
        let (handles, mailboxes) = stub_pool(size);
        let coordinator = Coordinator::new(handles, Arc::new(ProgressReporter::disabled()));
        (coordinator, mailboxes)
    }

    fn assigned_item(mailbox: &mut UnboundedReceiver<WorkerCommand>) -> Option<WorkItem> {
        match mailbox.try_recv() {
            Ok(WorkerCommand::Transfer(item)) => Some(item),
            _ => None,
        }
    }

    #[test]
    fn test_queue_capacity_is_pool_minus_one_but_at_least_one() {
        assert_eq!(Coordinator::queue_capacity(1), 1);
        assert_eq!(Coordinator::queue_capacity(2), 1);
        assert_eq!(Coordinator::queue_capacity(8), 7);
    }

    #[test]
    fn test_round_robin_visits_every_worker_before_repeating() {
        let (coordinator, mut mailboxes) = coordinator(4);

        // Capacity for a pool of 4 is 3; assign three items back to back
        for i in 0..3 {
            coordinator.assign(WorkItem::new(format!("img{}", i), "jpg"), SlotRelease::from_fn(|| {}));
        }

        assert_eq!(assigned_item(&mut mailboxes[0]).unwrap().identifier, "img0");
        assert_eq!(assigned_item(&mut mailboxes[1]).unwrap().identifier, "img1");
        assert_eq!(assigned_item(&mut mailboxes[2]).unwrap().identifier, "img2");
        assert!(assigned_item(&mut mailboxes[3]).is_none());

        // Worker 1 finishes; the next assignment still goes to worker 3
        // first, completing the cycle before any repeat
        coordinator.on_worker_result(1, &TransferOutcome::added("img1"));
        coordinator.assign(WorkItem::new("img3", "jpg"), SlotRelease::from_fn(|| {}));
        assert_eq!(assigned_item(&mut mailboxes[3]).unwrap().identifier, "img3");

        coordinator.on_worker_result(0, &TransferOutcome::added("img0"));
        coordinator.assign(WorkItem::new("img4", "jpg"), SlotRelease::from_fn(|| {}));
        assert_eq!(assigned_item(&mut mailboxes[0]).unwrap().identifier, "img4");
    }

    #[test]
    fn test_assignment_skips_busy_workers() {
        let (coordinator, mut mailboxes) = coordinator(3);

        coordinator.assign(WorkItem::new("a", "jpg"), SlotRelease::from_fn(|| {}));
        coordinator.assign(WorkItem::new("b", "jpg"), SlotRelease::from_fn(|| {}));
        assert_eq!(assigned_item(&mut mailboxes[0]).unwrap().identifier, "a");
        assert_eq!(assigned_item(&mut mailboxes[1]).unwrap().identifier, "b");

        // Workers 0 and 1 are busy; worker 1 finishes, then the cursor
        // wraps past busy worker 0 when worker 2 finishes too
        coordinator.on_worker_result(1, &TransferOutcome::added("b"));
        coordinator.assign(WorkItem::new("c", "jpg"), SlotRelease::from_fn(|| {}));
        assert_eq!(assigned_item(&mut mailboxes[2]).unwrap().identifier, "c");

        coordinator.on_worker_result(2, &TransferOutcome::added("c"));
        coordinator.assign(WorkItem::new("d", "jpg"), SlotRelease::from_fn(|| {}));

        // Worker 0 still holds "a", so "d" must land on idle worker 1
        assert!(assigned_item(&mut mailboxes[0]).is_none());
        assert_eq!(assigned_item(&mut mailboxes[1]).unwrap().identifier, "d");
    }

    #[test]
    fn test_completion_requires_both_conjuncts() {
        let (coordinator, _mailboxes) = coordinator(2);

        // Neither side true
        assert!(!coordinator.is_complete());

        // Worker busy, producer not done
        coordinator.assign(WorkItem::new("a", "jpg"), SlotRelease::from_fn(|| {}));
        assert!(!coordinator.is_complete());

        // Producer done, worker still busy
        assert!(!coordinator.on_producer_done());

        // Last result arrives: now complete
        assert!(coordinator.on_worker_result(0, &TransferOutcome::added("a")));
        assert!(coordinator.is_complete());
    }

    #[test]
    fn test_completion_in_opposite_event_order() {
        let (coordinator, _mailboxes) = coordinator(2);

        coordinator.assign(WorkItem::new("a", "jpg"), SlotRelease::from_fn(|| {}));

        // Worker result first, producer-done second
        assert!(!coordinator.on_worker_result(0, &TransferOutcome::skipped("a")));
        assert!(coordinator.on_producer_done());
    }

    #[test]
    fn test_completion_is_monotonic() {
        let (coordinator, _mailboxes) = coordinator(1);

        assert!(coordinator.on_producer_done());
        assert!(coordinator.is_complete());
        assert!(coordinator.is_complete());
    }

    #[test]
    fn test_worker_result_releases_the_stored_slot() {
        let (coordinator, _mailboxes) = coordinator(2);

        let released = Arc::new(AtomicBool::new(false));
        let slot = SlotRelease::from_fn({
            let released = Arc::clone(&released);
            move || released.store(true, Ordering::SeqCst)
        });

        coordinator.assign(WorkItem::new("a", "jpg"), slot);
        assert!(!released.load(Ordering::SeqCst));

        coordinator.on_worker_result(0, &TransferOutcome::added("a"));
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_tally_counts_by_outcome_kind() {
        let (coordinator, _mailboxes) = coordinator(4);

        coordinator.assign(WorkItem::new("a", "jpg"), SlotRelease::from_fn(|| {}));
        coordinator.assign(WorkItem::new("b", "jpg"), SlotRelease::from_fn(|| {}));
        coordinator.assign(WorkItem::new("c", "jpg"), SlotRelease::from_fn(|| {}));

        coordinator.on_worker_result(0, &TransferOutcome::added("a"));
        coordinator.on_worker_result(1, &TransferOutcome::skipped("b"));
        coordinator.on_worker_result(
            2,
            &TransferOutcome::errored("c", &crate::error::FerryError::not_transferable("c", "boom")),
        );

        let tally = coordinator.tally();
        assert_eq!(tally.added, 1);
        assert_eq!(tally.skipped, 1);
        assert_eq!(tally.errored, 1);
        assert_eq!(tally.completed(), 3);
    }

    #[tokio::test]
    async fn test_run_shuts_workers_down_on_completion() {
        let (coordinator, mut mailboxes) = coordinator(2);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        coordinator.assign(WorkItem::new("a", "jpg"), SlotRelease::from_fn(|| {}));
        for mailbox in &mut mailboxes {
            // Drain the transfer command so only shutdowns remain visible
            let _ = mailbox.try_recv();
        }

        events_tx
            .send(CoordinatorEvent::WorkerResult {
                worker: 0,
                outcome: TransferOutcome::added("a"),
            })
            .unwrap();
        events_tx.send(CoordinatorEvent::ProducerDone).unwrap();

        let tally = coordinator.run(events_rx).await;
        assert_eq!(tally.added, 1);

        for mailbox in &mut mailboxes {
            match mailbox.try_recv() {
                Ok(WorkerCommand::Shutdown) => {}
                other => panic!("expected shutdown, got {:?}", other),
            }
        }
    }
}
