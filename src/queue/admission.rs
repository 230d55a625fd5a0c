//! Bounded-concurrency admission queue
//!
//! A pure flow-control primitive: items are held in FIFO order and handed
//! to a handler only while fewer than `capacity` handler invocations are
//! outstanding. The handler receives a [`SlotRelease`] continuation and must
//! eventually consume it to free the slot; a dropped continuation loses the
//! slot for the lifetime of the queue.
//!
//! Dispatch runs as an explicit work-conserving loop: after every enqueue or
//! slot release, as many pending items as the free capacity allows are
//! admitted, not just one. The loop is flattened so that a handler which
//! releases its slot synchronously does not grow the call stack.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

type Handler<T> = Box<dyn Fn(T, SlotRelease) + Send + Sync>;

struct QueueState<T> {
    /// Items waiting for a free slot, oldest first
    pending: VecDeque<T>,
    /// Handler invocations whose slot has not been released yet
    in_flight: usize,
    /// Set while a dispatch loop is draining the queue on some stack
    dispatching: bool,
}

/// Bounded-concurrency dispatcher
///
/// Holds pending items and releases them to the supplied handler only while
/// fewer than `capacity` invocations are outstanding. The queue carries no
/// result values; success or failure of the handler is opaque to it.
pub struct AdmissionQueue<T> {
    state: Mutex<QueueState<T>>,
    capacity: usize,
    handler: Handler<T>,
    /// Self-reference handed to release continuations
    this: Weak<AdmissionQueue<T>>,
}

impl<T: Send + 'static> AdmissionQueue<T> {
    /// Create a queue bound to a capacity and an asynchronous handler
    ///
    /// `capacity` must be at least 1. The handler is invoked with the oldest
    /// pending item whenever a slot is free, on the thread that freed the
    /// slot (or enqueued the item).
    pub fn new<F>(capacity: usize, handler: F) -> Arc<Self>
    where
        F: Fn(T, SlotRelease) + Send + Sync + 'static,
    {
        assert!(capacity >= 1, "admission queue capacity must be at least 1");

        Arc::new_cyclic(|this| Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                in_flight: 0,
                dispatching: false,
            }),
            capacity,
            handler: Box::new(handler),
            this: this.clone(),
        })
    }

    /// Append an item to the pending sequence and attempt dispatch
    pub fn enqueue(&self, item: T) {
        self.state.lock().unwrap().pending.push_back(item);
        self.dispatch();
    }

    /// Admit as many pending items as the free capacity allows
    ///
    /// Only one dispatch loop runs at a time; a release that fires while a
    /// loop is already draining just frees the slot and lets the active loop
    /// pick it up.
    fn dispatch(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.dispatching {
                return;
            }
            state.dispatching = true;
        }

        loop {
            let item = {
                let mut state = self.state.lock().unwrap();
                if state.in_flight == self.capacity {
                    state.dispatching = false;
                    return;
                }
                match state.pending.pop_front() {
                    Some(item) => {
                        state.in_flight += 1;
                        item
                    }
                    None => {
                        state.dispatching = false;
                        return;
                    }
                }
            };

            let slot = SlotRelease::new({
                let this = self.this.clone();
                move || {
                    if let Some(queue) = this.upgrade() {
                        queue.release_slot();
                    }
                }
            });

            (self.handler)(item, slot);
        }
    }

    /// Free a slot and re-attempt dispatch
    fn release_slot(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.dispatch();
    }

    /// Maximum number of concurrently outstanding handler invocations
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of handler invocations whose slot is still held
    pub fn in_flight(&self) -> usize {
        self.state.lock().unwrap().in_flight
    }

    /// Number of items waiting for a free slot
    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }
}

/// Consume-once continuation that frees an admission slot
///
/// Handed to the queue handler with every dispatched item. Calling
/// [`release`](Self::release) decrements the in-flight counter and admits
/// further pending items. Dropping it without calling `release` permanently
/// loses the slot.
#[must_use = "dropping a SlotRelease permanently loses its admission slot"]
pub struct SlotRelease {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SlotRelease {
    fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Free the slot, admitting the next pending item if any
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Build a detached continuation, for tests that drive the
    /// coordinator without a queue
    #[cfg(test)]
    pub(crate) fn from_fn(release: impl FnOnce() + Send + 'static) -> Self {
        Self::new(release)
    }
}

impl std::fmt::Debug for SlotRelease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotRelease")
            .field("armed", &self.release.is_some())
            .finish()
    }
}
