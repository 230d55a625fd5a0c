//! Worker tasks
//!
//! Each worker is an independent task with a typed mailbox. It receives one
//! work item at a time from the coordinator, runs the transfer state machine
//! against the store clients, and reports the outcome back over the shared
//! event channel. Workers share no state with the coordinator beyond the
//! message payloads.

use crate::core::{CoordinatorEvent, TransferTask, WorkItem};
use crate::store::StoreClient;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Message from the coordinator to a worker
#[derive(Debug)]
pub enum WorkerCommand {
    /// Transfer one item
    Transfer(WorkItem),
    /// Stop the worker's message loop
    Shutdown,
}

/// Coordinator-side handle to one worker
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    id: usize,
    sender: mpsc::UnboundedSender<WorkerCommand>,
}

impl WorkerHandle {
    /// Create a handle around a worker's mailbox sender
    pub fn new(id: usize, sender: mpsc::UnboundedSender<WorkerCommand>) -> Self {
        Self { id, sender }
    }

    /// Pool index of the worker
    pub fn id(&self) -> usize {
        self.id
    }

    /// Send a command to the worker's mailbox
    pub fn send(&self, command: WorkerCommand) {
        if self.sender.send(command).is_err() {
            error!("worker {} mailbox closed, command dropped", self.id);
        }
    }
}

/// Spawn a worker task and return its handle plus join handle
pub fn spawn_worker(
    id: usize,
    source: Arc<dyn StoreClient>,
    destination: Arc<dyn StoreClient>,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
) -> (WorkerHandle, JoinHandle<()>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let join = tokio::spawn(worker_loop(id, source, destination, events, receiver));
    (WorkerHandle::new(id, sender), join)
}

/// Mailbox loop of one worker
async fn worker_loop(
    id: usize,
    source: Arc<dyn StoreClient>,
    destination: Arc<dyn StoreClient>,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    mut mailbox: mpsc::UnboundedReceiver<WorkerCommand>,
) {
    while let Some(command) = mailbox.recv().await {
        match command {
            WorkerCommand::Transfer(item) => {
                let outcome = TransferTask::new(item, &*source, &*destination).run().await;
                if events
                    .send(CoordinatorEvent::WorkerResult {
                        worker: id,
                        outcome,
                    })
                    .is_err()
                {
                    // Coordinator is gone, no point processing further items
                    break;
                }
            }
            WorkerCommand::Shutdown => break,
        }
    }
    debug!("worker {} stopped", id);
}
