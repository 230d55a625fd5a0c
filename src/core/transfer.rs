//! Per-item transfer state machine
//!
//! One [`TransferTask`] is created per [`WorkItem`] inside a worker, runs the
//! four transfer steps strictly in order, and is discarded after producing a
//! single [`TransferOutcome`]. Store failures never escape the task; they
//! become the item's terminal `Errored` outcome.

use crate::error::FerryError;
use crate::store::StoreClient;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One unit of transfer work: an item identifier plus its format extension
///
/// Produced once by the producer per source item and consumed exactly once
/// by a worker. Serializable because it crosses the coordinator/worker
/// message boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Store-assigned identifier of the image
    pub identifier: String,
    /// Original format extension, applied to the source URL on copy
    pub extension: String,
}

impl WorkItem {
    /// Create a work item
    pub fn new(identifier: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            extension: extension.into(),
        }
    }
}

/// Terminal outcome kind of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    /// Copied to the destination, metadata replicated
    Added,
    /// Already present on the destination
    Skipped,
    /// A transfer step failed
    Errored,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Added => write!(f, "added"),
            OutcomeKind::Skipped => write!(f, "skipped"),
            OutcomeKind::Errored => write!(f, "errored"),
        }
    }
}

/// Result message a worker sends back for one item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    /// Terminal outcome kind
    pub kind: OutcomeKind,
    /// Identifier of the item the outcome belongs to
    pub identifier: String,
    /// Error detail for `Errored` outcomes, rendered to a string
    pub error: Option<String>,
}

impl TransferOutcome {
    /// Outcome for a freshly copied item
    pub fn added(identifier: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Added,
            identifier: identifier.into(),
            error: None,
        }
    }

    /// Outcome for an item that already existed on the destination
    pub fn skipped(identifier: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Skipped,
            identifier: identifier.into(),
            error: None,
        }
    }

    /// Outcome for a failed transfer step
    pub fn errored(identifier: impl Into<String>, error: &FerryError) -> Self {
        Self {
            kind: OutcomeKind::Errored,
            identifier: identifier.into(),
            error: Some(error.to_string()),
        }
    }
}

/// States of the per-item transfer, in execution order
///
/// Each state is entered on the previous step's success; any failure short
/// of `ReplaceMetadata` terminates the machine with an `Errored` outcome.
#[derive(Debug)]
pub enum TransferStep {
    /// Ask the destination whether the item already exists
    CheckExisting,
    /// Ingest the item into the destination from the source URL
    CopyItem,
    /// Read the metadata attached to the freshly copied item
    FetchMetadata {
        /// Identifier the destination assigned on ingestion
        destination: String,
    },
    /// Write the metadata back onto the destination item
    ReplaceMetadata {
        /// Identifier the destination assigned on ingestion
        destination: String,
        /// Metadata payload read in the previous step
        metadata: serde_json::Value,
    },
}

/// Per-item state machine executed inside a worker
pub struct TransferTask<'a> {
    item: WorkItem,
    source: &'a dyn StoreClient,
    destination: &'a dyn StoreClient,
}

impl<'a> TransferTask<'a> {
    /// Create a task for one work item
    pub fn new(item: WorkItem, source: &'a dyn StoreClient, destination: &'a dyn StoreClient) -> Self {
        Self {
            item,
            source,
            destination,
        }
    }

    /// Drive the state machine to its terminal outcome
    ///
    /// An existence-check failure terminates as `Errored`; it is never
    /// retried as a copy. Copy and metadata failures after a successful
    /// existence check surface as
    /// [`FerryError::ItemNotTransferable`](crate::error::FerryError::ItemNotTransferable).
    pub async fn run(self) -> TransferOutcome {
        let identifier = self.item.identifier.clone();
        let mut step = TransferStep::CheckExisting;

        loop {
            step = match step {
                TransferStep::CheckExisting => {
                    match self.destination.image_exists(&identifier).await {
                        Ok(true) => return TransferOutcome::skipped(identifier),
                        Ok(false) => TransferStep::CopyItem,
                        Err(err) => return TransferOutcome::errored(&identifier, &err),
                    }
                }

                TransferStep::CopyItem => {
                    let url = self.source.image_url(&identifier, &self.item.extension);
                    match self.destination.add_image_from_url(&url).await {
                        Ok(destination) => TransferStep::FetchMetadata { destination },
                        Err(err) => {
                            let err = FerryError::not_transferable(&identifier, err.to_string());
                            return TransferOutcome::errored(&identifier, &err);
                        }
                    }
                }

                TransferStep::FetchMetadata { destination } => {
                    match self.destination.image_metadata(&destination).await {
                        Ok(metadata) => TransferStep::ReplaceMetadata {
                            destination,
                            metadata,
                        },
                        Err(err) => {
                            let err = FerryError::not_transferable(&identifier, err.to_string());
                            return TransferOutcome::errored(&identifier, &err);
                        }
                    }
                }

                TransferStep::ReplaceMetadata {
                    destination,
                    metadata,
                } => match self.destination.replace_metadata(&destination, &metadata).await {
                    Ok(()) => return TransferOutcome::added(identifier),
                    Err(err) => {
                        let err = FerryError::not_transferable(&identifier, err.to_string());
                        return TransferOutcome::errored(&identifier, &err);
                    }
                },
            };
        }
    }
}
