//! # ImageFerry - Parallel Media Store Migration
//!
//! ImageFerry migrates a large collection of images, together with their
//! metadata, from one media store to another. Built in Rust for predictable
//! concurrency, memory safety, and honest error reporting.
//!
//! ## Features
//!
//! - **Fixed Worker Pool**: one independent worker task per CPU by default
//! - **Admission Control**: a bounded number of transfers in flight at once
//! - **Round-Robin Assignment**: even distribution over the whole pool
//! - **Quiescence Detection**: completion only once enumeration is done and
//!   no worker holds unfinished work
//! - **Skip Detection**: images the destination already has are skipped
//! - **Metadata Replication**: every copied image's metadata is replayed
//! - **Partial Results**: an enumeration failure drains to a partial tally
//!
//! ## Quick Start
//!
//! ```no_run
//! use imageferry::config::MigrationConfig;
//! use imageferry::core::MigrationEngine;
//! use imageferry::progress::ProgressReporter;
//! use std::path::Path;
//!
//! # fn main() -> imageferry::error::Result<()> {
//! let config = MigrationConfig::load(Path::new("config.json"))?;
//!
//! let engine = MigrationEngine::new(config)
//!     .with_workers(8)
//!     .with_progress(ProgressReporter::new());
//!
//! let rt = tokio::runtime::Runtime::new().expect("runtime");
//! let result = rt.block_on(engine.execute())?;
//! result.print_summary();
//! # Ok(())
//! # }
//! ```
//!
//! ## Admission Queue
//!
//! The flow-control primitive is reusable on its own:
//!
//! ```
//! use imageferry::queue::AdmissionQueue;
//!
//! let queue = AdmissionQueue::new(2, |item: u32, slot| {
//!     // hand `item` to some asynchronous machinery; call
//!     // `slot.release()` when it finishes to admit the next item
//!     let _ = item;
//!     slot.release();
//! });
//!
//! for i in 0..10 {
//!     queue.enqueue(i);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod progress;
pub mod queue;
pub mod store;

// Re-export commonly used types
pub use config::{CliArgs, MigrationConfig, StoreEndpoint};
pub use core::{MigrationEngine, MigrationResult, Tally, WorkItem};
pub use error::{FerryError, Result};
pub use progress::ProgressReporter;
pub use queue::{AdmissionQueue, SlotRelease};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use imageferry::prelude::*;
    //! ```

    pub use crate::config::{CliArgs, MigrationConfig, StoreEndpoint};
    pub use crate::core::{
        Coordinator, MigrationEngine, MigrationResult, OutcomeKind, Producer, Tally,
        TransferOutcome, TransferTask, WorkItem,
    };
    pub use crate::error::{FerryError, Result};
    pub use crate::progress::{ProgressReporter, ProgressSummary};
    pub use crate::queue::{AdmissionQueue, SlotRelease};
    pub use crate::store::{HttpStoreClient, RemoteImage, StoreClient};
}
