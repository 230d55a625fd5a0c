//! Progress reporting module
//!
//! Provides per-item progress lines, an aggregate progress bar, and the
//! final migration summary counters.

mod reporter;

pub use reporter::*;
