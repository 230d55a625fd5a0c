//! Admission control module
//!
//! Provides the bounded-concurrency dispatcher that gates how many
//! transfer operations may be outstanding at once.

mod admission;

pub use admission::*;
