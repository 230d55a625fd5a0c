//! Progress reporter implementation
//!
//! Three output modes:
//!
//! - bar: an indicatif progress bar whose length grows as the producer
//!   discovers items
//! - verbose: one plain text line per completed item,
//!   `[<completed>/<totalKnown>] <identifier> <outcome>`
//! - disabled: counters only, no output (quiet mode and tests)
//!
//! Counters are atomic; the producer bumps the known total while the
//! coordinator records outcomes.

use crate::core::OutcomeKind;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Output mode of a [`ProgressReporter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Disabled,
    Bar,
    Verbose,
}

/// Progress reporter for migration runs
pub struct ProgressReporter {
    mode: Mode,
    bar: Option<ProgressBar>,
    start_time: Instant,
    /// Items the producer has enqueued so far
    total_known: AtomicU64,
    added: AtomicU64,
    skipped: AtomicU64,
    errored: AtomicU64,
}

impl ProgressReporter {
    /// Create a reporter with an aggregate progress bar
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} items ({per_sec}) {msg}")
                .expect("Invalid template")
                .progress_chars("=> "),
        );
        bar.set_prefix("Items");

        Self {
            mode: Mode::Bar,
            bar: Some(bar),
            start_time: Instant::now(),
            total_known: AtomicU64::new(0),
            added: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            errored: AtomicU64::new(0),
        }
    }

    /// Create a reporter that prints one line per completed item
    pub fn verbose() -> Self {
        Self {
            mode: Mode::Verbose,
            bar: None,
            start_time: Instant::now(),
            total_known: AtomicU64::new(0),
            added: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            errored: AtomicU64::new(0),
        }
    }

    /// Create a silent reporter (for quiet mode)
    pub fn disabled() -> Self {
        Self {
            mode: Mode::Disabled,
            bar: None,
            start_time: Instant::now(),
            total_known: AtomicU64::new(0),
            added: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            errored: AtomicU64::new(0),
        }
    }

    /// Grow the known item total by `count` newly enqueued items
    pub fn add_known(&self, count: u64) {
        self.total_known.fetch_add(count, Ordering::Relaxed);
        if let Some(bar) = &self.bar {
            bar.inc_length(count);
        }
    }

    /// Record one completed item
    pub fn record(&self, identifier: &str, kind: OutcomeKind) {
        let counter = match kind {
            OutcomeKind::Added => &self.added,
            OutcomeKind::Skipped => &self.skipped,
            OutcomeKind::Errored => &self.errored,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        match self.mode {
            Mode::Verbose => {
                println!(
                    "[{}/{}] {} {}",
                    self.completed(),
                    self.total_known.load(Ordering::Relaxed),
                    identifier,
                    kind
                );
            }
            Mode::Bar => {
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                    bar.set_message(identifier.to_string());
                }
            }
            Mode::Disabled => {}
        }
    }

    /// Number of items with a terminal outcome
    pub fn completed(&self) -> u64 {
        self.added.load(Ordering::Relaxed)
            + self.skipped.load(Ordering::Relaxed)
            + self.errored.load(Ordering::Relaxed)
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Snapshot of the current counters
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            total_known: self.total_known.load(Ordering::Relaxed),
            added: self.added.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
        }
    }

    /// Stop rendering the progress bar, if any
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress counter snapshot
#[derive(Debug, Clone)]
pub struct ProgressSummary {
    /// Items enqueued by the producer so far
    pub total_known: u64,
    /// Items copied to the destination
    pub added: u64,
    /// Items that already existed on the destination
    pub skipped: u64,
    /// Items with a terminal error
    pub errored: u64,
    /// Time since the reporter was created
    pub elapsed: Duration,
}

impl ProgressSummary {
    /// Number of items with a terminal outcome
    pub fn completed(&self) -> u64 {
        self.added + self.skipped + self.errored
    }
}
