//! Progress logging for long read loops.
//!
//! FASTQ inputs routinely run to millions of records, so the readers log a
//! milestone message every `interval` items. The tracker is an atomic counter
//! and may be shared across threads.

use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

use crate::metrics::format_count;

/// Thread-safe counter that logs a message at interval milestones.
///
/// # Example
/// ```
/// use denada_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Read").with_interval(100);
/// for _ in 0..250 {
///     tracker.record(1); // logs "Read 100 records", "Read 200 records"
/// }
/// tracker.log_final(); // logs "Read 250 records (done)"
/// assert_eq!(tracker.count(), 250);
/// ```
pub struct ProgressTracker {
    interval: u64,
    message: String,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Creates a tracker with the given message prefix and the default
    /// interval of 100,000 records.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: 100_000, message: message.into(), count: AtomicU64::new(0) }
    }

    /// Sets the milestone interval.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds `additional` to the count, logging once per milestone crossed.
    ///
    /// A single atomic add makes this safe under concurrent callers; each
    /// milestone is logged by exactly one of them.
    pub fn record(&self, additional: u64) {
        if additional == 0 {
            return;
        }
        let prev = self.count.fetch_add(additional, Ordering::Relaxed);
        let new_count = prev + additional;

        for i in (prev / self.interval + 1)..=(new_count / self.interval) {
            info!("{} {} records", self.message, format_count(i * self.interval));
        }
    }

    /// Logs the final count unless the last `record` call already logged it
    /// as a milestone.
    pub fn log_final(&self) {
        let count = self.count.load(Ordering::Relaxed);
        if count > 0 && !count.is_multiple_of(self.interval) {
            info!("{} {} records (done)", self.message, format_count(count));
        }
    }

    /// Current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
