//! Per-worker statistics for a pool run.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters for one worker.
///
/// Every item a worker dequeues ends up in exactly one of `skipped`,
/// `emitted` or `dropped`; `succeeded`, `failed` and `panicked` classify the
/// results the callback produced (whether or not they were delivered).
#[derive(Debug, Default)]
pub struct WorkerStats {
    items_processed: AtomicU64,
    results_succeeded: AtomicU64,
    results_failed: AtomicU64,
    results_panicked: AtomicU64,
    items_skipped: AtomicU64,
    results_emitted: AtomicU64,
    results_dropped: AtomicU64,
    busy_time_us: AtomicU64,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_invocation(&self, elapsed: Duration) {
        self.items_processed.fetch_add(1, Ordering::Relaxed);
        self.busy_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.results_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.results_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_panic(&self) {
        self.results_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skip(&self) {
        self.items_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_emitted(&self) {
        self.results_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.results_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Items for which the callback was invoked
    pub fn items_processed(&self) -> u64 {
        self.items_processed.load(Ordering::Relaxed)
    }

    /// Results delivered to the output stream
    pub fn results_emitted(&self) -> u64 {
        self.results_emitted.load(Ordering::Relaxed)
    }

    /// Contained panics
    pub fn results_panicked(&self) -> u64 {
        self.results_panicked.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            workers: 1,
            items_processed: self.items_processed.load(Ordering::Relaxed),
            results_succeeded: self.results_succeeded.load(Ordering::Relaxed),
            results_failed: self.results_failed.load(Ordering::Relaxed),
            results_panicked: self.results_panicked.load(Ordering::Relaxed),
            items_skipped: self.items_skipped.load(Ordering::Relaxed),
            results_emitted: self.results_emitted.load(Ordering::Relaxed),
            results_dropped: self.results_dropped.load(Ordering::Relaxed),
            busy_time_us: self.busy_time_us.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of one or more workers' counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Number of workers aggregated into this snapshot
    pub workers: usize,
    /// Items for which the callback was invoked
    pub items_processed: u64,
    /// Callback returned a success
    pub results_succeeded: u64,
    /// Callback returned a reported failure
    pub results_failed: u64,
    /// Callback panicked
    pub results_panicked: u64,
    /// Callback returned nothing
    pub items_skipped: u64,
    /// Results delivered to the output stream
    pub results_emitted: u64,
    /// Results discarded because the run was cancelled or the consumer left
    pub results_dropped: u64,
    /// Total time spent inside callbacks (microseconds)
    pub busy_time_us: u64,
}

impl StatsSnapshot {
    /// Sum snapshots of several workers
    pub fn aggregate<'a, I>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = &'a StatsSnapshot>,
    {
        snapshots
            .into_iter()
            .fold(StatsSnapshot::default(), |acc, s| StatsSnapshot {
                workers: acc.workers + s.workers,
                items_processed: acc.items_processed + s.items_processed,
                results_succeeded: acc.results_succeeded + s.results_succeeded,
                results_failed: acc.results_failed + s.results_failed,
                results_panicked: acc.results_panicked + s.results_panicked,
                items_skipped: acc.items_skipped + s.items_skipped,
                results_emitted: acc.results_emitted + s.results_emitted,
                results_dropped: acc.results_dropped + s.results_dropped,
                busy_time_us: acc.busy_time_us + s.busy_time_us,
            })
    }

    /// Average time per callback invocation in microseconds
    pub fn average_busy_time_us(&self) -> f64 {
        if self.items_processed > 0 {
            self.busy_time_us as f64 / self.items_processed as f64
        } else {
            0.0
        }
    }
}
