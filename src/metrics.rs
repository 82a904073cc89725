// Batch metrics module
//
// Lock-free outcome counters updated by rename workers

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Outcome counters for one batch
///
/// Workers record their outcome with relaxed atomic increments; the totals are
/// only read once the aggregator has seen every job complete.
#[derive(Debug)]
pub struct BatchMetrics {
    /// Files renamed on disk
    pub renamed: AtomicUsize,

    /// Files whose target name equals their current name
    pub unchanged: AtomicUsize,

    /// Files with no tag from either heuristic (including unreadable archives)
    pub unclassified: AtomicUsize,

    /// Files whose rename failed
    pub failed: AtomicUsize,

    start_time: Instant,
}

/// Snapshot of [`BatchMetrics`] at the end of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub renamed: usize,
    pub unchanged: usize,
    pub unclassified: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.renamed + self.unchanged + self.unclassified + self.failed
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed: {} renamed, {} unchanged, {} without tag, {} failed ({:.2}s)",
            self.processed(),
            self.renamed,
            self.unchanged,
            self.unclassified,
            self.failed,
            self.elapsed.as_secs_f64()
        )
    }
}

impl BatchMetrics {
    pub fn new() -> Self {
        Self {
            renamed: AtomicUsize::new(0),
            unchanged: AtomicUsize::new(0),
            unclassified: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_renamed(&self) {
        self.renamed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unchanged(&self) {
        self.unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unclassified(&self) {
        self.unclassified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            renamed: self.renamed.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            unclassified: self.unclassified.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let summary = self.summary();
        tracing::info!("=== Batch Summary ===");
        tracing::info!(
            "Files: {} renamed, {} unchanged, {} without tag, {} failed",
            summary.renamed,
            summary.unchanged,
            summary.unclassified,
            summary.failed
        );
        tracing::info!("Elapsed: {:.2}s", summary.elapsed.as_secs_f64());
    }
}

impl Default for BatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}
