//! Progress tracking for batch jobs.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Point-in-time view of a job's progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
    pub percentage: u32,
}

/// Shared counters for one batch job.
///
/// Clones share the same counters: the scheduler advances one handle while
/// pollers read another.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicUsize,
    total: AtomicUsize,
}

impl ProgressTracker {
    /// Create a tracker for a job of `total` domains.
    pub fn new(total: usize) -> Self {
        let tracker = Self::default();
        tracker.reset(total);
        tracker
    }

    /// Start over with a new total.
    pub fn reset(&self, total: usize) {
        self.inner.processed.store(0, Ordering::SeqCst);
        self.inner.total.store(total, Ordering::SeqCst);
    }

    /// Record one completed domain.
    pub fn advance(&self) {
        self.inner.processed.fetch_add(1, Ordering::SeqCst);
    }

    /// Read the counters. `percentage` rounds to the nearest whole number
    /// and is 0 for an empty job.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let processed = self.inner.processed.load(Ordering::SeqCst);
        let total = self.inner.total.load(Ordering::SeqCst);
        let percentage = if total == 0 {
            0
        } else {
            ((processed as f64 / total as f64) * 100.0).round() as u32
        };
        ProgressSnapshot {
            processed,
            total,
            percentage,
        }
    }
}
