//! Observability metrics for filters.
//!
//! Every filter counts the records it kept and suppressed so callers can see
//! how much noise a policy removes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Kept/suppressed counters for one filter.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct FilterMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Total number of records kept
    records_kept: AtomicU64,
    /// Total number of records suppressed
    records_suppressed: AtomicU64,
}

impl FilterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one decision.
    pub(crate) fn record(&self, kept: bool) {
        let counter = if kept {
            &self.inner.records_kept
        } else {
            &self.inner.records_suppressed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records_kept(&self) -> u64 {
        self.inner.records_kept.load(Ordering::Relaxed)
    }

    pub fn records_suppressed(&self) -> u64 {
        self.inner.records_suppressed.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_kept: self.records_kept(),
            records_suppressed: self.records_suppressed(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.records_kept.store(0, Ordering::Relaxed);
        self.inner.records_suppressed.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of filter metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub records_kept: u64,
    pub records_suppressed: u64,
}

impl MetricsSnapshot {
    /// Ratio of suppressed records to all records seen (0.0 to 1.0).
    ///
    /// Returns 0.0 if no records have been processed.
    pub fn suppression_rate(&self) -> f64 {
        let total = self.total_records();
        if total == 0 {
            0.0
        } else {
            self.records_suppressed as f64 / total as f64
        }
    }

    pub fn total_records(&self) -> u64 {
        self.records_kept.saturating_add(self.records_suppressed)
    }
}
