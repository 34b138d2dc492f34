//! Pipeline metrics
//!
//! Atomic counters shared by every run of a processor.
//! All operations use relaxed ordering; values are eventually consistent.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a processor and every chain started from it
///
/// Clones of a `Processor` (and processors extended from it) share one
/// instance. Counters only observe; they never carry accumulator state
/// between runs.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Chains started (start, start_multiple, collect, group_by)
    runs_started: AtomicU64,

    /// Chunks delivered by sources into chain heads
    chunks_ingested: AtomicU64,

    /// Chunks dropped by filter stages
    chunks_filtered: AtomicU64,

    /// Transform functions that failed or panicked
    transform_failures: AtomicU64,

    /// Error signals raised by sources
    upstream_failures: AtomicU64,
}

impl PipelineMetrics {
    /// Create new metrics instance with all counters at zero
    #[inline]
    pub const fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            chunks_ingested: AtomicU64::new(0),
            chunks_filtered: AtomicU64::new(0),
            transform_failures: AtomicU64::new(0),
            upstream_failures: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_ingested(&self) {
        self.chunks_ingested.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_filtered(&self) {
        self.chunks_filtered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_transform_failure(&self) {
        self.transform_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    ///
    /// Returns a point-in-time copy of all counters.
    #[inline]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            chunks_ingested: self.chunks_ingested.load(Ordering::Relaxed),
            chunks_filtered: self.chunks_filtered.load(Ordering::Relaxed),
            transform_failures: self.transform_failures.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.runs_started.store(0, Ordering::Relaxed);
        self.chunks_ingested.store(0, Ordering::Relaxed);
        self.chunks_filtered.store(0, Ordering::Relaxed);
        self.transform_failures.store(0, Ordering::Relaxed);
        self.upstream_failures.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time snapshot of pipeline metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub runs_started: u64,
    pub chunks_ingested: u64,
    pub chunks_filtered: u64,
    pub transform_failures: u64,
    pub upstream_failures: u64,
}

impl MetricsSnapshot {
    /// Total failures of any kind
    #[inline]
    pub fn failures(&self) -> u64 {
        self.transform_failures + self.upstream_failures
    }
}
