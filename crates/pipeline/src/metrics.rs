//! Collector metrics
//!
//! Atomic counters for the read, write and eviction loops.
//! All operations use relaxed ordering; values are eventually consistent.

use std::sync::atomic::{AtomicU64, Ordering};

/// Number of drops between overflow error logs
pub const DROP_LOG_EVERY: u64 = 1000;

/// Metrics for the collector loops
#[derive(Debug, Default)]
pub struct CollectorMetrics {
    /// Completed read cycles
    read_cycles: AtomicU64,

    /// Samples returned by sources
    samples_read: AtomicU64,

    /// Samples evicted from a full queue
    samples_dropped: AtomicU64,

    /// Samples handed to sinks (counted once per sample, not per sink)
    samples_written: AtomicU64,

    /// Samples that bypassed rate conversion (unknown type or value count mismatch)
    rate_skipped: AtomicU64,

    /// Flush rounds across all sinks
    flushes: AtomicU64,

    /// Rate cache entries removed by the eviction loop
    entries_expired: AtomicU64,
}

impl CollectorMetrics {
    #[inline]
    pub const fn new() -> Self {
        Self {
            read_cycles: AtomicU64::new(0),
            samples_read: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
            samples_written: AtomicU64::new(0),
            rate_skipped: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            entries_expired: AtomicU64::new(0),
        }
    }

    /// Record one read cycle and the samples it produced
    #[inline]
    pub fn record_read(&self, samples: u64) {
        self.read_cycles.fetch_add(1, Ordering::Relaxed);
        self.samples_read.fetch_add(samples, Ordering::Relaxed);
    }

    /// Record overflow evictions
    ///
    /// Logs at error level each time the running total crosses a multiple
    /// of `DROP_LOG_EVERY`. Returns true if a log was emitted.
    pub fn record_dropped(&self, count: u64) -> bool {
        if count == 0 {
            return false;
        }
        let before = self.samples_dropped.fetch_add(count, Ordering::Relaxed);
        let after = before + count;

        if after / DROP_LOG_EVERY > before / DROP_LOG_EVERY {
            tracing::error!(
                dropped_total = after,
                "sample queue full, oldest samples dropped"
            );
            return true;
        }
        false
    }

    #[inline]
    pub fn record_written(&self) {
        self.samples_written.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rate_skipped(&self) {
        self.rate_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_expired(&self, entries: u64) {
        self.entries_expired.fetch_add(entries, Ordering::Relaxed);
    }

    /// Get a point-in-time snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            read_cycles: self.read_cycles.load(Ordering::Relaxed),
            samples_read: self.samples_read.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            samples_written: self.samples_written.load(Ordering::Relaxed),
            rate_skipped: self.rate_skipped.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            entries_expired: self.entries_expired.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of collector metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub read_cycles: u64,
    pub samples_read: u64,
    pub samples_dropped: u64,
    pub samples_written: u64,
    pub rate_skipped: u64,
    pub flushes: u64,
    pub entries_expired: u64,
}
