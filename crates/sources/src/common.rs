//! Common types and utilities for sources
//!
//! Shared functionality across all source types (StatsD, performance counters).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics shared by all source types
#[derive(Debug, Default)]
pub struct SourceMetrics {
    /// Datagrams received (network sources)
    pub datagrams_received: AtomicU64,

    /// Payload bytes received (network sources)
    pub bytes_received: AtomicU64,

    /// Lines accepted by the parser
    pub lines_parsed: AtomicU64,

    /// Lines rejected by the parser
    pub lines_rejected: AtomicU64,

    /// Samples handed to the collector by `read`
    pub samples_emitted: AtomicU64,

    /// Receive or provider errors
    pub errors: AtomicU64,
}

impl SourceMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            datagrams_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            lines_parsed: AtomicU64::new(0),
            lines_rejected: AtomicU64::new(0),
            samples_emitted: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Record received datagram
    #[inline]
    pub fn datagram_received(&self, bytes: u64) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record parse outcome for one message
    #[inline]
    pub fn lines(&self, parsed: u64, rejected: u64) {
        self.lines_parsed.fetch_add(parsed, Ordering::Relaxed);
        self.lines_rejected.fetch_add(rejected, Ordering::Relaxed);
    }

    #[inline]
    pub fn samples_emitted(&self, count: u64) {
        self.samples_emitted.fetch_add(count, Ordering::Relaxed);
    }

    /// Record error
    #[inline]
    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            lines_parsed: self.lines_parsed.load(Ordering::Relaxed),
            lines_rejected: self.lines_rejected.load(Ordering::Relaxed),
            samples_emitted: self.samples_emitted.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub datagrams_received: u64,
    pub bytes_received: u64,
    pub lines_parsed: u64,
    pub lines_rejected: u64,
    pub samples_emitted: u64,
    pub errors: u64,
}

/// Handle for reading source metrics while the source runs
#[derive(Clone)]
pub struct SourceMetricsHandle {
    name: String,
    metrics: Arc<SourceMetrics>,
}

impl SourceMetricsHandle {
    pub(crate) fn new(name: impl Into<String>, metrics: Arc<SourceMetrics>) -> Self {
        Self {
            name: name.into(),
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
