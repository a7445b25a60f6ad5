//! Common types for sinks
//!
//! Shared metrics and errors for the HTTP and AMQP sinks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

/// Metrics shared by all sink types
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Samples handed to `write`
    pub samples_received: AtomicU64,

    /// Requests or messages delivered
    pub batches_sent: AtomicU64,

    /// Samples inside delivered batches
    pub samples_sent: AtomicU64,

    /// Body bytes delivered
    pub bytes_sent: AtomicU64,

    /// Failed deliveries (batch dropped)
    pub write_errors: AtomicU64,

    /// Flush operations performed
    pub flush_count: AtomicU64,

    /// Successful connects after the first
    pub reconnects: AtomicU64,
}

impl SinkMetrics {
    pub const fn new() -> Self {
        Self {
            samples_received: AtomicU64::new(0),
            batches_sent: AtomicU64::new(0),
            samples_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn sample_received(&self) {
        self.samples_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delivered batch
    #[inline]
    pub fn batch_sent(&self, sample_count: u64, bytes: u64) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.samples_sent.fetch_add(sample_count, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn flush(&self) {
        self.flush_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            samples_sent: self.samples_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            flush_count: self.flush_count.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of sink metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub samples_received: u64,
    pub batches_sent: u64,
    pub samples_sent: u64,
    pub bytes_sent: u64,
    pub write_errors: u64,
    pub flush_count: u64,
    pub reconnects: u64,
}

/// Handle for reading a sink's metrics after it moved into the collector
#[derive(Debug, Clone)]
pub struct SinkMetricsHandle {
    name: String,
    metrics: Arc<SinkMetrics>,
}

impl SinkMetricsHandle {
    pub(crate) fn new(name: impl Into<String>, metrics: Arc<SinkMetrics>) -> Self {
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

/// Common sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// Invalid settings
    #[error("configuration error: {0}")]
    Config(String),

    /// Endpoint unreachable or connection lost
    #[error("connection error: {0}")]
    Connection(String),

    /// Endpoint answered with a non-success status
    #[error("unexpected HTTP status {status}")]
    Status { status: u16, body: String },

    /// Message publish rejected
    #[error("publish failed: {0}")]
    Publish(String),

    /// Sample could not be encoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SinkError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }
}

impl From<meterd_protocol::ProtocolError> for SinkError {
    fn from(e: meterd_protocol::ProtocolError) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod common_test;
