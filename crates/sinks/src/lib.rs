//! meterd - Sinks
//!
//! Output adapters that deliver metric samples to external systems.
//!
//! # Architecture
//!
//! The collector's write loop hands every sample to each started sink in
//! turn and calls `flush` once the queue is drained. Sinks own their
//! buffering and connection handling.
//!
//! ```text
//! [Collector write loop] --&MetricSample--> [Sink] --> [Destination]
//! ```
//!
//! # Available Sinks
//!
//! | Sink | Destination | Buffering |
//! |------|-------------|-----------|
//! | `write_http` | HTTP endpoints, JSON array per POST | Batch per node |
//! | `amqp` | AMQP exchange, one message per sample | None |
//!
//! # Example
//!
//! ```ignore
//! use meterd_sinks::write_http::{HttpNodeSettings, WriteHttpSink, WriteHttpSinkConfig};
//!
//! let node = HttpNodeSettings::new("primary", "http://metrics.local/post");
//! let sink = WriteHttpSink::new(WriteHttpSinkConfig::new(vec![node]), types);
//!
//! collector.add_sink(Box::new(sink));
//! ```

// =============================================================================
// Sink implementations (each in its own submodule)
// =============================================================================

/// HTTP sink - JSON batches over POST
pub mod write_http;

/// AMQP sink - one message per sample
pub mod amqp;

// =============================================================================
// Shared utilities
// =============================================================================

/// Rate-limited error logging
pub mod util;

/// Common types shared by all sinks (errors, metrics)
mod common;

// =============================================================================
// Public re-exports
// =============================================================================

pub use common::{MetricsSnapshot, SinkError, SinkMetrics, SinkMetricsHandle};

pub use amqp::{AmqpSink, AmqpSinkConfig, AmqpTransport, LapinTransport};
pub use write_http::{HttpNodeSettings, ProxyMode, WriteHttpSink, WriteHttpSinkConfig};
