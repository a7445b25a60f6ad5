//! meterd - Pipeline
//!
//! The collector that connects sources to sinks through a bounded queue.
//!
//! # Architecture
//!
//! ```text
//! [Sources]                                                   [Sinks]
//!    statsd ────┐                                          ┌──→ write_http
//!               ├──→ MetricQueue ──→ RateAggregator ──→ ───┤
//!    perf ──────┘    (drop oldest)    (per-series cache)   └──→ amqp
//! ```
//!
//! # Key Design
//!
//! - **Three loops**: read (every interval), write (continuous), evict (every timeout)
//! - **Bounded queue**: overflow evicts the oldest sample, drops are counted
//! - **In-place rates**: counter/derive/absolute values rewritten before delivery
//! - **Adapter ownership**: loops own the adapters while running and hand
//!   them back on stop
//!
//! # Example
//!
//! ```ignore
//! use meterd_pipeline::{Collector, CollectorConfig};
//!
//! let mut collector = Collector::new(CollectorConfig::default(), types);
//! collector.add_source(Box::new(statsd));
//! collector.add_sink(Box::new(http));
//!
//! collector.configure().await?;
//! collector.start().await?;
//! // ... wait for shutdown signal
//! collector.stop().await?;
//! ```

mod collector;
mod error;
mod metrics;
mod queue;
mod rate;

pub use collector::{
    BoxedSink, BoxedSource, Collector, CollectorConfig, CollectorMetricsHandle, DEFAULT_IDLE_SLEEP,
};
pub use error::{PipelineError, Result};
pub use metrics::{CollectorMetrics, DROP_LOG_EVERY, MetricsSnapshot};
pub use queue::MetricQueue;
pub use rate::{RateAggregator, RateOutcome};
