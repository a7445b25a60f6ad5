//! meterd - Sources
//!
//! Source adapters that produce `MetricSample`s for the collector's read loop.
//!
//! # Available Sources
//!
//! - **StatsD** - UDP line protocol listener with per-interval aggregation
//! - **Performance Counter** - Host counters (cpu, memory, network, load)
//!   sampled through a `CounterProvider`
//!
//! # Design Principles
//!
//! - **Pull model**: sources buffer or sample internally; the collector calls
//!   `read()` once per interval
//! - **Async I/O**: socket receive runs on its own `tokio` task, raced against
//!   a cancellation token
//! - **Pluggable providers**: performance counters go through a trait so tests
//!   can serve fixed readings
//!
//! # Example
//!
//! ```ignore
//! use meterd_sources::statsd::{StatsdSource, StatsdSourceConfig};
//!
//! let config = StatsdSourceConfig {
//!     address: "0.0.0.0".into(),
//!     port: 8125,
//!     ..Default::default()
//! };
//!
//! collector.add_source(Box::new(StatsdSource::new(config)));
//! ```

pub mod perf_counter;
pub mod statsd;

mod common;
mod hostname;

pub use common::{MetricsSnapshot, SourceMetrics, SourceMetricsHandle};
pub use hostname::{FALLBACK_HOSTNAME, detect_hostname, resolve_hostname};

pub use perf_counter::{
    CounterProvider, CounterSpec, PerfCounterSource, PerfCounterSourceConfig, SysinfoProvider,
};
pub use statsd::{
    DeletePolicy, StatsdAggregator, StatsdParseError, StatsdSource, StatsdSourceConfig,
    StatsdSourceError, TimerOutputs,
};
