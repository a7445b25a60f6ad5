//! meterd Protocol - Core types shared by every meterd component
//!
//! This crate provides the foundational types that flow through the pipeline:
//! - `MetricSample` - One normalized observation (host/plugin/type + values)
//! - `TypesDb` - Immutable catalog of data-source definitions per type name
//! - `DsKind` / `DataSource` - Value kinds and bounds used for rate computation
//! - `MetricSource` / `MetricSink` - Capabilities implemented by adapters
//!
//! # Design Principles
//!
//! - **Explicit catalog**: `TypesDb` is loaded once and shared as `Arc<TypesDb>`,
//!   there is no process-wide instance
//! - **Owned samples**: samples are plain owned data, cheap to clone for
//!   the rate cache and safe to move between tasks
//! - **Transport agnostic JSON**: `MetricSample::to_json` is the one wire
//!   rendering used by every network sink
//!
//! # Example
//!
//! ```
//! use meterd_protocol::{MetricSample, TypesDb};
//!
//! let types = TypesDb::parse("percent value:GAUGE:0:100.1");
//! let sample = MetricSample::new("host-1", "cpu", "percent").with_values(vec![12.5]);
//!
//! assert_eq!(sample.key(), "host-1.cpu..percent.");
//! assert!(sample.to_json(&types).unwrap().contains("\"dstypes\":[\"gauge\"]"));
//! ```

mod adapter;
mod error;
mod sample;
mod types_db;

pub use adapter::{AdapterError, MetricSink, MetricSource};
pub use error::ProtocolError;
pub use sample::{MetricSample, now_epoch, round_epoch};
pub use types_db::{DataSource, DsKind, TypesDb};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Plugin name carried by every sample the StatsD engine emits
pub const STATSD_PLUGIN: &str = "statsd";

// Test modules - only compiled during testing
#[cfg(test)]
mod adapter_test;
