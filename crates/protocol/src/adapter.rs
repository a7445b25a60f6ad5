//! Adapter capabilities
//!
//! Sources are pulled by the collector's read loop; sinks are pushed to by
//! the write loop. Both share the same lifecycle:
//!
//! ```text
//! configure() -> start() -> [read() | write()/flush()]* -> stop()
//! ```
//!
//! `configure` and `start` failures are fatal at startup. `write` and
//! `flush` never fail the pipeline: adapters log and drop internally.

use async_trait::async_trait;
use thiserror::Error;

use crate::sample::MetricSample;

/// Errors raised by adapters during setup
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Invalid or inconsistent adapter settings
    #[error("{adapter}: invalid configuration: {message}")]
    Config { adapter: String, message: String },

    /// Adapter could not acquire its resources (socket, connection, ...)
    #[error("{adapter}: failed to start: {message}")]
    Start { adapter: String, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    /// Create a configuration error
    pub fn config(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    /// Create a start error
    pub fn start(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Start {
            adapter: adapter.into(),
            message: message.into(),
        }
    }
}

/// Pull-based metric source
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Validate settings and build internal state
    async fn configure(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Acquire resources (sockets, background tasks)
    async fn start(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Release resources; must be safe to call more than once
    async fn stop(&mut self) {}

    /// Samples produced since the previous call, possibly none
    async fn read(&mut self) -> Vec<MetricSample>;
}

/// Push-based metric sink
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Validate settings and build internal state
    async fn configure(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Acquire resources (connections, clients)
    async fn start(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Flush and release resources; must be safe to call more than once
    async fn stop(&mut self) {}

    /// Buffer or deliver one sample
    async fn write(&mut self, sample: &MetricSample);

    /// Deliver anything buffered
    async fn flush(&mut self) {}
}
