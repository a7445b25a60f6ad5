//! Pipeline error types
//!
//! Errors for collector lifecycle operations. Steady-state failures
//! (overflow, sink trouble) are logged and counted, never returned.

use thiserror::Error;

use meterd_protocol::AdapterError;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An adapter failed to configure or start
    #[error("adapter '{name}' failed: {source}")]
    Adapter {
        name: String,
        #[source]
        source: AdapterError,
    },

    /// `start` called twice
    #[error("collector is already running")]
    AlreadyRunning,

    /// `stop` called before `start`
    #[error("collector is not running")]
    NotRunning,

    /// A worker loop panicked or was aborted
    #[error("{worker} loop terminated abnormally: {message}")]
    WorkerFailed {
        worker: &'static str,
        message: String,
    },
}

impl PipelineError {
    pub fn adapter(name: impl Into<String>, source: AdapterError) -> Self {
        Self::Adapter {
            name: name.into(),
            source,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
