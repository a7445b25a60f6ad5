//! Protocol error types
//!
//! Errors that can occur while loading the type catalog or rendering samples.

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Catalog file could not be read
    #[error("failed to read types catalog '{path}': {source}")]
    CatalogRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A catalog line did not match `name ds:kind:min:max[, ...]`
    #[error("invalid types catalog line {line_number}: {reason}")]
    InvalidCatalogLine { line_number: usize, reason: String },

    /// Data source kind is not one of gauge/counter/derive/absolute
    #[error("unknown data source kind: {0}")]
    UnknownDsKind(String),

    /// JSON rendering failed
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Create an invalid catalog line error
    #[inline]
    pub fn invalid_line(line_number: usize, reason: impl Into<String>) -> Self {
        Self::InvalidCatalogLine {
            line_number,
            reason: reason.into(),
        }
    }

    /// Check if this is a recoverable error (the caller can skip the input and continue)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidCatalogLine { .. } | Self::UnknownDsKind(_)
        )
    }
}
