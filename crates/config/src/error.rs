//! Configuration error types

use std::io;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Two plugins bind the same UDP address and port
    #[error("port {port} is used by multiple plugins: {plugins}")]
    DuplicatePort { port: u16, plugins: String },

    /// Required field missing
    #[error("{component} '{name}' is missing required field '{field}'")]
    MissingField {
        component: &'static str,
        name: String,
        field: &'static str,
    },

    /// Field present but unusable
    #[error("{component} '{name}' has invalid {field}: {message}")]
    InvalidValue {
        component: &'static str,
        name: String,
        field: &'static str,
        message: String,
    },

    /// No source plugin enabled
    #[error("no sources are enabled - at least one source plugin must be enabled")]
    NoSourcesEnabled,

    /// No sink plugin enabled
    #[error("no sinks are enabled - at least one sink plugin must be enabled")]
    NoSinksEnabled,
}

impl ConfigError {
    pub fn duplicate_port(port: u16, plugins: impl Into<String>) -> Self {
        Self::DuplicatePort {
            port,
            plugins: plugins.into(),
        }
    }

    pub fn missing_field(
        component: &'static str,
        name: impl Into<String>,
        field: &'static str,
    ) -> Self {
        Self::MissingField {
            component,
            name: name.into(),
            field,
        }
    }

    pub fn invalid_value(
        component: &'static str,
        name: impl Into<String>,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            component,
            name: name.into(),
            field,
            message: message.into(),
        }
    }
}
