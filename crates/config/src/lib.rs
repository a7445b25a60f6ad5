//! meterd Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use meterd_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str(r#"
//! [plugins.statsd]
//! type = "statsd"
//!
//! [plugins.mq]
//! type = "amqp"
//! exchange = "metrics"
//! "#).unwrap();
//! assert_eq!(config.enabled_sinks(), vec!["mq"]);
//! ```
//!
//! # Example Full Config
//!
//! See `configs/config.toml` for all available options.

mod error;
mod general;
mod logging;
mod plugins;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use error::{ConfigError, Result};
pub use general::{DEFAULT_QUEUE_CAPACITY, GeneralConfig, MIN_INTERVAL};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use plugins::{
    AmqpPluginConfig, CounterConfig, DeleteCacheConfig, HttpNodeConfig,
    PerformanceCounterPluginConfig, PluginConfig, PluginRole, PluginsConfig, ProxyConfig,
    RefreshInstancesConfig, StatsdPluginConfig, TimerConfig, WriteHttpPluginConfig,
};

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interval, timeout, hostname, catalog path, global tags
    pub general: GeneralConfig,

    /// Logging configuration
    pub log: LogConfig,

    /// Named source and sink plugins
    pub plugins: PluginsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or
    /// fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Names of enabled source plugins, sorted
    pub fn enabled_sources(&self) -> Vec<&str> {
        self.plugins
            .enabled(PluginRole::Source)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Names of enabled sink plugins, sorted
    pub fn enabled_sinks(&self) -> Vec<&str> {
        self.plugins
            .enabled(PluginRole::Sink)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
