//! General collector settings
//!
//! Sampling cadence, rate conversion, host identity and global tags.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Shortest read interval the collector will honor
pub const MIN_INTERVAL: Duration = Duration::from_secs(10);

/// Default capacity of the sample queue between read and write loops
pub const DEFAULT_QUEUE_CAPACITY: usize = 30_000;

/// Settings shared by every component
///
/// # Example
///
/// ```toml
/// [general]
/// interval = "10s"
/// timeout = "30s"
/// store_rates = true
/// hostname = "web-01"
/// types_db = "configs/types.db"
///
/// [general.metadata]
/// dc = "datacenter-1"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// How often sources are read
    /// Default: 10s (anything shorter is raised to 10s)
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Idle time after which a series' rate state is dropped
    /// Default: 30s (anything not longer than the interval becomes 3 x interval)
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Convert counter/derive/absolute values into rates
    /// Default: true
    pub store_rates: bool,

    /// Host name stamped on samples
    /// Default: empty (detect, lowercased)
    pub hostname: String,

    /// Path to the type catalog
    /// Default: "configs/types.db"
    pub types_db: String,

    /// Maximum queued samples before the oldest are dropped
    /// Default: 30000
    pub queue_capacity: usize,

    /// Tags added to every sample that does not already carry them
    pub metadata: BTreeMap<String, String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            interval: MIN_INTERVAL,
            timeout: Duration::from_secs(30),
            store_rates: true,
            hostname: String::new(),
            types_db: "configs/types.db".into(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            metadata: BTreeMap::new(),
        }
    }
}

impl GeneralConfig {
    /// Read interval with the 10 second floor applied
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_INTERVAL)
    }

    /// Rate-state timeout; must exceed the interval, otherwise 3 x interval
    pub fn effective_timeout(&self) -> Duration {
        let interval = self.effective_interval();
        if self.timeout <= interval {
            interval * 3
        } else {
            self.timeout
        }
    }

    /// Configured hostname, if any, lowercased
    pub fn hostname_override(&self) -> Option<String> {
        let name = self.hostname.trim();
        (!name.is_empty()).then(|| name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GeneralConfig::default();
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.store_rates);
        assert_eq!(config.queue_capacity, 30_000);
        assert!(config.metadata.is_empty());
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
interval = "20s"
store_rates = false

[metadata]
region = "ny"
"#;
        let config: GeneralConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.interval, Duration::from_secs(20));
        assert!(!config.store_rates);
        assert_eq!(config.metadata.get("region").map(String::as_str), Some("ny"));
        // Defaults still apply
        assert_eq!(config.types_db, "configs/types.db");
    }

    #[test]
    fn test_interval_floor() {
        let config = GeneralConfig {
            interval: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(config.effective_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_timeout_must_exceed_interval() {
        let config = GeneralConfig {
            interval: Duration::from_secs(20),
            timeout: Duration::from_secs(20),
            ..Default::default()
        };
        assert_eq!(config.effective_timeout(), Duration::from_secs(60));

        let config = GeneralConfig {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(45),
            ..Default::default()
        };
        assert_eq!(config.effective_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn test_hostname_override() {
        let config = GeneralConfig {
            hostname: " Web-01 ".into(),
            ..Default::default()
        };
        assert_eq!(config.hostname_override().as_deref(), Some("web-01"));
        assert!(GeneralConfig::default().hostname_override().is_none());
    }
}
