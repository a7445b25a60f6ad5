//! Plugin configuration types
//!
//! Plugins are named instances, each selecting an adapter through its `type`
//! field. Sources and sinks share the one table; the adapter type decides
//! which side of the pipeline a plugin lands on.
//!
//! ```toml
//! [plugins.statsd]
//! type = "statsd"
//! port = 8125
//!
//! [plugins.host]
//! type = "performance_counter"
//!
//! [[plugins.host.counters]]
//! category = "processor"
//! names = "% Processor Time"
//! instance = "*"
//! plugin = "cpu"
//! type = "percent"
//!
//! [plugins.http]
//! type = "write_http"
//!
//! [[plugins.http.nodes]]
//! name = "primary"
//! url = "http://metrics.example.com/ingest"
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

/// Container for all plugin instances
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    #[serde(flatten)]
    plugins: HashMap<String, PluginConfig>,
}

impl PluginsConfig {
    pub fn get(&self, name: &str) -> Option<&PluginConfig> {
        self.plugins.get(name)
    }

    /// Iterate in name order, so startup order is stable across runs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PluginConfig)> {
        let mut entries: Vec<_> = self.plugins.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    /// Enabled plugins of one role, in name order
    pub fn enabled(&self, role: PluginRole) -> impl Iterator<Item = (&String, &PluginConfig)> {
        self.iter()
            .filter(move |(_, p)| p.is_enabled() && p.role() == role)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Insert a plugin programmatically
    pub fn insert(&mut self, name: impl Into<String>, plugin: PluginConfig) {
        self.plugins.insert(name.into(), plugin);
    }
}

/// Which side of the pipeline a plugin feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginRole {
    Source,
    Sink,
}

/// Configuration for a single plugin instance
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PluginConfig {
    /// StatsD UDP listener and aggregator
    Statsd(StatsdPluginConfig),

    /// Host performance counters
    PerformanceCounter(PerformanceCounterPluginConfig),

    /// Batched JSON over HTTP POST
    WriteHttp(WriteHttpPluginConfig),

    /// One JSON message per sample to an AMQP exchange
    Amqp(AmqpPluginConfig),
}

impl PluginConfig {
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Statsd(c) => c.enabled,
            Self::PerformanceCounter(c) => c.enabled,
            Self::WriteHttp(c) => c.enabled,
            Self::Amqp(c) => c.enabled,
        }
    }

    pub fn role(&self) -> PluginRole {
        match self {
            Self::Statsd(_) | Self::PerformanceCounter(_) => PluginRole::Source,
            Self::WriteHttp(_) | Self::Amqp(_) => PluginRole::Sink,
        }
    }

    /// The `type` tag
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Statsd(_) => "statsd",
            Self::PerformanceCounter(_) => "performance_counter",
            Self::WriteHttp(_) => "write_http",
            Self::Amqp(_) => "amqp",
        }
    }
}

fn default_true() -> bool {
    true
}

// =============================================================================
// StatsD
// =============================================================================

/// StatsD listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatsdPluginConfig {
    pub enabled: bool,

    /// Bind address
    /// Default: "0.0.0.0"
    pub address: String,

    /// Listen port
    /// Default: 8125
    pub port: u16,

    /// Largest datagram accepted, in bytes
    /// Default: 4096
    pub buffer_size: usize,

    /// Drop idle metrics from the merge table instead of re-emitting them
    pub delete_cache: DeleteCacheConfig,

    /// Extra timer statistics
    pub timer: TimerConfig,
}

impl Default for StatsdPluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: "0.0.0.0".into(),
            port: 8125,
            buffer_size: 4096,
            delete_cache: DeleteCacheConfig::default(),
            timer: TimerConfig::default(),
        }
    }
}

/// Per-type delete-on-idle policy
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct DeleteCacheConfig {
    pub counters: bool,
    pub timers: bool,
    pub gauges: bool,
    pub sets: bool,
}

/// Timer statistics to emit besides the average
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub lower: bool,
    pub upper: bool,
    pub sum: bool,
    pub count: bool,

    /// Percentiles in (0, 100]; any value enables timer histograms
    pub percentiles: Vec<f64>,
}

// =============================================================================
// Performance counters
// =============================================================================

/// Host performance counter source
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerformanceCounterPluginConfig {
    pub enabled: bool,

    /// Periodic re-enumeration of wildcard instances
    pub refresh_instances: RefreshInstancesConfig,

    pub counters: Vec<CounterConfig>,
}

impl Default for PerformanceCounterPluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_instances: RefreshInstancesConfig::default(),
            counters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshInstancesConfig {
    pub enabled: bool,

    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for RefreshInstancesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(60),
        }
    }
}

/// One counter (or comma separated group of counters) to sample
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CounterConfig {
    /// Provider category (e.g. `processor`, `memory`)
    pub category: String,

    /// Comma separated counter names, one value each
    pub names: String,

    /// Instance name, `*` for every instance, empty for none
    #[serde(default)]
    pub instance: String,

    /// Output plugin name
    pub plugin: String,

    /// Output plugin instance (replaced by the instance name for `*`)
    #[serde(default)]
    pub plugin_instance: String,

    /// Output catalog type
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default)]
    pub type_instance: String,

    /// Multiply raw values by this factor
    #[serde(default)]
    pub scale_up: Option<f64>,

    /// Divide raw values by this factor (ignored when `scale_up` is set)
    #[serde(default)]
    pub scale_down: Option<f64>,
}

// =============================================================================
// HTTP
// =============================================================================

/// HTTP batch poster
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WriteHttpPluginConfig {
    pub enabled: bool,
    pub nodes: Vec<HttpNodeConfig>,
}

impl Default for WriteHttpPluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            nodes: Vec::new(),
        }
    }
}

/// One HTTP endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct HttpNodeConfig {
    pub name: String,
    pub url: String,

    /// Request timeout
    /// Default: 10s
    #[serde(default = "default_http_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Samples per POST
    /// Default: 20
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Lifetime of idle pooled connections
    /// Default: 60s
    #[serde(default = "default_max_idle_time", with = "humantime_serde")]
    pub max_idle_time: Duration,

    /// Basic auth user name
    #[serde(default)]
    pub user_name: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Characters matching this regex are replaced in `plugin_instance`
    #[serde(default)]
    pub safe_chars_regex: Option<String>,

    /// Replacement for unsafe characters (empty strips them)
    #[serde(default)]
    pub replace_with: String,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_batch_size() -> usize {
    20
}

fn default_max_idle_time() -> Duration {
    Duration::from_secs(60)
}

/// Outbound proxy
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub enabled: bool,

    /// Proxy URL; empty uses the environment (`HTTP_PROXY` etc.)
    pub url: String,
}

// =============================================================================
// AMQP
// =============================================================================

/// AMQP publisher
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AmqpPluginConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub virtual_host: String,
    pub user: String,
    pub password: String,
    pub exchange: String,

    /// First segment of every routing key
    /// Default: "collectd"
    pub routing_key_prefix: String,

    /// Minimum time between connection attempts
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for AmqpPluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".into(),
            port: 5672,
            virtual_host: "/".into(),
            user: "guest".into(),
            password: "guest".into(),
            exchange: String::new(),
            routing_key_prefix: "collectd".into(),
            retry_delay: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statsd_defaults() {
        let plugin: PluginConfig = toml::from_str(r#"type = "statsd""#).unwrap();
        let PluginConfig::Statsd(config) = plugin else {
            panic!("expected statsd");
        };
        assert!(config.enabled);
        assert_eq!(config.port, 8125);
        assert_eq!(config.buffer_size, 4096);
        assert!(!config.delete_cache.counters);
        assert!(config.timer.percentiles.is_empty());
    }

    #[test]
    fn test_statsd_full() {
        let toml = r#"
type = "statsd"
port = 9125

[delete_cache]
counters = true
sets = true

[timer]
lower = true
upper = true
percentiles = [50.0, 99.0]
"#;
        let PluginConfig::Statsd(config) = toml::from_str::<PluginConfig>(toml).unwrap() else {
            panic!("expected statsd");
        };
        assert_eq!(config.port, 9125);
        assert!(config.delete_cache.counters);
        assert!(!config.delete_cache.timers);
        assert!(config.delete_cache.sets);
        assert_eq!(config.timer.percentiles, vec![50.0, 99.0]);
    }

    #[test]
    fn test_counter_config() {
        let toml = r#"
type = "performance_counter"

[refresh_instances]
enabled = true
interval = "5m"

[[counters]]
category = "memory"
names = "Available Bytes, Used Bytes"
plugin = "memory"
type = "memory"
scale_down = 1024.0
"#;
        let PluginConfig::PerformanceCounter(config) = toml::from_str::<PluginConfig>(toml).unwrap() else {
            panic!("expected performance_counter");
        };
        assert!(config.refresh_instances.enabled);
        assert_eq!(config.refresh_instances.interval, Duration::from_secs(300));
        assert_eq!(config.counters.len(), 1);
        assert_eq!(config.counters[0].type_name, "memory");
        assert_eq!(config.counters[0].scale_down, Some(1024.0));
        assert!(config.counters[0].scale_up.is_none());
    }

    #[test]
    fn test_http_node_defaults() {
        let toml = r#"
type = "write_http"

[[nodes]]
name = "primary"
url = "http://localhost:8080/"
"#;
        let PluginConfig::WriteHttp(config) = toml::from_str::<PluginConfig>(toml).unwrap() else {
            panic!("expected write_http");
        };
        let node = &config.nodes[0];
        assert_eq!(node.batch_size, 20);
        assert_eq!(node.timeout, Duration::from_secs(10));
        assert_eq!(node.max_idle_time, Duration::from_secs(60));
        assert!(node.enabled);
        assert!(!node.proxy.enabled);
    }

    #[test]
    fn test_amqp_defaults() {
        let PluginConfig::Amqp(config) =
            toml::from_str::<PluginConfig>(r#"type = "amqp""#).unwrap()
        else {
            panic!("expected amqp");
        };
        assert_eq!(config.port, 5672);
        assert_eq!(config.routing_key_prefix, "collectd");
        assert_eq!(config.retry_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_roles_and_order() {
        let toml = r#"
[zeta]
type = "write_http"

[alpha]
type = "statsd"

[beta]
type = "amqp"
enabled = false
"#;
        let plugins: PluginsConfig = toml::from_str(toml).unwrap();
        assert_eq!(plugins.len(), 3);

        let names: Vec<_> = plugins.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "zeta"]);

        let sinks: Vec<_> = plugins
            .enabled(PluginRole::Sink)
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(sinks, vec!["zeta"]);
        assert_eq!(plugins.get("alpha").unwrap().type_name(), "statsd");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result: Result<PluginConfig, _> = toml::from_str(r#"type = "syslog""#);
        assert!(result.is_err());
    }
}
