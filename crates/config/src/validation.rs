//! Configuration validation
//!
//! Validates config consistency:
//! - At least one enabled source and one enabled sink
//! - Required fields are present for enabled plugins
//! - Numeric settings are in range
//! - No two StatsD listeners share an address and port

use std::collections::HashMap;

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::plugins::{
    AmqpPluginConfig, PerformanceCounterPluginConfig, PluginConfig, PluginRole,
    StatsdPluginConfig, WriteHttpPluginConfig,
};

const COMPONENT: &str = "plugin";

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_general(config)?;
    validate_plugins(config)?;
    validate_ports(config)?;
    Ok(())
}

fn validate_general(config: &Config) -> Result<()> {
    if config.general.queue_capacity == 0 {
        return Err(ConfigError::invalid_value(
            "general",
            "general",
            "queue_capacity",
            "must be greater than zero",
        ));
    }
    Ok(())
}

fn validate_plugins(config: &Config) -> Result<()> {
    if config.plugins.enabled(PluginRole::Source).next().is_none() {
        return Err(ConfigError::NoSourcesEnabled);
    }
    if config.plugins.enabled(PluginRole::Sink).next().is_none() {
        return Err(ConfigError::NoSinksEnabled);
    }

    for (name, plugin) in config.plugins.iter() {
        if !plugin.is_enabled() {
            continue;
        }

        match plugin {
            PluginConfig::Statsd(c) => validate_statsd(name, c)?,
            PluginConfig::PerformanceCounter(c) => validate_counters(name, c)?,
            PluginConfig::WriteHttp(c) => validate_http(name, c)?,
            PluginConfig::Amqp(c) => validate_amqp(name, c)?,
        }
    }

    Ok(())
}

fn validate_statsd(name: &str, c: &StatsdPluginConfig) -> Result<()> {
    if c.port == 0 {
        return Err(ConfigError::invalid_value(COMPONENT, name, "port", "must be non-zero"));
    }
    if c.buffer_size == 0 {
        return Err(ConfigError::invalid_value(
            COMPONENT,
            name,
            "buffer_size",
            "must be greater than zero",
        ));
    }
    if let Some(p) = c
        .timer
        .percentiles
        .iter()
        .find(|p| !(**p > 0.0 && **p <= 100.0))
    {
        return Err(ConfigError::invalid_value(
            COMPONENT,
            name,
            "percentiles",
            format!("{p} is not in (0, 100]"),
        ));
    }
    Ok(())
}

fn validate_counters(name: &str, c: &PerformanceCounterPluginConfig) -> Result<()> {
    for counter in &c.counters {
        if counter.category.trim().is_empty() {
            return Err(ConfigError::missing_field(COMPONENT, name, "category"));
        }
        if counter.names.trim().is_empty() {
            return Err(ConfigError::missing_field(COMPONENT, name, "names"));
        }
        if counter.plugin.trim().is_empty() {
            return Err(ConfigError::missing_field(COMPONENT, name, "plugin"));
        }
        if counter.type_name.trim().is_empty() {
            return Err(ConfigError::missing_field(COMPONENT, name, "type"));
        }
        for (field, factor) in [("scale_up", counter.scale_up), ("scale_down", counter.scale_down)] {
            if let Some(f) = factor
                && (f == 0.0 || !f.is_finite())
            {
                return Err(ConfigError::invalid_value(
                    COMPONENT,
                    name,
                    field,
                    "must be a finite non-zero number",
                ));
            }
        }
    }
    if c.refresh_instances.enabled && c.refresh_instances.interval.is_zero() {
        return Err(ConfigError::invalid_value(
            COMPONENT,
            name,
            "refresh_instances.interval",
            "must be greater than zero",
        ));
    }
    Ok(())
}

fn validate_http(name: &str, c: &WriteHttpPluginConfig) -> Result<()> {
    if c.nodes.iter().all(|n| !n.enabled) {
        return Err(ConfigError::missing_field(COMPONENT, name, "nodes"));
    }
    for node in c.nodes.iter().filter(|n| n.enabled) {
        if node.url.trim().is_empty() {
            return Err(ConfigError::missing_field(COMPONENT, name, "url"));
        }
        if node.batch_size == 0 {
            return Err(ConfigError::invalid_value(
                COMPONENT,
                name,
                "batch_size",
                "must be greater than zero",
            ));
        }
        if node.proxy.enabled && node.proxy.url.contains(char::is_whitespace) {
            return Err(ConfigError::invalid_value(
                COMPONENT,
                name,
                "proxy.url",
                "must not contain whitespace",
            ));
        }
    }
    Ok(())
}

fn validate_amqp(name: &str, c: &AmqpPluginConfig) -> Result<()> {
    if c.host.trim().is_empty() {
        return Err(ConfigError::missing_field(COMPONENT, name, "host"));
    }
    if c.exchange.trim().is_empty() {
        return Err(ConfigError::missing_field(COMPONENT, name, "exchange"));
    }
    if c.port == 0 {
        return Err(ConfigError::invalid_value(COMPONENT, name, "port", "must be non-zero"));
    }
    Ok(())
}

/// Two StatsD listeners on one address/port would steal each other's datagrams
fn validate_ports(config: &Config) -> Result<()> {
    let mut bound: HashMap<(String, u16), Vec<&str>> = HashMap::new();

    for (name, plugin) in config.plugins.iter() {
        if let PluginConfig::Statsd(c) = plugin
            && c.enabled
        {
            bound
                .entry((c.address.clone(), c.port))
                .or_default()
                .push(name);
        }
    }

    let mut conflicts: Vec<_> = bound.into_iter().filter(|(_, v)| v.len() > 1).collect();
    conflicts.sort();
    if let Some(((_, port), names)) = conflicts.into_iter().next() {
        return Err(ConfigError::duplicate_port(port, names.join(", ")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::Config;
    use crate::error::ConfigError;

    const SINK: &str = r#"
[plugins.http]
type = "write_http"

[[plugins.http.nodes]]
name = "primary"
url = "http://localhost:8080/"
"#;

    fn parse(extra: &str) -> Result<Config, ConfigError> {
        Config::from_str(&format!("{extra}\n{SINK}"))
    }

    #[test]
    fn test_valid_minimal() {
        let config = parse("[plugins.statsd]\ntype = \"statsd\"").unwrap();
        assert_eq!(config.enabled_sources(), vec!["statsd"]);
        assert_eq!(config.enabled_sinks(), vec!["http"]);
    }

    #[test]
    fn test_no_sources() {
        let err = parse("").unwrap_err();
        assert!(matches!(err, ConfigError::NoSourcesEnabled));
    }

    #[test]
    fn test_disabled_source_does_not_count() {
        let err = parse("[plugins.statsd]\ntype = \"statsd\"\nenabled = false").unwrap_err();
        assert!(matches!(err, ConfigError::NoSourcesEnabled));
    }

    #[test]
    fn test_no_sinks() {
        let err = Config::from_str("[plugins.statsd]\ntype = \"statsd\"").unwrap_err();
        assert!(matches!(err, ConfigError::NoSinksEnabled));
    }

    #[test]
    fn test_bad_percentile() {
        let toml = r#"
[plugins.statsd]
type = "statsd"
[plugins.statsd.timer]
percentiles = [50.0, 101.0]
"#;
        let err = parse(toml).unwrap_err();
        assert!(err.to_string().contains("percentiles"));
    }

    #[test]
    fn test_duplicate_statsd_port() {
        let toml = r#"
[plugins.a]
type = "statsd"
port = 9000

[plugins.b]
type = "statsd"
port = 9000
"#;
        let err = parse(toml).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePort { port: 9000, .. }));
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_http_requires_url() {
        let toml = r#"
[plugins.statsd]
type = "statsd"

[plugins.http]
type = "write_http"

[[plugins.http.nodes]]
name = "primary"
url = ""
"#;
        let err = Config::from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "url", .. }));
    }

    #[test]
    fn test_amqp_requires_exchange() {
        let toml = r#"
[plugins.statsd]
type = "statsd"

[plugins.mq]
type = "amqp"
"#;
        let err = Config::from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "exchange", .. }));
    }

    #[test]
    fn test_counter_requires_type() {
        let toml = r#"
[plugins.host]
type = "performance_counter"

[[plugins.host.counters]]
category = "memory"
names = "Available Bytes"
plugin = "memory"
type = ""
"#;
        let err = parse(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "type", .. }));
    }

    #[test]
    fn test_zero_scale_factor() {
        let toml = r#"
[plugins.host]
type = "performance_counter"

[[plugins.host.counters]]
category = "memory"
names = "Available Bytes"
plugin = "memory"
type = "memory"
scale_down = 0.0
"#;
        let err = parse(toml).unwrap_err();
        assert!(err.to_string().contains("scale_down"));
    }
}
