//! Plugin registry - builds adapters from configuration
//!
//! Every enabled `[plugins.<name>]` entry becomes one source or sink,
//! named after its table key. Entries are visited in name order so the
//! collector configures and starts them in a stable order.

use std::sync::Arc;

use meterd_config::{
    AmqpPluginConfig, Config, CounterConfig, PerformanceCounterPluginConfig, PluginConfig, PluginRole,
    StatsdPluginConfig, WriteHttpPluginConfig,
};
use meterd_pipeline::{BoxedSink, BoxedSource};
use meterd_protocol::TypesDb;
use meterd_sinks::{AmqpSink, AmqpSinkConfig, HttpNodeSettings, ProxyMode, WriteHttpSink, WriteHttpSinkConfig};
use meterd_sources::{
    CounterSpec, DeletePolicy, PerfCounterSource, PerfCounterSourceConfig, StatsdSource, StatsdSourceConfig,
    TimerOutputs,
};

/// Adapters built from configuration
pub struct Plugins {
    pub sources: Vec<BoxedSource>,
    pub sinks: Vec<BoxedSink>,
}

/// Build every enabled plugin
pub fn build(config: &Config, hostname: &str, types: &Arc<TypesDb>) -> Plugins {
    let mut sources = Vec::new();
    for (name, plugin) in config.plugins.enabled(PluginRole::Source) {
        let source: BoxedSource = match plugin {
            PluginConfig::Statsd(c) => Box::new(StatsdSource::new(statsd_config(name, c, hostname))),
            PluginConfig::PerformanceCounter(c) => {
                Box::new(PerfCounterSource::new(perf_counter_config(name, c, hostname)))
            }
            PluginConfig::WriteHttp(_) | PluginConfig::Amqp(_) => continue,
        };
        tracing::debug!(plugin = %name, kind = plugin.type_name(), "source registered");
        sources.push(source);
    }

    let mut sinks = Vec::new();
    for (name, plugin) in config.plugins.enabled(PluginRole::Sink) {
        let sink: BoxedSink = match plugin {
            PluginConfig::WriteHttp(c) => Box::new(WriteHttpSink::new(http_config(name, c), Arc::clone(types))),
            PluginConfig::Amqp(c) => Box::new(AmqpSink::new(amqp_config(name, c), Arc::clone(types))),
            PluginConfig::Statsd(_) | PluginConfig::PerformanceCounter(_) => continue,
        };
        tracing::debug!(plugin = %name, kind = plugin.type_name(), "sink registered");
        sinks.push(sink);
    }

    Plugins { sources, sinks }
}

// =============================================================================
// Config mapping
// =============================================================================

pub fn statsd_config(name: &str, c: &StatsdPluginConfig, hostname: &str) -> StatsdSourceConfig {
    StatsdSourceConfig {
        name: name.to_string(),
        hostname: hostname.to_string(),
        address: c.address.clone(),
        port: c.port,
        buffer_size: c.buffer_size,
        delete: DeletePolicy {
            counters: c.delete_cache.counters,
            timers: c.delete_cache.timers,
            gauges: c.delete_cache.gauges,
            sets: c.delete_cache.sets,
        },
        timer: TimerOutputs {
            lower: c.timer.lower,
            upper: c.timer.upper,
            sum: c.timer.sum,
            count: c.timer.count,
            percentiles: c.timer.percentiles.clone(),
        },
    }
}

pub fn perf_counter_config(
    name: &str,
    c: &PerformanceCounterPluginConfig,
    hostname: &str,
) -> PerfCounterSourceConfig {
    PerfCounterSourceConfig {
        name: name.to_string(),
        hostname: hostname.to_string(),
        refresh_instances: c.refresh_instances.enabled,
        refresh_interval: c.refresh_instances.interval,
        counters: c.counters.iter().map(counter_spec).collect(),
    }
}

fn counter_spec(c: &CounterConfig) -> CounterSpec {
    CounterSpec {
        category: c.category.clone(),
        names: c.names.clone(),
        instance: c.instance.clone(),
        plugin: c.plugin.clone(),
        plugin_instance: c.plugin_instance.clone(),
        type_name: c.type_name.clone(),
        type_instance: c.type_instance.clone(),
        scale_up: c.scale_up,
        scale_down: c.scale_down,
    }
}

pub fn http_config(name: &str, c: &WriteHttpPluginConfig) -> WriteHttpSinkConfig {
    let nodes = c
        .nodes
        .iter()
        .filter(|node| node.enabled)
        .map(|node| {
            let mut settings = HttpNodeSettings::new(node.name.as_str(), node.url.as_str())
                .with_timeout(node.timeout)
                .with_batch_size(node.batch_size)
                .with_max_idle_time(node.max_idle_time)
                .with_proxy(ProxyMode::from_settings(node.proxy.enabled, &node.proxy.url));
            if let Some(user_name) = &node.user_name {
                settings = settings.with_basic_auth(user_name.as_str(), node.password.clone());
            }
            if let Some(pattern) = &node.safe_chars_regex {
                settings = settings.with_sanitizer(pattern.as_str(), node.replace_with.as_str());
            }
            settings
        })
        .collect();

    WriteHttpSinkConfig::new(nodes).with_name(name)
}

pub fn amqp_config(name: &str, c: &AmqpPluginConfig) -> AmqpSinkConfig {
    AmqpSinkConfig {
        name: name.to_string(),
        host: c.host.clone(),
        port: c.port,
        virtual_host: c.virtual_host.clone(),
        user: c.user.clone(),
        password: c.password.clone(),
        exchange: c.exchange.clone(),
        routing_key_prefix: c.routing_key_prefix.clone(),
        retry_delay: c.retry_delay,
    }
}
