//! Performance Counter Source
//!
//! Samples configured host counters once per collector interval.
//!
//! # Counter resolution
//!
//! Each configured counter names a category, one or more counter names
//! (comma separated, one value per name) and an instance. Instance `*`
//! expands to every instance the provider reports for the category, and
//! each expanded instance also becomes the sample's plugin instance.
//!
//! ```text
//! category=processor names="% Processor Time" instance=*
//!   -> cpu0 / cpu1 / ... / _Total   (one sample each)
//! ```
//!
//! A counter whose instance disappears is removed and logged; the other
//! values of the same sample are still reported. With instance refresh
//! enabled, counters are re-resolved periodically so new instances are
//! picked up.

pub mod provider;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use meterd_protocol::{AdapterError, MetricSample, MetricSource, now_epoch, round_epoch};

pub use provider::{CounterProvider, SysinfoProvider, TOTAL_INSTANCE};

/// Instance value that expands to every instance
pub const WILDCARD_INSTANCE: &str = "*";

// =============================================================================
// Configuration
// =============================================================================

/// One configured counter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CounterSpec {
    pub category: String,
    /// Comma separated counter names
    pub names: String,
    pub instance: String,
    pub plugin: String,
    pub plugin_instance: String,
    pub type_name: String,
    pub type_instance: String,
    pub scale_up: Option<f64>,
    pub scale_down: Option<f64>,
}

impl CounterSpec {
    /// Counter names in configured order
    pub fn counter_names(&self) -> Vec<String> {
        self.names
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .collect()
    }

    /// Multiplier applied to raw values; scale-up wins over scale-down
    pub fn factor(&self) -> f64 {
        match (self.scale_up, self.scale_down) {
            (Some(up), _) if up > 0.0 => up,
            (_, Some(down)) if down > 0.0 => 1.0 / down,
            _ => 1.0,
        }
    }
}

/// Performance counter source configuration
#[derive(Debug, Clone)]
pub struct PerfCounterSourceConfig {
    /// Instance name used in logs
    pub name: String,

    /// Host name stamped on every sample
    pub hostname: String,

    /// Re-resolve counters periodically
    pub refresh_instances: bool,

    /// Re-resolve period
    pub refresh_interval: Duration,

    pub counters: Vec<CounterSpec>,
}

impl Default for PerfCounterSourceConfig {
    fn default() -> Self {
        Self {
            name: "performance_counter".into(),
            hostname: "localhost".into(),
            refresh_instances: false,
            refresh_interval: Duration::from_secs(60),
            counters: Vec::new(),
        }
    }
}

// =============================================================================
// Source Implementation
// =============================================================================

/// Counter bound to a concrete instance
#[derive(Debug, Clone, PartialEq)]
struct ActiveCounter {
    category: String,
    names: Vec<String>,
    instance: String,
    plugin: String,
    plugin_instance: String,
    type_name: String,
    type_instance: String,
    factor: f64,
}

impl ActiveCounter {
    fn new(spec: &CounterSpec, instance: &str, plugin_instance: &str) -> Self {
        Self {
            category: spec.category.clone(),
            names: spec.counter_names(),
            instance: instance.to_string(),
            plugin: spec.plugin.clone(),
            plugin_instance: plugin_instance.to_string(),
            type_name: spec.type_name.clone(),
            type_instance: spec.type_instance.clone(),
            factor: spec.factor(),
        }
    }
}

/// Performance counter source adapter
pub struct PerfCounterSource {
    config: PerfCounterSourceConfig,
    provider: Arc<Mutex<Box<dyn CounterProvider>>>,
    active: Vec<ActiveCounter>,
    resolved_at: Option<Instant>,
}

impl PerfCounterSource {
    /// Source reading host statistics through `sysinfo`
    pub fn new(config: PerfCounterSourceConfig) -> Self {
        Self::with_provider(config, Box::new(SysinfoProvider::new()))
    }

    pub fn with_provider(config: PerfCounterSourceConfig, provider: Box<dyn CounterProvider>) -> Self {
        Self {
            config,
            provider: Arc::new(Mutex::new(provider)),
            active: Vec::new(),
            resolved_at: None,
        }
    }

    /// Number of counters bound to an instance
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Take a fresh provider reading off the async workers
    ///
    /// Host scans walk every cpu and interface, so they run on the blocking pool.
    async fn refresh_provider(&self) {
        let provider = Arc::clone(&self.provider);
        if let Err(e) = tokio::task::spawn_blocking(move || provider.lock().refresh()).await {
            tracing::warn!(source = %self.config.name, error = %e, "performance counter refresh failed");
        }
    }

    /// Bind every configured counter to its instances
    fn resolve(&mut self) {
        let mut provider = self.provider.lock();

        let mut active = Vec::new();
        for spec in &self.config.counters {
            if spec.instance == WILDCARD_INSTANCE {
                let instances = provider.instances(&spec.category);
                if instances.is_empty() {
                    tracing::warn!(
                        source = %self.config.name,
                        category = %spec.category,
                        "no instances found for wildcard counter"
                    );
                }
                for instance in instances {
                    self.add_counter(&**provider, &mut active, ActiveCounter::new(spec, &instance, &instance));
                }
            } else {
                self.add_counter(
                    &**provider,
                    &mut active,
                    ActiveCounter::new(spec, &spec.instance, &spec.plugin_instance),
                );
            }
        }

        tracing::debug!(
            source = %self.config.name,
            counters = active.len(),
            "performance counters resolved"
        );
        drop(provider);
        self.active = active;
        self.resolved_at = Some(Instant::now());
    }

    fn add_counter(&self, provider: &dyn CounterProvider, active: &mut Vec<ActiveCounter>, counter: ActiveCounter) {
        let missing: Vec<&str> = counter
            .names
            .iter()
            .filter(|name| {
                provider
                    .value(&counter.category, name, &counter.instance)
                    .is_none()
            })
            .map(String::as_str)
            .collect();

        if !missing.is_empty() {
            tracing::error!(
                source = %self.config.name,
                category = %counter.category,
                instance = %counter.instance,
                counters = ?missing,
                "performance counter not available"
            );
            return;
        }

        tracing::info!(
            source = %self.config.name,
            category = %counter.category,
            instance = %counter.instance,
            counters = ?counter.names,
            plugin = %counter.plugin,
            plugin_instance = %counter.plugin_instance,
            type_name = %counter.type_name,
            type_instance = %counter.type_instance,
            "added performance counter"
        );
        active.push(counter);
    }

    fn refresh_due(&self) -> bool {
        match self.resolved_at {
            None => true,
            Some(at) => self.config.refresh_instances && at.elapsed() >= self.config.refresh_interval,
        }
    }

    /// Sample every active counter from the latest reading
    fn collect(&mut self) -> Vec<MetricSample> {
        let provider = self.provider.lock();
        let epoch = round_epoch(now_epoch());
        let mut samples = Vec::with_capacity(self.active.len());

        for counter in &mut self.active {
            let mut values = Vec::with_capacity(counter.names.len());
            let mut gone = Vec::new();

            for name in &counter.names {
                match provider.value(&counter.category, name, &counter.instance) {
                    Some(value) => values.push(value * counter.factor),
                    None => gone.push(name.clone()),
                }
            }

            for name in &gone {
                tracing::info!(
                    source = %self.config.name,
                    category = %counter.category,
                    instance = %counter.instance,
                    counter = %name,
                    "removed performance counter"
                );
            }
            counter.names.retain(|name| !gone.contains(name));

            if values.is_empty() {
                continue;
            }

            samples.push(
                MetricSample::new(self.config.hostname.as_str(), counter.plugin.as_str(), counter.type_name.as_str())
                    .with_plugin_instance(counter.plugin_instance.as_str())
                    .with_type_instance(counter.type_instance.as_str())
                    .with_epoch(epoch)
                    .with_values(values),
            );
        }

        self.active.retain(|counter| !counter.names.is_empty());
        samples
    }
}

#[async_trait]
impl MetricSource for PerfCounterSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn configure(&mut self) -> Result<(), AdapterError> {
        for spec in &self.config.counters {
            if spec.category.is_empty() || spec.counter_names().is_empty() {
                return Err(AdapterError::config(
                    &self.config.name,
                    "counter needs a category and at least one name",
                ));
            }
        }
        self.refresh_provider().await;
        self.resolve();
        tracing::info!(
            source = %self.config.name,
            counters = self.active.len(),
            "performance counter source configured"
        );
        Ok(())
    }

    async fn start(&mut self) -> Result<(), AdapterError> {
        tracing::info!(source = %self.config.name, "performance counter source started");
        Ok(())
    }

    async fn stop(&mut self) {
        tracing::info!(source = %self.config.name, "performance counter source stopped");
    }

    async fn read(&mut self) -> Vec<MetricSample> {
        self.refresh_provider().await;
        if self.refresh_due() {
            self.resolve();
        }
        self.collect()
    }
}

#[cfg(test)]
#[path = "perf_counter_test.rs"]
mod perf_counter_test;
