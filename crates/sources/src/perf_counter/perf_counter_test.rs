//! Tests for the performance counter source

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use parking_lot::Mutex;

use meterd_protocol::MetricSource;

use super::*;

// =============================================================================
// Fake provider
// =============================================================================

type Readings = Arc<Mutex<HashMap<(String, String, String), f64>>>;

/// Provider serving values from a shared table
#[derive(Clone, Default)]
struct FakeProvider {
    readings: Readings,
    refreshed_on: Arc<Mutex<Vec<ThreadId>>>,
}

impl FakeProvider {
    fn set(&self, category: &str, counter: &str, instance: &str, value: f64) {
        self.readings
            .lock()
            .insert((category.into(), counter.into(), instance.into()), value);
    }

    fn remove_instance(&self, instance: &str) {
        self.readings.lock().retain(|(_, _, i), _| i != instance);
    }
}

impl CounterProvider for FakeProvider {
    fn refresh(&mut self) {
        self.refreshed_on.lock().push(std::thread::current().id());
    }

    fn instances(&mut self, category: &str) -> Vec<String> {
        let mut instances: Vec<String> = self
            .readings
            .lock()
            .keys()
            .filter(|(c, _, i)| c == category && !i.is_empty())
            .map(|(_, _, i)| i.clone())
            .collect();
        instances.sort_unstable();
        instances.dedup();
        instances
    }

    fn value(&self, category: &str, counter: &str, instance: &str) -> Option<f64> {
        self.readings
            .lock()
            .get(&(category.to_string(), counter.to_string(), instance.to_string()))
            .copied()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn spec(category: &str, names: &str, instance: &str) -> CounterSpec {
    CounterSpec {
        category: category.into(),
        names: names.into(),
        instance: instance.into(),
        plugin: "cpu".into(),
        plugin_instance: "fixed".into(),
        type_name: "percent".into(),
        type_instance: "usage".into(),
        ..Default::default()
    }
}

fn source(provider: &FakeProvider, counters: Vec<CounterSpec>) -> PerfCounterSource {
    let config = PerfCounterSourceConfig {
        hostname: "web-1".into(),
        counters,
        ..Default::default()
    };
    PerfCounterSource::with_provider(config, Box::new(provider.clone()))
}

// =============================================================================
// Counter settings
// =============================================================================

#[test]
fn test_counter_names_split_and_trimmed() {
    let s = spec("memory", "Used Bytes, Free Bytes,,", "");
    assert_eq!(s.counter_names(), vec!["Used Bytes", "Free Bytes"]);
}

#[test]
fn test_scale_factor() {
    let mut s = spec("memory", "Used Bytes", "");
    assert_eq!(s.factor(), 1.0);

    s.scale_down = Some(1024.0);
    assert_eq!(s.factor(), 1.0 / 1024.0);

    s.scale_up = Some(8.0);
    assert_eq!(s.factor(), 8.0);
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn test_single_instance_counter() {
    let provider = FakeProvider::default();
    provider.set("memory", "Used Bytes", "", 2048.0);
    provider.set("memory", "Free Bytes", "", 1024.0);

    let mut counter = spec("memory", "Used Bytes,Free Bytes", "");
    counter.scale_down = Some(1024.0);
    let mut source = source(&provider, vec![counter]);
    source.configure().await.unwrap();

    let samples = source.read().await;
    assert_eq!(samples.len(), 1);

    let s = &samples[0];
    assert_eq!(s.host, "web-1");
    assert_eq!(s.plugin, "cpu");
    assert_eq!(s.plugin_instance, "fixed");
    assert_eq!(s.type_name, "percent");
    assert_eq!(s.type_instance, "usage");
    assert_eq!(s.values, vec![2.0, 1.0]);
}

#[tokio::test]
async fn test_wildcard_expands_instances() {
    let provider = FakeProvider::default();
    provider.set("processor", "% Processor Time", "cpu0", 10.0);
    provider.set("processor", "% Processor Time", "cpu1", 20.0);
    provider.set("processor", "% Processor Time", "_Total", 15.0);

    let mut source = source(&provider, vec![spec("processor", "% Processor Time", "*")]);
    source.configure().await.unwrap();
    assert_eq!(source.active_count(), 3);

    let samples = source.read().await;
    let by_instance: HashMap<_, _> = samples
        .iter()
        .map(|s| (s.plugin_instance.as_str(), s.values[0]))
        .collect();
    assert_eq!(by_instance["cpu0"], 10.0);
    assert_eq!(by_instance["cpu1"], 20.0);
    assert_eq!(by_instance["_Total"], 15.0);
}

#[tokio::test]
async fn test_unavailable_counter_is_skipped() {
    let provider = FakeProvider::default();
    provider.set("memory", "Used Bytes", "", 1.0);

    let mut source = source(
        &provider,
        vec![
            spec("memory", "Used Bytes", ""),
            spec("memory", "Paged Bytes", ""),
        ],
    );
    source.configure().await.unwrap();
    assert_eq!(source.active_count(), 1);
    assert_eq!(source.read().await.len(), 1);
}

#[tokio::test]
async fn test_vanished_instance_is_removed() {
    let provider = FakeProvider::default();
    provider.set("network", "Bytes Received", "eth0", 100.0);
    provider.set("network", "Bytes Received", "eth1", 200.0);

    let mut source = source(&provider, vec![spec("network", "Bytes Received", "*")]);
    source.configure().await.unwrap();
    assert_eq!(source.read().await.len(), 2);

    provider.remove_instance("eth1");
    let samples = source.read().await;
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].plugin_instance, "eth0");
    assert_eq!(source.active_count(), 1);
}

#[tokio::test]
async fn test_partial_counter_loss_keeps_remaining_values() {
    let provider = FakeProvider::default();
    provider.set("memory", "Used Bytes", "", 5.0);
    provider.set("memory", "Free Bytes", "", 7.0);

    let mut source = source(&provider, vec![spec("memory", "Used Bytes,Free Bytes", "")]);
    source.configure().await.unwrap();

    provider
        .readings
        .lock()
        .remove(&("memory".into(), "Used Bytes".into(), String::new()));

    let samples = source.read().await;
    assert_eq!(samples[0].values, vec![7.0]);
    assert_eq!(source.active_count(), 1);
}

#[tokio::test]
async fn test_refresh_picks_up_new_instances() {
    let provider = FakeProvider::default();
    provider.set("network", "Bytes Sent", "eth0", 1.0);

    let config = PerfCounterSourceConfig {
        refresh_instances: true,
        refresh_interval: Duration::ZERO,
        counters: vec![spec("network", "Bytes Sent", "*")],
        ..Default::default()
    };
    let mut source = PerfCounterSource::with_provider(config, Box::new(provider.clone()));
    source.configure().await.unwrap();
    assert_eq!(source.read().await.len(), 1);

    provider.set("network", "Bytes Sent", "eth1", 2.0);
    assert_eq!(source.read().await.len(), 2);
}

#[tokio::test]
async fn test_no_refresh_keeps_initial_instances() {
    let provider = FakeProvider::default();
    provider.set("network", "Bytes Sent", "eth0", 1.0);

    let mut source = source(&provider, vec![spec("network", "Bytes Sent", "*")]);
    source.configure().await.unwrap();

    provider.set("network", "Bytes Sent", "eth1", 2.0);
    assert_eq!(source.read().await.len(), 1);
}

#[tokio::test]
async fn test_configure_rejects_empty_names() {
    let provider = FakeProvider::default();
    let mut source = source(&provider, vec![spec("memory", " , ", "")]);
    assert!(source.configure().await.is_err());
}

#[tokio::test]
async fn test_read_without_configure_resolves() {
    let provider = FakeProvider::default();
    provider.set("system", "Load Average 1", "", 0.5);

    let mut source = source(&provider, vec![spec("system", "Load Average 1", "")]);
    let samples = source.read().await;
    assert_eq!(samples[0].values, vec![0.5]);
}

#[tokio::test]
async fn test_refresh_runs_on_blocking_pool() {
    let provider = FakeProvider::default();
    provider.set("system", "Load Average 1", "", 0.5);

    let mut source = source(&provider, vec![spec("system", "Load Average 1", "")]);
    source.configure().await.unwrap();
    source.read().await;
    source.read().await;

    // one reading for configure, one per read
    let refreshed_on = provider.refreshed_on.lock().clone();
    assert_eq!(refreshed_on.len(), 3);
    let test_thread = std::thread::current().id();
    assert!(refreshed_on.iter().all(|id| *id != test_thread));
}
