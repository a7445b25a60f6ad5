//! Tests for the collector loops

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use meterd_protocol::{
    AdapterError, DataSource, DsKind, MetricSample, MetricSink, MetricSource, TypesDb,
};

use super::*;

// =============================================================================
// Test adapters
// =============================================================================

/// Source returning one scripted batch per read, then nothing
struct ScriptedSource {
    batches: Arc<Mutex<VecDeque<Vec<MetricSample>>>>,
    reads: Arc<AtomicU64>,
    stopped: Arc<AtomicBool>,
    fail_configure: bool,
}

impl ScriptedSource {
    fn new(batches: Vec<Vec<MetricSample>>) -> Self {
        Self {
            batches: Arc::new(Mutex::new(batches.into())),
            reads: Arc::new(AtomicU64::new(0)),
            stopped: Arc::new(AtomicBool::new(false)),
            fail_configure: false,
        }
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn configure(&mut self) -> std::result::Result<(), AdapterError> {
        if self.fail_configure {
            return Err(AdapterError::config("scripted", "bad settings"));
        }
        Ok(())
    }

    async fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    async fn read(&mut self) -> Vec<MetricSample> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().pop_front().unwrap_or_default()
    }
}

#[derive(Default)]
struct SinkState {
    written: Vec<MetricSample>,
    flushes: u64,
    started: bool,
    stopped: bool,
}

/// Sink recording everything it sees
#[derive(Clone, Default)]
struct RecordingSink {
    state: Arc<Mutex<SinkState>>,
}

#[async_trait]
impl MetricSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(&mut self) -> std::result::Result<(), AdapterError> {
        self.state.lock().started = true;
        Ok(())
    }

    async fn stop(&mut self) {
        self.state.lock().stopped = true;
    }

    async fn write(&mut self, sample: &MetricSample) {
        self.state.lock().written.push(sample.clone());
    }

    async fn flush(&mut self) {
        self.state.lock().flushes += 1;
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn catalog() -> Arc<TypesDb> {
    let mut types = TypesDb::new();
    types.insert("gauge", vec![DataSource::new("value", DsKind::Gauge, f64::NAN, f64::NAN)]);
    types.insert("derive", vec![DataSource::new("value", DsKind::Derive, f64::NAN, f64::NAN)]);
    Arc::new(types)
}

fn fast_config() -> CollectorConfig {
    CollectorConfig::default()
        .with_interval(Duration::from_millis(20))
        .with_idle_sleep(Duration::from_millis(5))
}

fn sample(type_name: &str, type_instance: &str, value: f64) -> MetricSample {
    MetricSample::new("host", "test", type_name)
        .with_type_instance(type_instance)
        .with_values(vec![value])
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// =============================================================================
// Flow
// =============================================================================

#[tokio::test]
async fn test_samples_flow_to_sink() {
    let mut metadata = BTreeMap::new();
    metadata.insert("dc".to_string(), "eu".to_string());
    metadata.insert("role".to_string(), "default".to_string());

    // first tick fires immediately, so a long interval still reads once
    let config = CollectorConfig::default()
        .with_interval(Duration::from_secs(5))
        .with_idle_sleep(Duration::from_millis(5))
        .with_metadata(metadata);

    let source = ScriptedSource::new(vec![vec![
        sample("gauge", "a", 1.0).with_meta("role", "db"),
        sample("gauge", "b", 2.0),
    ]]);
    let sink = RecordingSink::default();
    let state = Arc::clone(&sink.state);

    let mut collector = Collector::new(config, catalog());
    collector.add_source(Box::new(source));
    collector.add_sink(Box::new(sink));
    collector.configure().await.unwrap();
    collector.start().await.unwrap();

    wait_until(|| state.lock().written.len() == 2).await;
    wait_until(|| state.lock().flushes >= 1).await;
    collector.stop().await.unwrap();

    let state = state.lock();
    assert!(state.started);
    assert!(state.stopped);

    let first = &state.written[0];
    assert_eq!(first.type_instance, "a");
    assert_eq!(first.interval, 5);
    assert_eq!(first.values, vec![1.0]);
    assert_eq!(first.meta.get("dc").map(String::as_str), Some("eu"));
    // existing tags win over configured ones
    assert_eq!(first.meta.get("role").map(String::as_str), Some("db"));

    let second = &state.written[1];
    assert_eq!(second.type_instance, "b");
    assert_eq!(second.meta.get("role").map(String::as_str), Some("default"));
}

#[tokio::test]
async fn test_write_order_is_fifo() {
    let batch: Vec<_> = (0..50)
        .map(|i| sample("gauge", &i.to_string(), i as f64))
        .collect();
    let sink = RecordingSink::default();
    let state = Arc::clone(&sink.state);

    let mut collector = Collector::new(fast_config(), catalog());
    collector.add_source(Box::new(ScriptedSource::new(vec![batch])));
    collector.add_sink(Box::new(sink));
    collector.start().await.unwrap();

    wait_until(|| state.lock().written.len() == 50).await;
    collector.stop().await.unwrap();

    let order: Vec<_> = state
        .lock()
        .written
        .iter()
        .map(|s| s.type_instance.parse::<u32>().unwrap())
        .collect();
    assert_eq!(order, (0..50).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_derive_becomes_rate() {
    let source = ScriptedSource::new(vec![
        vec![sample("derive", "", 100.0)],
        vec![sample("derive", "", 200.0)],
    ]);
    let sink = RecordingSink::default();
    let state = Arc::clone(&sink.state);

    let mut collector = Collector::new(fast_config(), catalog());
    collector.add_source(Box::new(source));
    collector.add_sink(Box::new(sink));
    collector.start().await.unwrap();

    wait_until(|| state.lock().written.len() == 2).await;
    collector.stop().await.unwrap();

    let state = state.lock();
    assert!(state.written[0].values[0].is_nan());
    // elapsed time is old minus new, so an increasing series is negative
    assert!(state.written[1].values[0] < 0.0);
}

#[tokio::test]
async fn test_unknown_type_counted_as_skipped() {
    let source = ScriptedSource::new(vec![vec![sample("mystery", "", 3.0)]]);
    let sink = RecordingSink::default();
    let state = Arc::clone(&sink.state);

    let mut collector = Collector::new(fast_config(), catalog());
    let handle = collector.metrics_handle();
    collector.add_source(Box::new(source));
    collector.add_sink(Box::new(sink));
    collector.start().await.unwrap();

    wait_until(|| state.lock().written.len() == 1).await;
    collector.stop().await.unwrap();

    assert_eq!(state.lock().written[0].values, vec![3.0]);
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.rate_skipped, 1);
    assert_eq!(snapshot.samples_written, 1);
    assert!(snapshot.read_cycles >= 1);
}

#[tokio::test]
async fn test_store_rates_disabled_passes_raw_values() {
    let source = ScriptedSource::new(vec![
        vec![sample("derive", "", 100.0)],
        vec![sample("derive", "", 200.0)],
    ]);
    let sink = RecordingSink::default();
    let state = Arc::clone(&sink.state);

    let mut collector = Collector::new(fast_config().with_store_rates(false), catalog());
    let handle = collector.metrics_handle();
    collector.add_source(Box::new(source));
    collector.add_sink(Box::new(sink));
    collector.start().await.unwrap();

    wait_until(|| state.lock().written.len() == 2).await;
    collector.stop().await.unwrap();

    let values: Vec<_> = state.lock().written.iter().map(|s| s.values[0]).collect();
    assert_eq!(values, vec![100.0, 200.0]);
    assert_eq!(handle.rate_entries(), 0);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_stop_is_prompt_with_long_interval() {
    let config = CollectorConfig::default()
        .with_interval(Duration::from_secs(3600))
        .with_timeout(Duration::from_secs(3600))
        .with_idle_sleep(Duration::from_secs(3600));

    let source = ScriptedSource::new(Vec::new());
    let stopped = Arc::clone(&source.stopped);
    let sink = RecordingSink::default();
    let state = Arc::clone(&sink.state);

    let mut collector = Collector::new(config, catalog());
    collector.add_source(Box::new(source));
    collector.add_sink(Box::new(sink));
    collector.start().await.unwrap();
    assert!(collector.is_running());

    tokio::time::timeout(Duration::from_secs(2), collector.stop())
        .await
        .expect("stop timed out")
        .unwrap();

    assert!(!collector.is_running());
    assert!(stopped.load(Ordering::SeqCst));
    assert!(state.lock().stopped);
    // adapters are handed back after stop
    assert_eq!(collector.source_count(), 1);
    assert_eq!(collector.sink_count(), 1);
}

#[tokio::test]
async fn test_start_twice_fails() {
    let mut collector = Collector::new(fast_config(), catalog());
    collector.start().await.unwrap();
    assert!(matches!(
        collector.start().await,
        Err(PipelineError::AlreadyRunning)
    ));
    collector.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_without_start_fails() {
    let mut collector = Collector::new(fast_config(), catalog());
    assert!(matches!(
        collector.stop().await,
        Err(PipelineError::NotRunning)
    ));
}

#[tokio::test]
async fn test_configure_failure_names_adapter() {
    let mut source = ScriptedSource::new(Vec::new());
    source.fail_configure = true;

    let mut collector = Collector::new(fast_config(), catalog());
    collector.add_source(Box::new(source));

    let err = collector.configure().await.unwrap_err();
    match err {
        PipelineError::Adapter { name, .. } => assert_eq!(name, "scripted"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_restart_after_stop() {
    let source = ScriptedSource::new(Vec::new());
    let reads = Arc::clone(&source.reads);

    let mut collector = Collector::new(fast_config(), catalog());
    collector.add_source(Box::new(source));

    collector.start().await.unwrap();
    wait_until(|| reads.load(Ordering::SeqCst) >= 1).await;
    collector.stop().await.unwrap();

    let before = reads.load(Ordering::SeqCst);
    collector.start().await.unwrap();
    wait_until(|| reads.load(Ordering::SeqCst) > before).await;
    collector.stop().await.unwrap();
}

#[test]
fn test_config_builders() {
    let config = CollectorConfig::default()
        .with_interval(Duration::from_secs(15))
        .with_timeout(Duration::from_secs(45))
        .with_queue_capacity(8)
        .with_store_rates(false);

    assert_eq!(config.interval, Duration::from_secs(15));
    assert_eq!(config.timeout, Duration::from_secs(45));
    assert_eq!(config.queue_capacity, 8);
    assert!(!config.store_rates);
    assert_eq!(config.idle_sleep, DEFAULT_IDLE_SLEEP);
}
