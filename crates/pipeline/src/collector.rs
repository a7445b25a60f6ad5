//! Metric collector
//!
//! Owns the registered sources and sinks and runs three independent loops
//! around one bounded queue:
//!
//! ```text
//!            every interval              continuously             every timeout
//! [Sources] --read()--> [MetricQueue] --pop--> [RateAggregator] --> [Sinks]
//!                                                     ^
//!                                              [evict loop] remove_expired_entries()
//! ```
//!
//! # Lifecycle
//!
//! `configure()` then `start()` (adapters first, then loops), and finally
//! `stop()`: cancels a shared token, waits for all three loops to hand their
//! adapters back, then stops every adapter.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;

use meterd_protocol::{MetricSink, MetricSource, TypesDb};

use crate::error::{PipelineError, Result};
use crate::metrics::{CollectorMetrics, MetricsSnapshot};
use crate::queue::MetricQueue;
use crate::rate::{RateAggregator, RateOutcome};

/// Boxed source adapter
pub type BoxedSource = Box<dyn MetricSource>;

/// Boxed sink adapter
pub type BoxedSink = Box<dyn MetricSink>;

/// Default sleep of the write loop when the queue is empty
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_secs(1);

// =============================================================================
// Configuration
// =============================================================================

/// Collector timing and queue settings
///
/// Values are used as given; the 10s interval floor and the timeout rule
/// are applied when building this from the general settings.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Read loop period, also stamped on every sample
    pub interval: Duration,

    /// Rate cache expiry, also the eviction loop period
    pub timeout: Duration,

    /// Convert counters into rates
    pub store_rates: bool,

    /// Queue capacity before the oldest samples are dropped
    pub queue_capacity: usize,

    /// Write loop sleep when there is nothing to write
    pub idle_sleep: Duration,

    /// Tags merged into every sample
    pub metadata: BTreeMap<String, String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            store_rates: true,
            queue_capacity: 30_000,
            idle_sleep: DEFAULT_IDLE_SLEEP,
            metadata: BTreeMap::new(),
        }
    }
}

impl CollectorConfig {
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_store_rates(mut self, store_rates: bool) -> Self {
        self.store_rates = store_rates;
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

// =============================================================================
// Metrics handle
// =============================================================================

/// Cloneable view of collector counters, valid while the collector runs
#[derive(Clone)]
pub struct CollectorMetricsHandle {
    metrics: Arc<CollectorMetrics>,
    queue: Arc<MetricQueue>,
    aggregator: Arc<RateAggregator>,
}

impl CollectorMetricsHandle {
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Samples waiting for the write loop
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Series tracked by the rate cache
    pub fn rate_entries(&self) -> usize {
        self.aggregator.len()
    }
}

// =============================================================================
// Collector
// =============================================================================

/// Handles of the running loops
struct Workers {
    cancel: CancellationToken,
    read: JoinHandle<Vec<BoxedSource>>,
    write: JoinHandle<Vec<BoxedSink>>,
    evict: JoinHandle<()>,
}

/// Read / write / evict pipeline over pluggable adapters
pub struct Collector {
    config: CollectorConfig,
    sources: Vec<BoxedSource>,
    sinks: Vec<BoxedSink>,
    queue: Arc<MetricQueue>,
    aggregator: Arc<RateAggregator>,
    metrics: Arc<CollectorMetrics>,
    workers: Option<Workers>,
}

impl Collector {
    pub fn new(config: CollectorConfig, types: Arc<TypesDb>) -> Self {
        let queue = Arc::new(MetricQueue::new(config.queue_capacity));
        let aggregator = Arc::new(RateAggregator::new(
            types,
            config.timeout,
            config.store_rates,
        ));

        Self {
            config,
            sources: Vec::new(),
            sinks: Vec::new(),
            queue,
            aggregator,
            metrics: Arc::new(CollectorMetrics::new()),
            workers: None,
        }
    }

    /// Register a source; only valid before `start`
    pub fn add_source(&mut self, source: BoxedSource) {
        self.sources.push(source);
    }

    /// Register a sink; only valid before `start`
    pub fn add_sink(&mut self, sink: BoxedSink) {
        self.sinks.push(sink);
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_running(&self) -> bool {
        self.workers.is_some()
    }

    pub fn metrics_handle(&self) -> CollectorMetricsHandle {
        CollectorMetricsHandle {
            metrics: Arc::clone(&self.metrics),
            queue: Arc::clone(&self.queue),
            aggregator: Arc::clone(&self.aggregator),
        }
    }

    /// Configure every adapter, sources first
    pub async fn configure(&mut self) -> Result<()> {
        for source in &mut self.sources {
            source
                .configure()
                .await
                .map_err(|e| PipelineError::adapter(source.name(), e))?;
        }
        for sink in &mut self.sinks {
            sink.configure()
                .await
                .map_err(|e| PipelineError::adapter(sink.name(), e))?;
        }
        Ok(())
    }

    /// Start every adapter, then spawn the three loops
    pub async fn start(&mut self) -> Result<()> {
        if self.workers.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }

        for sink in &mut self.sinks {
            sink.start()
                .await
                .map_err(|e| PipelineError::adapter(sink.name(), e))?;
        }
        for source in &mut self.sources {
            source
                .start()
                .await
                .map_err(|e| PipelineError::adapter(source.name(), e))?;
        }

        let cancel = CancellationToken::new();

        let write = tokio::spawn(
            WriteLoop {
                sinks: std::mem::take(&mut self.sinks),
                queue: Arc::clone(&self.queue),
                aggregator: Arc::clone(&self.aggregator),
                metrics: Arc::clone(&self.metrics),
                interval_secs: self.config.interval.as_secs(),
                idle_sleep: self.config.idle_sleep,
                metadata: self.config.metadata.clone(),
                cancel: cancel.clone(),
            }
            .run(),
        );

        let read = tokio::spawn(read_loop(
            std::mem::take(&mut self.sources),
            Arc::clone(&self.queue),
            Arc::clone(&self.metrics),
            self.config.interval,
            cancel.clone(),
        ));

        let evict = tokio::spawn(evict_loop(
            Arc::clone(&self.aggregator),
            Arc::clone(&self.metrics),
            self.config.timeout,
            cancel.clone(),
        ));

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            timeout_secs = self.config.timeout.as_secs(),
            store_rates = self.config.store_rates,
            queue_capacity = self.queue.capacity(),
            "collector started"
        );

        self.workers = Some(Workers {
            cancel,
            read,
            write,
            evict,
        });
        Ok(())
    }

    /// Signal all loops, wait for them, then stop every adapter
    ///
    /// Adapters are stopped even if a loop failed; the first loop failure
    /// is returned afterwards.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(workers) = self.workers.take() else {
            return Err(PipelineError::NotRunning);
        };

        workers.cancel.cancel();

        let mut failure = None;

        match workers.read.await {
            Ok(sources) => self.sources = sources,
            Err(e) => failure = Some(worker_failed("read", e)),
        }
        match workers.write.await {
            Ok(sinks) => self.sinks = sinks,
            Err(e) => failure = failure.or(Some(worker_failed("write", e))),
        }
        if let Err(e) = workers.evict.await {
            failure = failure.or(Some(worker_failed("evict", e)));
        }

        for source in &mut self.sources {
            source.stop().await;
        }
        for sink in &mut self.sinks {
            sink.stop().await;
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            read_cycles = snapshot.read_cycles,
            samples_read = snapshot.samples_read,
            samples_dropped = snapshot.samples_dropped,
            samples_written = snapshot.samples_written,
            rate_skipped = snapshot.rate_skipped,
            flushes = snapshot.flushes,
            entries_expired = snapshot.entries_expired,
            queued = self.queue.len(),
            "collector stopped"
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn worker_failed(worker: &'static str, e: tokio::task::JoinError) -> PipelineError {
    PipelineError::WorkerFailed {
        worker,
        message: e.to_string(),
    }
}

// =============================================================================
// Loops
// =============================================================================

/// Read every source once per interval and enqueue the results
async fn read_loop(
    mut sources: Vec<BoxedSource>,
    queue: Arc<MetricQueue>,
    metrics: Arc<CollectorMetrics>,
    period: Duration,
    cancel: CancellationToken,
) -> Vec<BoxedSource> {
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let mut total = 0u64;
        for source in &mut sources {
            let samples = source.read().await;
            if samples.is_empty() {
                continue;
            }
            tracing::trace!(source = %source.name(), count = samples.len(), "source read");
            total += samples.len() as u64;
            metrics.record_dropped(queue.push_all(samples));
        }
        metrics.record_read(total);
    }

    tracing::debug!("read loop stopped");
    sources
}

/// Drain the queue into the sinks
struct WriteLoop {
    sinks: Vec<BoxedSink>,
    queue: Arc<MetricQueue>,
    aggregator: Arc<RateAggregator>,
    metrics: Arc<CollectorMetrics>,
    interval_secs: u64,
    idle_sleep: Duration,
    metadata: BTreeMap<String, String>,
    cancel: CancellationToken,
}

impl WriteLoop {
    async fn run(mut self) -> Vec<BoxedSink> {
        let mut needs_flush = false;

        while !self.cancel.is_cancelled() {
            while let Some(mut sample) = self.queue.pop() {
                needs_flush = true;

                sample.interval = self.interval_secs;
                sample.merge_meta(&self.metadata);
                if self.aggregator.aggregate(&mut sample) == RateOutcome::Skipped {
                    self.metrics.record_rate_skipped();
                }

                for sink in &mut self.sinks {
                    sink.write(&sample).await;
                }
                self.metrics.record_written();

                if self.cancel.is_cancelled() {
                    break;
                }
            }

            if needs_flush {
                needs_flush = false;
                for sink in &mut self.sinks {
                    sink.flush().await;
                }
                self.metrics.record_flush();
            }

            if self.queue.is_empty() {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    _ = self.queue.notified() => {}
                    _ = sleep(self.idle_sleep) => {}
                }
            }
        }

        tracing::debug!("write loop stopped");
        self.sinks
    }
}

/// Sweep expired rate entries once per timeout
async fn evict_loop(
    aggregator: Arc<RateAggregator>,
    metrics: Arc<CollectorMetrics>,
    period: Duration,
    cancel: CancellationToken,
) {
    loop {
        let removed = aggregator.remove_expired_entries();
        metrics.record_expired(removed as u64);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sleep(period) => {}
        }
    }

    tracing::debug!("evict loop stopped");
}

#[cfg(test)]
#[path = "collector_test.rs"]
mod collector_test;
