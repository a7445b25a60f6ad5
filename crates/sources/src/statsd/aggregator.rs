//! StatsD aggregator
//!
//! Merges parsed metrics between reads and turns them into samples.
//!
//! # Read output
//!
//! | StatsD type | type name | type instance                  | value          |
//! |-------------|-----------|--------------------------------|----------------|
//! | counter     | `derive`  | `<name>`                       | running total  |
//! | gauge       | `gauge`   | `<name>`                       | last value     |
//! | set         | `objects` | `<name>`                       | distinct count |
//! | timer       | `latency` | `<name>-average`               | mean           |
//! | timer       | `latency` | `<name>-lower` / `-upper`      | min / max      |
//! | timer       | `latency` | `<name>-Sum` / `-count`        | sum / count    |
//! | timer       | `latency` | `<name>-percentile-<p>`        | histogram      |
//!
//! Every read resets the per-period state. A metric that received no
//! update since the previous read is removed instead of reported when the
//! delete policy for its type is enabled.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use meterd_protocol::{MetricSample, STATSD_PLUGIN, now_epoch, round_epoch};

use super::metric::{StatsdMetric, StatsdType};

/// Which idle metrics are removed on read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletePolicy {
    pub counters: bool,
    pub timers: bool,
    pub gauges: bool,
    pub sets: bool,
}

impl DeletePolicy {
    #[inline]
    pub fn applies_to(&self, kind: StatsdType) -> bool {
        match kind {
            StatsdType::Counter => self.counters,
            StatsdType::Timer => self.timers,
            StatsdType::Gauge => self.gauges,
            StatsdType::Set => self.sets,
        }
    }
}

/// Extra samples reported for timers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimerOutputs {
    pub lower: bool,
    pub upper: bool,
    pub sum: bool,
    pub count: bool,
    pub percentiles: Vec<f64>,
}

impl TimerOutputs {
    /// Histograms are kept only when percentiles are reported
    #[inline]
    pub fn histogram_enabled(&self) -> bool {
        !self.percentiles.is_empty()
    }
}

/// Merge table for received StatsD metrics
pub struct StatsdAggregator {
    hostname: String,
    delete: DeletePolicy,
    timer: TimerOutputs,
    histogram: bool,
    metrics: Mutex<BTreeMap<String, StatsdMetric>>,
}

impl StatsdAggregator {
    pub fn new(hostname: impl Into<String>, delete: DeletePolicy, timer: TimerOutputs) -> Self {
        let histogram = timer.histogram_enabled();
        let hostname = hostname.into();

        tracing::info!(
            hostname = %hostname,
            delete_counters = delete.counters,
            delete_timers = delete.timers,
            delete_gauges = delete.gauges,
            delete_sets = delete.sets,
            histogram,
            "statsd aggregator configured"
        );

        Self {
            hostname,
            delete,
            timer,
            histogram,
            metrics: Mutex::new(BTreeMap::new()),
        }
    }

    #[inline]
    pub fn histogram_enabled(&self) -> bool {
        self.histogram
    }

    /// Merge one metric into the table
    pub fn add_metric(&self, metric: StatsdMetric) {
        let key = metric.key();
        let mut metrics = self.metrics.lock();

        if let Some(existing) = metrics.get_mut(&key) {
            existing.add_value(metric.raw_value());
            return;
        }

        let metric = if self.histogram && metric.kind() == StatsdType::Timer {
            StatsdMetric::with_histogram(metric.name(), metric.raw_value())
        } else {
            metric
        };
        metrics.insert(key, metric);
    }

    /// Number of tracked metrics
    pub fn len(&self) -> usize {
        self.metrics.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.lock().is_empty()
    }

    /// Report every live metric, reset the period and drop idle entries
    pub fn read(&self) -> Vec<MetricSample> {
        self.read_at(round_epoch(now_epoch()))
    }

    /// `read` with an explicit sample epoch
    pub fn read_at(&self, epoch: f64) -> Vec<MetricSample> {
        let mut metrics = self.metrics.lock();
        let mut samples = Vec::with_capacity(metrics.len());
        let mut idle = Vec::new();

        for (key, metric) in metrics.iter_mut() {
            if metric.num_updates() == 0 && self.delete.applies_to(metric.kind()) {
                idle.push(key.clone());
                continue;
            }

            self.report(metric, epoch, &mut samples);
            metric.reset();
        }

        if !idle.is_empty() {
            tracing::debug!(removed = idle.len(), "removing statsd entries without updates");
            for key in &idle {
                metrics.remove(key);
            }
        }

        samples
    }

    fn report(&self, metric: &StatsdMetric, epoch: f64, out: &mut Vec<MetricSample>) {
        let name = metric.name();
        let (type_name, type_instance) = match metric.kind() {
            StatsdType::Gauge => ("gauge", name.to_string()),
            StatsdType::Timer => ("latency", format!("{name}-average")),
            StatsdType::Set => ("objects", name.to_string()),
            StatsdType::Counter => ("derive", name.to_string()),
        };

        let base = MetricSample::new(self.hostname.as_str(), STATSD_PLUGIN, type_name)
            .with_epoch(epoch)
            .with_type_instance(type_instance)
            .with_values(vec![metric.value()]);

        let Some(latency) = metric.latency() else {
            out.push(base);
            return;
        };

        let derived = |suffix: &str, value: f64| {
            let mut sample = base.clone();
            sample.type_instance = format!("{name}-{suffix}");
            sample.values = vec![value];
            sample
        };

        let mut extra = Vec::new();
        if self.timer.lower {
            extra.push(derived("lower", latency.min));
        }
        if self.timer.upper {
            extra.push(derived("upper", latency.max));
        }
        if self.timer.sum {
            extra.push(derived("Sum", latency.sum));
        }
        if self.timer.count {
            extra.push(derived("count", latency.num as f64));
        }
        if let Some(histogram) = &latency.histogram {
            for &p in &self.timer.percentiles {
                extra.push(derived(&format!("percentile-{p}"), histogram.percentile(p)));
            }
        }

        out.push(base);
        out.extend(extra);
    }
}

impl std::fmt::Debug for StatsdAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsdAggregator")
            .field("hostname", &self.hostname)
            .field("delete", &self.delete)
            .field("timer", &self.timer)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "aggregator_test.rs"]
mod aggregator_test;
