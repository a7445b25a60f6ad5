//! Rate aggregator
//!
//! Converts counter, derive and absolute values into per-second rates by
//! remembering the previous raw value of every series.
//!
//! # Design
//!
//! - One cache entry per sample key, created on first sighting
//! - The first sample of a rate-kind value emits NaN (no baseline yet)
//! - `aggregate` rewrites the caller's sample in place and updates the cache
//! - Elapsed time is `cached_epoch - now`, so rates of increasing counters
//!   come out negative; consumers rely on this sign
//! - Entries idle for longer than the timeout are swept by `remove_expired_entries`
//! - The whole table sits behind one mutex
//!
//! # Example
//!
//! ```ignore
//! let aggregator = RateAggregator::new(types, Duration::from_secs(30), true);
//! aggregator.aggregate(&mut sample); // sample.values now hold rates
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use meterd_protocol::{DsKind, MetricSample, TypesDb, now_epoch};

/// Result of one `aggregate` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateOutcome {
    /// Rate conversion is turned off
    Disabled,
    /// Unknown type or value count mismatch, sample untouched
    Skipped,
    /// First sample of the series, rate values set to NaN
    Baseline,
    /// Rates computed from the cached baseline
    Updated,
}

/// Per-series state
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Last raw value per data source
    raw: Vec<f64>,
    /// Last emitted sample
    rate: MetricSample,
}

impl CacheEntry {
    #[inline]
    fn epoch(&self) -> f64 {
        self.rate.epoch
    }
}

/// Per-series rate cache
pub struct RateAggregator {
    types: Arc<TypesDb>,
    timeout_secs: f64,
    store_rates: bool,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl RateAggregator {
    pub fn new(types: Arc<TypesDb>, timeout: Duration, store_rates: bool) -> Self {
        Self {
            types,
            timeout_secs: timeout.as_secs_f64(),
            store_rates,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Convert `sample` to rates using the wall clock
    pub fn aggregate(&self, sample: &mut MetricSample) -> RateOutcome {
        self.aggregate_at(sample, now_epoch())
    }

    /// Convert `sample` to rates as of `now` (epoch seconds)
    pub fn aggregate_at(&self, sample: &mut MetricSample, now: f64) -> RateOutcome {
        if !self.store_rates {
            return RateOutcome::Disabled;
        }

        let Some(sources) = self.types.get(&sample.type_name) else {
            return RateOutcome::Skipped;
        };
        if sources.len() != sample.values.len() {
            tracing::trace!(
                key = %sample.key(),
                expected = sources.len(),
                actual = sample.values.len(),
                "value count does not match catalog, rate skipped"
            );
            return RateOutcome::Skipped;
        }

        let key = sample.key();
        let mut cache = self.cache.lock();

        let Some(entry) = cache.get_mut(&key) else {
            let mut baseline = CacheEntry {
                raw: sample.values.clone(),
                rate: sample.clone(),
            };
            for (i, ds) in sources.iter().enumerate() {
                if ds.kind.is_rate() {
                    sample.values[i] = f64::NAN;
                    baseline.rate.values[i] = f64::NAN;
                }
            }
            baseline.rate.epoch = now;
            cache.insert(key, baseline);
            return RateOutcome::Baseline;
        };

        // every index divides by the same interval
        let time_diff = entry.epoch() - now;
        for (i, ds) in sources.iter().enumerate() {
            let new = sample.values[i];
            let old = entry.raw[i];

            let value = match ds.kind {
                DsKind::Gauge => new,
                DsKind::Absolute => new / time_diff,
                DsKind::Derive => (new - old) / time_diff,
                DsKind::Counter if new < old => new / time_diff,
                DsKind::Counter => (new - old) / time_diff,
            };

            entry.raw[i] = new;
            entry.rate.values[i] = value;
            sample.values[i] = value;

            if let Some(clamped) = ds.clamp(sample.values[i]) {
                sample.values[i] = clamped;
                entry.raw[i] = clamped;
            }
        }
        entry.rate.epoch = now;

        RateOutcome::Updated
    }

    /// Drop series not updated within the timeout, using the wall clock
    pub fn remove_expired_entries(&self) -> usize {
        self.remove_expired_entries_at(now_epoch())
    }

    /// Drop series whose last update is older than `now - timeout`
    pub fn remove_expired_entries_at(&self, now: f64) -> usize {
        if !self.store_rates {
            return 0;
        }

        let expiration = now - self.timeout_secs;
        let mut cache = self.cache.lock();
        let before = cache.len();
        cache.retain(|_, entry| entry.epoch() >= expiration);
        let removed = before - cache.len();

        if removed > 0 {
            tracing::debug!(removed, remaining = cache.len(), "removed expired rate entries");
        }
        removed
    }

    /// Number of tracked series
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    #[inline]
    pub fn store_rates(&self) -> bool {
        self.store_rates
    }
}

impl std::fmt::Debug for RateAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateAggregator")
            .field("timeout_secs", &self.timeout_secs)
            .field("store_rates", &self.store_rates)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "rate_test.rs"]
mod rate_test;
