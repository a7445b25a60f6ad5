//! StatsD metric model
//!
//! One `StatsdMetric` per (type, name) in the aggregator. Values received
//! between two reads are merged into it:
//!
//! | Type    | Merge                      | Reported value         |
//! |---------|----------------------------|------------------------|
//! | Counter | add                        | accumulated sum        |
//! | Gauge   | replace                    | last value             |
//! | Set     | insert into distinct set   | number of distinct     |
//! | Timer   | min / max / sum / count    | average (0 when idle)  |

use std::collections::HashSet;
use std::fmt;

use super::histogram::Histogram;

/// StatsD metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatsdType {
    Counter,
    Timer,
    Gauge,
    Set,
}

impl StatsdType {
    /// Parse the wire type token (`c`, `ms`, `g`, `s`), case-insensitive
    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("c") {
            Some(Self::Counter)
        } else if token.eq_ignore_ascii_case("ms") {
            Some(Self::Timer)
        } else if token.eq_ignore_ascii_case("g") {
            Some(Self::Gauge)
        } else if token.eq_ignore_ascii_case("s") {
            Some(Self::Set)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Timer => "timer",
            Self::Gauge => "gauge",
            Self::Set => "set",
        }
    }
}

impl fmt::Display for StatsdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timer statistics since the last reset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Latency {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub num: u64,
    pub histogram: Option<Histogram>,
}

impl Latency {
    fn new(value: f64, histogram: bool) -> Self {
        let mut latency = Self {
            histogram: histogram.then(Histogram::new),
            ..Default::default()
        };
        latency.add_value(value);
        latency
    }

    pub fn add_value(&mut self, value: f64) {
        if self.num == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum += value;
        self.num += 1;

        if let Some(histogram) = &mut self.histogram {
            histogram.add_value(value);
        }
    }

    /// Mean of the recorded values, 0 when nothing was recorded
    pub fn average(&self) -> f64 {
        if self.num == 0 {
            0.0
        } else {
            self.sum / self.num as f64
        }
    }

    pub fn reset(&mut self) {
        self.min = 0.0;
        self.max = 0.0;
        self.sum = 0.0;
        self.num = 0;
        if let Some(histogram) = &mut self.histogram {
            histogram.reset();
        }
    }
}

/// One parsed or aggregated StatsD metric
#[derive(Debug, Clone, PartialEq)]
pub struct StatsdMetric {
    name: String,
    kind: StatsdType,
    value: f64,
    set: HashSet<u64>,
    latency: Option<Latency>,
    num_updates: u64,
}

impl StatsdMetric {
    /// Create a metric holding a single value
    pub fn new(name: impl Into<String>, kind: StatsdType, value: f64) -> Self {
        Self::build(name.into(), kind, value, false)
    }

    /// Create a timer that also keeps a histogram of its values
    pub fn with_histogram(name: impl Into<String>, value: f64) -> Self {
        Self::build(name.into(), StatsdType::Timer, value, true)
    }

    fn build(name: String, kind: StatsdType, value: f64, histogram: bool) -> Self {
        let mut set = HashSet::new();
        let mut latency = None;
        match kind {
            StatsdType::Set => {
                set.insert(set_key(value));
            }
            StatsdType::Timer => latency = Some(Latency::new(value, histogram)),
            StatsdType::Counter | StatsdType::Gauge => {}
        }

        Self {
            name,
            kind,
            value,
            set,
            latency,
            num_updates: 1,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> StatsdType {
        self.kind
    }

    /// Value as received (after sample-rate scaling)
    #[inline]
    pub fn raw_value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn num_updates(&self) -> u64 {
        self.num_updates
    }

    pub fn latency(&self) -> Option<&Latency> {
        self.latency.as_ref()
    }

    /// Aggregator key: `<type>_<name>`
    pub fn key(&self) -> String {
        format!("{}_{}", self.kind, self.name)
    }

    /// Merge another observation
    pub fn add_value(&mut self, value: f64) {
        match self.kind {
            StatsdType::Counter => self.value += value,
            StatsdType::Gauge => self.value = value,
            StatsdType::Set => {
                self.set.insert(set_key(value));
            }
            StatsdType::Timer => {
                if let Some(latency) = &mut self.latency {
                    latency.add_value(value);
                }
            }
        }
        self.num_updates += 1;
    }

    /// Reported value for the current period
    pub fn value(&self) -> f64 {
        match self.kind {
            StatsdType::Set => self.set.len() as f64,
            StatsdType::Timer => self.latency.as_ref().map_or(0.0, Latency::average),
            StatsdType::Counter | StatsdType::Gauge => self.value,
        }
    }

    /// Start a new period; counters and gauges keep their value
    pub fn reset(&mut self) {
        self.num_updates = 0;
        match self.kind {
            StatsdType::Set => self.set.clear(),
            StatsdType::Timer => {
                if let Some(latency) = &mut self.latency {
                    latency.reset();
                }
            }
            StatsdType::Counter | StatsdType::Gauge => {}
        }
    }
}

/// Hashable identity of a set member; 0.0 and -0.0 are the same member
#[inline]
fn set_key(value: f64) -> u64 {
    if value == 0.0 { 0 } else { value.to_bits() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tokens() {
        assert_eq!(StatsdType::from_token("c"), Some(StatsdType::Counter));
        assert_eq!(StatsdType::from_token("MS"), Some(StatsdType::Timer));
        assert_eq!(StatsdType::from_token("G"), Some(StatsdType::Gauge));
        assert_eq!(StatsdType::from_token("s"), Some(StatsdType::Set));
        assert_eq!(StatsdType::from_token("h"), None);
        assert_eq!(StatsdType::from_token(""), None);
    }

    #[test]
    fn test_key() {
        let m = StatsdMetric::new("requests", StatsdType::Counter, 1.0);
        assert_eq!(m.key(), "counter_requests");
    }

    #[test]
    fn test_counter_adds() {
        let mut m = StatsdMetric::new("requests", StatsdType::Counter, 5.0);
        m.add_value(3.0);
        assert_eq!(m.value(), 8.0);
        assert_eq!(m.num_updates(), 2);
    }

    #[test]
    fn test_gauge_replaces() {
        let mut m = StatsdMetric::new("temp", StatsdType::Gauge, 5.0);
        m.add_value(3.0);
        assert_eq!(m.value(), 3.0);
    }

    #[test]
    fn test_set_counts_distinct() {
        let mut m = StatsdMetric::new("users", StatsdType::Set, 1.0);
        m.add_value(2.0);
        m.add_value(1.0);
        m.add_value(-0.0);
        m.add_value(0.0);
        assert_eq!(m.value(), 3.0);
    }

    #[test]
    fn test_timer_stats() {
        let mut m = StatsdMetric::new("db", StatsdType::Timer, 10.0);
        m.add_value(30.0);
        m.add_value(20.0);

        let lat = m.latency().unwrap();
        assert_eq!(lat.min, 10.0);
        assert_eq!(lat.max, 30.0);
        assert_eq!(lat.sum, 60.0);
        assert_eq!(lat.num, 3);
        assert_eq!(m.value(), 20.0);
        assert!(lat.histogram.is_none());
    }

    #[test]
    fn test_timer_histogram_includes_first_value() {
        let m = StatsdMetric::with_histogram("db", 10.0);
        let histogram = m.latency().unwrap().histogram.as_ref().unwrap();
        assert_eq!(histogram.count(), 1);
    }

    #[test]
    fn test_reset() {
        let mut set = StatsdMetric::new("users", StatsdType::Set, 1.0);
        set.reset();
        assert_eq!(set.value(), 0.0);
        assert_eq!(set.num_updates(), 0);

        let mut timer = StatsdMetric::new("db", StatsdType::Timer, 10.0);
        timer.reset();
        assert_eq!(timer.value(), 0.0);

        let mut counter = StatsdMetric::new("requests", StatsdType::Counter, 4.0);
        counter.reset();
        assert_eq!(counter.value(), 4.0);
    }

    #[test]
    fn test_timer_min_after_reset_tracks_new_values() {
        let mut m = StatsdMetric::new("db", StatsdType::Timer, 10.0);
        m.reset();
        m.add_value(40.0);
        m.add_value(50.0);
        assert_eq!(m.latency().unwrap().min, 40.0);
    }
}
