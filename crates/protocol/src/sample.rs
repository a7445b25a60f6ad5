//! Metric sample - the unit that flows from sources to sinks
//!
//! A sample is identified by `host.plugin.plugin_instance.type.type_instance`.
//! Metadata tags ride along with the sample but never take part in identity.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::types_db::TypesDb;

/// Largest magnitude rendered as a JSON integer (2^53)
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// One normalized metric observation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSample {
    /// Host the sample describes
    pub host: String,

    /// Producing plugin (e.g. `cpu`, `statsd`)
    pub plugin: String,

    /// Plugin instance (e.g. a cpu index or interface name), may be empty
    pub plugin_instance: String,

    /// Catalog type name, selects the data-source definitions
    pub type_name: String,

    /// Type instance, may be empty
    pub type_instance: String,

    /// Seconds since the Unix epoch, millisecond precision
    pub epoch: f64,

    /// Collection interval in seconds
    pub interval: u64,

    /// One value per data source of `type_name`
    pub values: Vec<f64>,

    /// Sorted metadata tags
    pub meta: BTreeMap<String, String>,
}

impl MetricSample {
    /// Create a sample with empty instances, no values and the current epoch
    pub fn new(
        host: impl Into<String>,
        plugin: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            plugin: plugin.into(),
            type_name: type_name.into(),
            epoch: now_epoch(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_plugin_instance(mut self, plugin_instance: impl Into<String>) -> Self {
        self.plugin_instance = plugin_instance.into();
        self
    }

    #[must_use]
    pub fn with_type_instance(mut self, type_instance: impl Into<String>) -> Self {
        self.type_instance = type_instance.into();
        self
    }

    #[must_use]
    pub fn with_values(mut self, values: Vec<f64>) -> Self {
        self.values = values;
        self
    }

    #[must_use]
    pub fn with_epoch(mut self, epoch: f64) -> Self {
        self.epoch = epoch;
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Identity key: `host.plugin.plugin_instance.type.type_instance`
    pub fn key(&self) -> String {
        format!(
            "{}.{}.{}.{}.{}",
            self.host, self.plugin, self.plugin_instance, self.type_name, self.type_instance
        )
    }

    /// Add tags the sample does not already carry
    ///
    /// Tags set by the producing source win over global ones.
    pub fn merge_meta(&mut self, tags: &BTreeMap<String, String>) {
        for (key, value) in tags {
            self.meta
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Render the sample as a single JSON object
    ///
    /// `dstypes` and `dsnames` come from the catalog entry for `type_name`;
    /// an unknown type renders both as empty arrays. Non-finite values
    /// (a rate that has no baseline yet) render as `null`.
    pub fn to_json(&self, types: &TypesDb) -> crate::Result<String> {
        let sources = types.get(&self.type_name);
        if sources.is_none() {
            tracing::debug!(type_name = %self.type_name, "type not found in catalog");
        }
        let sources = sources.unwrap_or_default();

        let record = JsonRecord {
            host: &self.host,
            plugin: &self.plugin,
            plugin_instance: &self.plugin_instance,
            type_name: &self.type_name,
            type_instance: &self.type_instance,
            time: JsonNumber(round_epoch(self.epoch)),
            interval: self.interval,
            dstypes: sources.iter().map(|ds| ds.kind.as_str()).collect(),
            dsnames: sources.iter().map(|ds| ds.name.as_str()).collect(),
            values: self.values.iter().copied().map(JsonNumber).collect(),
            meta: &self.meta,
        };

        Ok(serde_json::to_string(&record)?)
    }
}

impl fmt::Display for MetricSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?} @{}", self.key(), self.values, self.epoch)
    }
}

/// Current wall-clock time as epoch seconds, rounded to milliseconds
pub fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Round an epoch to millisecond precision (3 decimals)
#[inline]
pub fn round_epoch(epoch: f64) -> f64 {
    (epoch * 1000.0).round() / 1000.0
}

// =============================================================================
// JSON rendering
// =============================================================================

#[derive(Serialize)]
struct JsonRecord<'a> {
    host: &'a str,
    plugin: &'a str,
    plugin_instance: &'a str,
    #[serde(rename = "type")]
    type_name: &'a str,
    type_instance: &'a str,
    time: JsonNumber,
    interval: u64,
    dstypes: Vec<&'static str>,
    dsnames: Vec<&'a str>,
    values: Vec<JsonNumber>,
    #[serde(skip_serializing_if = "meta_is_empty")]
    meta: &'a BTreeMap<String, String>,
}

fn meta_is_empty(meta: &&BTreeMap<String, String>) -> bool {
    meta.is_empty()
}

/// Renders integral values without a fractional part (`123`, not `123.0`)
struct JsonNumber(f64);

impl Serialize for JsonNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let v = self.0;
        if !v.is_finite() {
            serializer.serialize_none()
        } else if v.fract() == 0.0 && v.abs() < MAX_EXACT_INTEGER {
            serializer.serialize_i64(v as i64)
        } else {
            serializer.serialize_f64(v)
        }
    }
}
