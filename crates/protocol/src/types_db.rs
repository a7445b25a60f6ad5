//! Type catalog (`types.db`)
//!
//! Maps a type name to its ordered data-source definitions. The catalog is
//! loaded once at startup and shared read-only; there is no reload.
//!
//! # Format
//!
//! ```text
//! # comment
//! if_octets   rx:DERIVE:0:U, tx:DERIVE:0:U
//! percent     value:GAUGE:0:100.1
//! ```
//!
//! Kinds are case-insensitive. `U` (or `u`) as a bound means unbounded.
//! A malformed line is logged and skipped; the rest of the file still loads.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Data source kind, drives rate computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DsKind {
    /// Instantaneous value, never rate-converted
    Gauge,
    /// Monotonic counter, may wrap
    Counter,
    /// Counter that may go down
    Derive,
    /// Counter reset on every read
    Absolute,
}

impl DsKind {
    /// Lowercase name used in JSON `dstypes`
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
            Self::Derive => "derive",
            Self::Absolute => "absolute",
        }
    }

    /// Whether samples of this kind are converted to a rate
    #[inline]
    pub fn is_rate(&self) -> bool {
        !matches!(self, Self::Gauge)
    }
}

impl fmt::Display for DsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DsKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gauge" => Ok(Self::Gauge),
            "counter" => Ok(Self::Counter),
            "derive" => Ok(Self::Derive),
            "absolute" => Ok(Self::Absolute),
            _ => Err(ProtocolError::UnknownDsKind(s.to_string())),
        }
    }
}

/// One named value slot of a type
#[derive(Debug, Clone, PartialEq)]
pub struct DataSource {
    pub name: String,
    pub kind: DsKind,
    /// Lower bound, NaN when unbounded
    pub min: f64,
    /// Upper bound, NaN when unbounded
    pub max: f64,
}

impl DataSource {
    pub fn new(name: impl Into<String>, kind: DsKind, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            min,
            max,
        }
    }

    /// Clamp a value into `[min, max]`, ignoring NaN bounds
    ///
    /// Returns `None` when the value is already in range.
    pub fn clamp(&self, value: f64) -> Option<f64> {
        if !self.min.is_nan() && value < self.min {
            return Some(self.min);
        }
        if !self.max.is_nan() && value > self.max {
            return Some(self.max);
        }
        None
    }
}

/// Immutable catalog of type definitions
#[derive(Debug, Clone, Default)]
pub struct TypesDb {
    types: HashMap<String, Vec<DataSource>>,
}

impl TypesDb {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the catalog from a file
    ///
    /// # Errors
    ///
    /// Returns an error only if the file cannot be read. Malformed lines
    /// are logged and skipped.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ProtocolError::CatalogRead {
            path: path.display().to_string(),
            source: e,
        })?;

        let db = Self::parse(&contents);
        tracing::info!(
            path = %path.display(),
            types = db.len(),
            "types catalog loaded"
        );
        Ok(db)
    }

    /// Parse catalog contents, skipping (and logging) malformed lines
    pub fn parse(contents: &str) -> Self {
        let mut db = Self::new();

        for (idx, line) in contents.lines().enumerate() {
            match parse_line(idx + 1, line) {
                Ok(Some((name, sources))) => {
                    db.types.insert(name, sources);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, line = %line, "skipping types catalog line");
                }
            }
        }

        db
    }

    /// Add or replace a type definition
    pub fn insert(&mut self, type_name: impl Into<String>, sources: Vec<DataSource>) {
        self.types.insert(type_name.into(), sources);
    }

    /// Data sources of a type, in declaration order
    #[inline]
    pub fn get(&self, type_name: &str) -> Option<&[DataSource]> {
        self.types.get(type_name).map(Vec::as_slice)
    }

    #[inline]
    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Parse one catalog line
///
/// Returns `Ok(None)` for comments and blank lines.
pub(crate) fn parse_line(
    line_number: usize,
    line: &str,
) -> crate::Result<Option<(String, Vec<DataSource>)>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let split = trimmed
        .find(char::is_whitespace)
        .ok_or_else(|| ProtocolError::invalid_line(line_number, "no data sources"))?;
    let (name, rest) = trimmed.split_at(split);
    if !is_word(name) {
        return Err(ProtocolError::invalid_line(
            line_number,
            format!("invalid type name '{name}'"),
        ));
    }

    let mut sources = Vec::new();
    for spec in rest.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        sources.push(parse_data_source(line_number, spec)?);
    }

    if sources.is_empty() {
        return Err(ProtocolError::invalid_line(line_number, "no data sources"));
    }

    Ok(Some((name.to_string(), sources)))
}

/// Parse `name:kind:min:max`
fn parse_data_source(line_number: usize, spec: &str) -> crate::Result<DataSource> {
    let parts: Vec<&str> = spec.split(':').collect();
    let [name, kind, min, max] = parts.as_slice() else {
        return Err(ProtocolError::invalid_line(
            line_number,
            format!("data source '{spec}' is not name:kind:min:max"),
        ));
    };

    if !is_word(name) {
        return Err(ProtocolError::invalid_line(
            line_number,
            format!("invalid data source name '{name}'"),
        ));
    }

    let kind = kind.parse::<DsKind>()?;
    let min = parse_bound(line_number, min)?;
    let max = parse_bound(line_number, max)?;

    Ok(DataSource::new(*name, kind, min, max))
}

/// `U`/`u` is unbounded (NaN)
fn parse_bound(line_number: usize, s: &str) -> crate::Result<f64> {
    if s.eq_ignore_ascii_case("u") {
        return Ok(f64::NAN);
    }
    s.parse::<f64>()
        .map_err(|_| ProtocolError::invalid_line(line_number, format!("invalid bound '{s}'")))
}

#[inline]
fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}
