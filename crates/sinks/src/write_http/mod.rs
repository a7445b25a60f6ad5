//! HTTP Sink - JSON batches over HTTP POST
//!
//! Each configured node keeps its own batch. A sample is rendered to JSON
//! as it arrives; once the batch holds `batch_size` samples it is posted
//! as one JSON array:
//!
//! ```text
//! POST <url>
//! Content-Type: application/json
//! User-Agent: meterd/<version>
//!
//! [{"host":"web-1","plugin":"cpu",...},{"host":"web-1","plugin":"memory",...}]
//! ```
//!
//! Delivery is best effort. A failed post (transport error or non-2xx
//! status) is logged through a rate-limited logger and the batch is
//! dropped.
//!
//! # Example
//!
//! ```ignore
//! let node = HttpNodeSettings::new("primary", "http://metrics.local/collectd")
//!     .with_batch_size(50)
//!     .with_basic_auth("meterd", Some("secret".into()));
//!
//! let mut sink = WriteHttpSink::new(WriteHttpSinkConfig::new(vec![node]), types);
//! sink.configure().await?;
//! sink.write(&sample).await;
//! ```

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::{NoExpand, Regex};
use reqwest::header::CONTENT_TYPE;

use meterd_protocol::{AdapterError, MetricSample, MetricSink, TypesDb};

use crate::common::{SinkError, SinkMetrics, SinkMetricsHandle};
use crate::util::{DEFAULT_LOG_INTERVAL, RateLimitedLogger};

/// Samples per request unless configured
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Request timeout unless configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("meterd/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Configuration
// =============================================================================

/// How a node reaches its endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProxyMode {
    /// Connect directly, ignoring proxy environment variables
    #[default]
    Direct,

    /// Use the proxy from `HTTP_PROXY` / `HTTPS_PROXY`
    Environment,

    /// Use this proxy for every request
    Url(String),
}

impl ProxyMode {
    /// Map the `enabled` / `url` pair from configuration
    pub fn from_settings(enabled: bool, url: &str) -> Self {
        match (enabled, url.trim()) {
            (false, _) => Self::Direct,
            (true, "") => Self::Environment,
            (true, url) => Self::Url(url.to_string()),
        }
    }
}

/// One HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpNodeSettings {
    /// Node name used in logs
    pub name: String,

    pub url: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Samples per request
    pub batch_size: usize,

    /// Idle pooled connections are closed after this long; zero keeps the
    /// client default
    pub max_idle_time: Duration,

    pub user_name: Option<String>,
    pub password: Option<String>,

    /// Pattern of characters to replace in `plugin_instance`
    pub unsafe_chars: Option<String>,

    /// Replacement text, inserted literally
    pub replace_with: String,

    pub proxy: ProxyMode,
}

impl HttpNodeSettings {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            max_idle_time: Duration::ZERO,
            user_name: None,
            password: None,
            unsafe_chars: None,
            replace_with: String::new(),
            proxy: ProxyMode::Direct,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_max_idle_time(mut self, max_idle_time: Duration) -> Self {
        self.max_idle_time = max_idle_time;
        self
    }

    #[must_use]
    pub fn with_basic_auth(mut self, user_name: impl Into<String>, password: Option<String>) -> Self {
        self.user_name = Some(user_name.into());
        self.password = password;
        self
    }

    /// Replace every match of `pattern` in `plugin_instance`
    #[must_use]
    pub fn with_sanitizer(mut self, pattern: impl Into<String>, replace_with: impl Into<String>) -> Self {
        self.unsafe_chars = Some(pattern.into());
        self.replace_with = replace_with.into();
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, proxy: ProxyMode) -> Self {
        self.proxy = proxy;
        self
    }
}

/// HTTP sink configuration
#[derive(Debug, Clone)]
pub struct WriteHttpSinkConfig {
    /// Instance name used in logs
    pub name: String,

    pub nodes: Vec<HttpNodeSettings>,

    /// Minimum spacing of delivery error lines
    pub error_log_interval: Duration,
}

impl WriteHttpSinkConfig {
    pub fn new(nodes: Vec<HttpNodeSettings>) -> Self {
        Self {
            name: "write_http".into(),
            nodes,
            error_log_interval: DEFAULT_LOG_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_error_log_interval(mut self, interval: Duration) -> Self {
        self.error_log_interval = interval;
        self
    }
}

// =============================================================================
// Node
// =============================================================================

/// Proxy URLs must be http or https; a bare `host:port` means http
fn check_proxy_url(url: &str) -> Result<(), String> {
    if !url.contains("://") {
        return Ok(());
    }
    let parsed = reqwest::Url::parse(url).map_err(|e| e.to_string())?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme {other}")),
    }
}

/// Configured endpoint with its client and pending batch
struct HttpNode {
    settings: HttpNodeSettings,
    client: reqwest::Client,
    sanitizer: Option<Regex>,
    batch: Vec<String>,
}

impl HttpNode {
    fn build(settings: HttpNodeSettings) -> Result<Self, SinkError> {
        if settings.url.trim().is_empty() {
            return Err(SinkError::config(format!("node {} has no url", settings.name)));
        }

        let sanitizer = settings
            .unsafe_chars
            .as_deref()
            .filter(|pattern| !pattern.is_empty())
            .map(Regex::new)
            .transpose()
            .map_err(|e| SinkError::config(format!("node {}: {e}", settings.name)))?;

        let mut builder = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT);
        if !settings.max_idle_time.is_zero() {
            builder = builder.pool_idle_timeout(settings.max_idle_time);
        }
        builder = match &settings.proxy {
            ProxyMode::Direct => builder.no_proxy(),
            ProxyMode::Environment => builder,
            ProxyMode::Url(url) => {
                check_proxy_url(url)
                    .map_err(|e| SinkError::config(format!("node {}: proxy {url}: {e}", settings.name)))?;
                let proxy = reqwest::Proxy::all(url.as_str())
                    .map_err(|e| SinkError::config(format!("node {}: proxy {url}: {e}", settings.name)))?;
                builder.proxy(proxy)
            }
        };
        let client = builder
            .build()
            .map_err(|e| SinkError::config(format!("node {}: {e}", settings.name)))?;

        let capacity = settings.batch_size.max(1);
        Ok(Self {
            settings,
            client,
            sanitizer,
            batch: Vec::with_capacity(capacity),
        })
    }

    fn is_full(&self) -> bool {
        self.batch.len() >= self.settings.batch_size.max(1)
    }

    /// Render a sample, applying the `plugin_instance` substitution
    fn encode(&self, sample: &MetricSample, types: &TypesDb) -> Result<String, SinkError> {
        let Some(sanitizer) = &self.sanitizer else {
            return Ok(sample.to_json(types)?);
        };

        match sanitizer.replace_all(&sample.plugin_instance, NoExpand(&self.settings.replace_with)) {
            Cow::Borrowed(_) => Ok(sample.to_json(types)?),
            Cow::Owned(plugin_instance) => {
                let mut sample = sample.clone();
                sample.plugin_instance = plugin_instance;
                Ok(sample.to_json(types)?)
            }
        }
    }

    /// Post the pending batch; the batch is cleared whatever the outcome
    ///
    /// Returns (samples, body bytes) on success.
    async fn post(&mut self) -> Result<(usize, usize), SinkError> {
        let count = self.batch.len();
        let body = format!("[{}]", self.batch.join(","));
        self.batch.clear();
        let bytes = body.len();

        let mut request = self
            .client
            .post(self.settings.url.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(user_name) = &self.settings.user_name {
            request = request.basic_auth(user_name, self.settings.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok((count, bytes))
    }
}

// =============================================================================
// Sink Implementation
// =============================================================================

/// HTTP sink posting JSON batches to one or more nodes
pub struct WriteHttpSink {
    config: WriteHttpSinkConfig,
    types: Arc<TypesDb>,
    nodes: Vec<HttpNode>,
    metrics: Arc<SinkMetrics>,
    errors: RateLimitedLogger,
}

impl WriteHttpSink {
    pub fn new(config: WriteHttpSinkConfig, types: Arc<TypesDb>) -> Self {
        let errors = RateLimitedLogger::new(config.name.clone(), config.error_log_interval);
        Self {
            config,
            types,
            nodes: Vec::new(),
            metrics: Arc::new(SinkMetrics::new()),
            errors,
        }
    }

    pub fn metrics_handle(&self) -> SinkMetricsHandle {
        SinkMetricsHandle::new(&self.config.name, Arc::clone(&self.metrics))
    }

    /// Samples waiting in every node's batch
    pub fn pending(&self) -> usize {
        self.nodes.iter().map(|node| node.batch.len()).sum()
    }

    fn build_nodes(&mut self) -> Result<(), SinkError> {
        if self.config.nodes.is_empty() {
            return Err(SinkError::config("no nodes configured"));
        }
        self.nodes = self
            .config
            .nodes
            .iter()
            .cloned()
            .map(HttpNode::build)
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    async fn send(&mut self, index: usize) {
        let Some(node) = self.nodes.get_mut(index) else {
            return;
        };
        if node.batch.is_empty() {
            return;
        }

        match node.post().await {
            Ok((count, bytes)) => {
                self.metrics.batch_sent(count as u64, bytes as u64);
                tracing::debug!(
                    sink = %self.config.name,
                    node = %node.settings.name,
                    samples = count,
                    bytes,
                    "batch posted"
                );
            }
            Err(SinkError::Status { status, body }) => {
                self.metrics.write_error();
                let message = format!("node {} rejected batch", node.settings.name);
                self.errors
                    .error_with_data(&message, &status, body.as_bytes());
            }
            Err(e) => {
                self.metrics.write_error();
                let message = format!("post to node {} failed", node.settings.name);
                self.errors.error(&message, &e);
            }
        }
    }
}

#[async_trait]
impl MetricSink for WriteHttpSink {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn configure(&mut self) -> Result<(), AdapterError> {
        self.build_nodes()
            .map_err(|e| AdapterError::config(&self.config.name, e.to_string()))?;

        for node in &self.nodes {
            tracing::info!(
                sink = %self.config.name,
                node = %node.settings.name,
                url = %node.settings.url,
                batch_size = node.settings.batch_size,
                timeout = ?node.settings.timeout,
                proxy = ?node.settings.proxy,
                "http node configured"
            );
        }
        Ok(())
    }

    async fn start(&mut self) -> Result<(), AdapterError> {
        if self.nodes.is_empty() {
            self.build_nodes()
                .map_err(|e| AdapterError::start(&self.config.name, e.to_string()))?;
        }
        tracing::info!(
            sink = %self.config.name,
            nodes = self.nodes.len(),
            "http sink starting"
        );
        Ok(())
    }

    async fn stop(&mut self) {
        self.flush().await;

        let s = self.metrics.snapshot();
        tracing::info!(
            sink = %self.config.name,
            samples_received = s.samples_received,
            samples_sent = s.samples_sent,
            batches_sent = s.batches_sent,
            write_errors = s.write_errors,
            "http sink shutting down"
        );
    }

    async fn write(&mut self, sample: &MetricSample) {
        self.metrics.sample_received();

        for index in 0..self.nodes.len() {
            let node = &mut self.nodes[index];
            match node.encode(sample, &self.types) {
                Ok(json) => node.batch.push(json),
                Err(e) => {
                    self.metrics.write_error();
                    self.errors.error("failed to encode sample", &e);
                    continue;
                }
            }
            if node.is_full() {
                self.send(index).await;
            }
        }
    }

    async fn flush(&mut self) {
        self.metrics.flush();
        for index in 0..self.nodes.len() {
            self.send(index).await;
        }
    }
}
