//! StatsD Source
//!
//! Receives StatsD lines over UDP and reports the merged values once per
//! collector interval.
//!
//! ```text
//! UDP datagram -> parser -> StatsdAggregator (merge table) <- read() every interval
//! ```
//!
//! # Example
//!
//! ```ignore
//! let config = StatsdSourceConfig {
//!     port: 8125,
//!     hostname: "web-1".into(),
//!     ..Default::default()
//! };
//!
//! let mut source = StatsdSource::new(config);
//! source.configure().await?;
//! source.start().await?;
//! let samples = source.read().await;
//! ```

pub mod aggregator;
pub mod histogram;
pub mod listener;
pub mod metric;
pub mod parser;

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use meterd_protocol::{AdapterError, MetricSample, MetricSource};

use crate::common::{SourceMetrics, SourceMetricsHandle};

pub use aggregator::{DeletePolicy, StatsdAggregator, TimerOutputs};
pub use histogram::Histogram;
pub use listener::StatsdListener;
pub use metric::{Latency, StatsdMetric, StatsdType};
pub use parser::{StatsdParseError, parse, parse_line};

// =============================================================================
// Constants
// =============================================================================

/// Default StatsD port
const DEFAULT_PORT: u16 = 8125;

/// Default receive buffer (largest accepted datagram)
const DEFAULT_BUFFER_SIZE: usize = 4096;

// =============================================================================
// Configuration
// =============================================================================

/// StatsD source configuration
#[derive(Debug, Clone)]
pub struct StatsdSourceConfig {
    /// Instance name used in logs
    pub name: String,

    /// Host name stamped on every sample
    pub hostname: String,

    /// Bind address (e.g., "0.0.0.0")
    pub address: String,

    /// Listen port, 0 picks a free port
    pub port: u16,

    /// Receive buffer size
    pub buffer_size: usize,

    /// Idle-entry removal per type
    pub delete: DeletePolicy,

    /// Extra timer outputs
    pub timer: TimerOutputs,
}

impl Default for StatsdSourceConfig {
    fn default() -> Self {
        Self {
            name: "statsd".into(),
            hostname: "localhost".into(),
            address: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            delete: DeletePolicy::default(),
            timer: TimerOutputs::default(),
        }
    }
}

impl StatsdSourceConfig {
    /// Get the address to bind to
    pub fn bind_address(&self) -> String {
        if self.address.contains(':') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }

    fn resolve(&self) -> Result<SocketAddr, StatsdSourceError> {
        let address = self.bind_address();
        (self.address.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or(StatsdSourceError::InvalidAddress { address })
    }
}

// =============================================================================
// Errors
// =============================================================================

/// StatsD source errors
#[derive(Debug, thiserror::Error)]
pub enum StatsdSourceError {
    /// Address did not resolve
    #[error("invalid bind address {address}")]
    InvalidAddress { address: String },

    /// Failed to bind to address
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Percentile outside (0, 100]
    #[error("percentile {0} outside (0, 100]")]
    InvalidPercentile(f64),
}

// =============================================================================
// Source Implementation
// =============================================================================

/// Running listener task
struct ListenerTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// StatsD source adapter
pub struct StatsdSource {
    config: StatsdSourceConfig,
    aggregator: Option<Arc<StatsdAggregator>>,
    metrics: Arc<SourceMetrics>,
    listener: Option<ListenerTask>,
}

impl StatsdSource {
    pub fn new(config: StatsdSourceConfig) -> Self {
        Self {
            config,
            aggregator: None,
            metrics: Arc::new(SourceMetrics::new()),
            listener: None,
        }
    }

    pub fn config(&self) -> &StatsdSourceConfig {
        &self.config
    }

    /// Address the listener is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(|l| l.local_addr)
    }

    pub fn is_running(&self) -> bool {
        self.listener.is_some()
    }

    pub fn metrics_handle(&self) -> SourceMetricsHandle {
        SourceMetricsHandle::new(&self.config.name, Arc::clone(&self.metrics))
    }

    fn build_aggregator(&mut self) -> Result<Arc<StatsdAggregator>, StatsdSourceError> {
        if let Some(aggregator) = &self.aggregator {
            return Ok(Arc::clone(aggregator));
        }

        if let Some(&p) = self
            .config
            .timer
            .percentiles
            .iter()
            .find(|&&p| !(p > 0.0 && p <= 100.0))
        {
            return Err(StatsdSourceError::InvalidPercentile(p));
        }

        let aggregator = Arc::new(StatsdAggregator::new(
            self.config.hostname.clone(),
            self.config.delete,
            self.config.timer.clone(),
        ));
        self.aggregator = Some(Arc::clone(&aggregator));
        Ok(aggregator)
    }
}

#[async_trait]
impl MetricSource for StatsdSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn configure(&mut self) -> Result<(), AdapterError> {
        self.aggregator = None;
        self.build_aggregator()
            .map_err(|e| AdapterError::config(&self.config.name, e.to_string()))?;
        tracing::info!(source = %self.config.name, "statsd source configured");
        Ok(())
    }

    async fn start(&mut self) -> Result<(), AdapterError> {
        if self.listener.is_some() {
            return Ok(());
        }

        let name = self.config.name.clone();
        let aggregator = self
            .build_aggregator()
            .map_err(|e| AdapterError::config(&name, e.to_string()))?;
        let addr = self
            .config
            .resolve()
            .map_err(|e| AdapterError::start(&name, e.to_string()))?;

        let listener = StatsdListener::bind(
            addr,
            self.config.buffer_size,
            aggregator,
            Arc::clone(&self.metrics),
        )
        .map_err(|source| {
            let e = StatsdSourceError::Bind {
                address: addr.to_string(),
                source,
            };
            AdapterError::start(&name, e.to_string())
        })?;
        let local_addr = listener.local_addr()?;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(listener.run(cancel.clone()));

        tracing::info!(
            source = %name,
            address = %local_addr,
            buffer_size = self.config.buffer_size,
            "statsd source listening"
        );

        self.listener = Some(ListenerTask {
            cancel,
            handle,
            local_addr,
        });
        Ok(())
    }

    async fn stop(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };

        listener.cancel.cancel();
        if let Err(e) = listener.handle.await {
            tracing::warn!(source = %self.config.name, error = %e, "statsd listener task failed");
        }

        let s = self.metrics.snapshot();
        tracing::info!(
            source = %self.config.name,
            datagrams = s.datagrams_received,
            lines_parsed = s.lines_parsed,
            lines_rejected = s.lines_rejected,
            "statsd source stopped"
        );
    }

    async fn read(&mut self) -> Vec<MetricSample> {
        let Some(aggregator) = &self.aggregator else {
            return Vec::new();
        };
        let samples = aggregator.read();
        self.metrics.samples_emitted(samples.len() as u64);
        samples
    }
}
