//! `serve` - run the collector until interrupted

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use meterd_config::Config;
use meterd_pipeline::{Collector, CollectorConfig};
use meterd_sources::resolve_hostname;

use super::{load_config, load_types};
use crate::registry;

pub async fn run(config_path: &Path, log_level: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    crate::init_logging(&config.log, log_level)?;

    let types = Arc::new(load_types(&config)?);
    let hostname = resolve_hostname(config.general.hostname_override());

    tracing::info!(
        config = %config_path.display(),
        hostname = %hostname,
        types = types.len(),
        version = env!("CARGO_PKG_VERSION"),
        "meterd starting"
    );

    let mut collector = Collector::new(collector_config(&config), Arc::clone(&types));
    let plugins = registry::build(&config, &hostname, &types);
    for source in plugins.sources {
        collector.add_source(source);
    }
    for sink in plugins.sinks {
        collector.add_sink(sink);
    }

    collector.configure().await.context("failed to configure plugins")?;
    collector.start().await.context("failed to start collector")?;

    shutdown_signal().await;
    tracing::info!("shutdown signal received");

    collector.stop().await.context("collector did not stop cleanly")?;
    tracing::info!("meterd stopped");
    Ok(())
}

/// Collector settings with the interval floor and timeout rule applied
pub fn collector_config(config: &Config) -> CollectorConfig {
    let general = &config.general;
    CollectorConfig::default()
        .with_interval(general.effective_interval())
        .with_timeout(general.effective_timeout())
        .with_store_rates(general.store_rates)
        .with_queue_capacity(general.queue_capacity)
        .with_metadata(general.metadata.clone())
}

/// Resolve on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
