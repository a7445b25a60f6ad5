//! meterd - Host metrics collector
//!
//! # Usage
//!
//! ```bash
//! # Run the collector (default)
//! meterd
//! meterd --config configs/config.toml --log-level debug
//!
//! # Validate configuration and type catalog, then exit
//! meterd check-config
//! ```

mod cmd;
mod registry;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use meterd_config::{LogConfig, LogFormat, LogOutput};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// meterd - Host metrics collector
#[derive(Parser, Debug)]
#[command(name = "meterd")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file
    #[arg(short, long, default_value = "configs/config.toml", global = true)]
    config: PathBuf,

    /// Log level or filter directive, overrides `[log] level`
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the collector
    Serve,

    /// Validate configuration and type catalog, print a summary
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::CheckConfig) => cmd::check_config::run(&cli.config),
        // No subcommand = run collector
        Some(Command::Serve) | None => cmd::serve::run(&cli.config, cli.log_level.as_deref()).await,
    }
}

/// Initialize the tracing subscriber for logging
///
/// Level resolution: command line, then `[log] level`, then `info`.
pub(crate) fn init_logging(log: &LogConfig, cli_level: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_new(log.filter_directive(cli_level))
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let (writer, ansi) = match &log.output {
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), true),
        LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
        LogOutput::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {path}"))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
    };

    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_ansi(ansi)
        .with_writer(writer);
    let layer = match log.format {
        LogFormat::Console => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))?;

    Ok(())
}
