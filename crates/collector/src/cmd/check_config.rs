//! `check-config` - validate configuration and type catalog

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use meterd_config::{Config, PluginRole};
use meterd_protocol::TypesDb;
use meterd_sources::resolve_hostname;

use super::{load_config, load_types};

pub fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let types = load_types(&config)?;
    print!("{}", summary(config_path, &config, &types));
    Ok(())
}

/// Human-readable overview of what `serve` would run
pub fn summary(config_path: &Path, config: &Config, types: &TypesDb) -> String {
    let general = &config.general;
    let hostname = resolve_hostname(general.hostname_override());

    let mut out = String::new();
    let _ = writeln!(out, "config:      {} (ok)", config_path.display());
    let _ = writeln!(out, "types db:    {} ({} types)", general.types_db, types.len());
    let _ = writeln!(out, "hostname:    {hostname}");
    let _ = writeln!(
        out,
        "interval:    {:?} (timeout {:?}, store_rates {})",
        general.effective_interval(),
        general.effective_timeout(),
        general.store_rates
    );
    let _ = writeln!(out, "queue:       {} samples", general.queue_capacity);

    for (label, role) in [("sources:", PluginRole::Source), ("sinks:", PluginRole::Sink)] {
        let plugins: Vec<String> = config
            .plugins
            .enabled(role)
            .map(|(name, plugin)| format!("{name} ({})", plugin.type_name()))
            .collect();
        let _ = writeln!(out, "{label:<12} {}", plugins.join(", "));
    }

    let disabled: Vec<&str> = config
        .plugins
        .iter()
        .filter(|(_, plugin)| !plugin.is_enabled())
        .map(|(name, _)| name.as_str())
        .collect();
    if !disabled.is_empty() {
        let _ = writeln!(out, "disabled:    {}", disabled.join(", "));
    }
    out
}
