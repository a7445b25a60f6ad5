//! Subcommand implementations

pub mod check_config;
pub mod serve;

use std::path::Path;

use anyhow::{Context, Result};
use meterd_config::Config;
use meterd_protocol::TypesDb;

/// Load and validate the configuration file
pub fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("failed to load config {}", path.display()))
}

/// Load the type catalog named by `[general] types_db`
pub fn load_types(config: &Config) -> Result<TypesDb> {
    let path = &config.general.types_db;
    TypesDb::from_file(path).with_context(|| format!("failed to load types database {path}"))
}
