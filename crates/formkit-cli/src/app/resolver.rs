//! Path resolution for config and store files.

use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::config::{default_config_path, default_store_path, read_config, FormkitConfig};
use crate::constants::CONFIG_ENV;

/// Resolve the config file path, checking FORMKIT_CONFIG first.
pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var(CONFIG_ENV) {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    default_config_path()
}

/// Load the config file if one exists.
pub fn load_config() -> anyhow::Result<Option<FormkitConfig>> {
    let path = resolve_config_path()?;
    if !path.exists() {
        return Ok(None);
    }
    read_config(&path).map(Some)
}

/// Resolve the store path: `--store`/FORMKIT_STORE, then the config file,
/// then the XDG data default.
pub fn resolve_store_path(cli: &Cli, config: Option<&FormkitConfig>) -> anyhow::Result<PathBuf> {
    if let Some(path) = cli.store.as_deref() {
        return Ok(PathBuf::from(path));
    }
    if let Some(config) = config {
        return Ok(PathBuf::from(&config.store.path));
    }
    default_store_path()
}

/// Error message when the store file is missing.
pub fn missing_store_message(path: &Path) -> String {
    format!("No store found at {}", path.display())
}

/// Hint shown alongside [`missing_store_message`].
pub fn missing_store_hint() -> &'static str {
    "Run `formkit init`, or point FORMKIT_STORE at an existing store."
}
