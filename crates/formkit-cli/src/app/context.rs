//! Application context for the Formkit CLI.
//!
//! Bundles the parsed arguments with the lazily loaded config file, the
//! resolved UI context and access to the engine.

use once_cell::unsync::OnceCell;
use tracing::debug;

use formkit_core::{FormEngine, ModuleCatalog, OwnerId, SqliteStore};

use crate::cli::Cli;
use crate::config::FormkitConfig;
use crate::errors::CliError;
use crate::ui::UiContext;

use super::resolver::{load_config, missing_store_hint, missing_store_message, resolve_store_path};

/// Application context that bundles CLI args with configuration.
pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<Option<FormkitConfig>>,
    ui: OnceCell<UiContext>,
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
            ui: OnceCell::new(),
        }
    }

    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// The config file, if one exists.
    pub fn config(&self) -> anyhow::Result<Option<&FormkitConfig>> {
        Ok(self.config.get_or_try_init(load_config)?.as_ref())
    }

    /// UI context; `--format` falls back to the config file's output format.
    pub fn ui(&self) -> &UiContext {
        self.ui.get_or_init(|| {
            let configured = self
                .config()
                .ok()
                .flatten()
                .and_then(|config| config.output.format.clone());
            let format = self.cli.format.clone().or(configured);
            UiContext::from_env(self.cli.json, format.as_deref(), self.cli.no_color, self.cli.ascii)
        })
    }

    /// Owner from `--owner`, else the config default.
    pub fn owner(&self) -> anyhow::Result<Option<OwnerId>> {
        if let Some(owner) = self.cli.owner {
            return Ok(Some(owner));
        }
        Ok(self.config()?.and_then(|config| config.defaults.owner))
    }

    /// Store path from flags, config file or XDG default.
    pub fn store_path(&self) -> anyhow::Result<std::path::PathBuf> {
        resolve_store_path(self.cli, self.config()?)
    }

    /// Open the store and wrap it in an engine over the retail catalog.
    pub fn open_engine(&self) -> anyhow::Result<FormEngine<SqliteStore>> {
        let path = self.store_path()?;
        if !path.exists() {
            return Err(CliError::not_found(missing_store_message(&path), missing_store_hint()).into());
        }
        debug!(path = %path.display(), "opening store");
        let store = SqliteStore::open(&path)?;
        Ok(FormEngine::new(store, ModuleCatalog::retail()))
    }
}
