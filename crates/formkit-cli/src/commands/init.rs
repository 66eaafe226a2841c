use std::path::PathBuf;

use serde_json::json;
use tracing::info;

use formkit_core::SqliteStore;

use crate::app::{resolve_config_path, AppContext};
use crate::cli::InitArgs;
use crate::config::{write_config, FormkitConfig};
use crate::errors::CliError;
use crate::ui::{hint, print, print_json, receipt};

pub fn handle_init(ctx: &AppContext, args: &InitArgs) -> anyhow::Result<()> {
    let config_path = match args.config_path.as_deref() {
        Some(path) => PathBuf::from(path),
        None => resolve_config_path()?,
    };
    let store_path = match args.path.as_deref() {
        Some(path) => PathBuf::from(path),
        None => ctx.store_path()?,
    };

    if store_path.exists() {
        return Err(CliError::invalid_input(format!(
            "A store already exists at {}",
            store_path.display()
        ))
        .into());
    }

    SqliteStore::create(&store_path)?;
    info!(path = %store_path.display(), "initialized store");

    let config_written = if config_path.exists() {
        false
    } else {
        write_config(
            &config_path,
            &FormkitConfig::new(store_path.clone(), args.default_owner),
        )?;
        true
    };

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&json!({
            "status": "ok",
            "store": store_path.display().to_string(),
            "config": config_path.display().to_string(),
            "config_written": config_written,
        }));
    }
    if ctx.quiet() {
        return Ok(());
    }

    let mut items = vec![("Store", store_path.display().to_string())];
    if config_written {
        items.push(("Config", config_path.display().to_string()));
    }
    print(ui, &receipt(ui, "Store created", &items));
    if ui.mode.is_pretty() {
        print(ui, &hint(ui, "formkit field add <KEY> --module <MODULE> --type <TYPE>"));
    }
    Ok(())
}
