use serde_json::json;

use formkit_core::{FieldConfig, FieldOverride, OwnerId};

use crate::app::AppContext;
use crate::cli::{ConfigClearArgs, ConfigSetArgs, ConfigShowArgs};
use crate::errors::CliError;
use crate::output::{config_rows, CONFIG_HEADERS};
use crate::ui::{print, print_json, receipt, table};

/// Rows are written for the current owner unless `--global` is given or no
/// owner is known.
fn row_owner(ctx: &AppContext, global: bool) -> anyhow::Result<Option<OwnerId>> {
    if global {
        return Ok(None);
    }
    ctx.owner()
}

pub fn handle_set(ctx: &AppContext, args: &ConfigSetArgs) -> anyhow::Result<()> {
    let overrides = FieldOverride {
        visible: args.visible,
        editable: args.editable,
        required: args.required,
        order: args.order,
    };
    if overrides.is_empty() {
        return Err(CliError::invalid_input(
            "Nothing to set; pass --visible, --editable, --required or --order",
        )
        .into());
    }

    let engine = ctx.open_engine()?;
    let owner = row_owner(ctx, args.global)?;
    let row = engine
        .module_config()
        .upsert(&args.module, &args.field, owner, overrides)?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&serde_json::to_value(&row)?);
    }
    if !ctx.quiet() {
        print(
            ui,
            &receipt(
                ui,
                "Field configuration saved",
                &[
                    ("Module", row.module.clone()),
                    ("Field", row.field_key.clone()),
                    (
                        "Owner",
                        row.owner
                            .map(|owner| owner.to_string())
                            .unwrap_or_else(|| "all".to_string()),
                    ),
                ],
            ),
        );
    }
    Ok(())
}

pub fn handle_show(ctx: &AppContext, args: &ConfigShowArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let owner = ctx.owner()?;
    let base_fields = engine.catalog().base_fields(&args.module);
    if base_fields.is_empty() {
        return Err(CliError::not_found(
            format!("Module '{}' has no built-in fields", args.module),
            "Run `formkit modules` to list the known modules.",
        )
        .into());
    }

    let effective = engine
        .module_config()
        .effective(&args.module, owner, base_fields)?;
    let mut ordered: Vec<(String, FieldConfig)> = base_fields
        .iter()
        .filter_map(|field| effective.get(&field.key).map(|c| (field.key.clone(), *c)))
        .collect();
    ordered.sort_by_key(|(_, config)| config.order);

    let ui = ctx.ui();
    if ui.mode.is_json() {
        let rows = engine.module_config().rows(&args.module)?;
        return print_json(&json!({
            "module": args.module,
            "owner": owner,
            "effective": ordered
                .iter()
                .map(|(key, config)| json!({"field": key, "config": config}))
                .collect::<Vec<_>>(),
            "rows": rows,
        }));
    }
    print(ui, &table(ui, CONFIG_HEADERS, &config_rows(&ordered)));
    Ok(())
}

pub fn handle_clear(ctx: &AppContext, args: &ConfigClearArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let owner = row_owner(ctx, args.global)?;
    let removed = engine
        .module_config()
        .clear(&args.module, &args.field, owner)?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&json!({
            "status": "ok",
            "module": args.module,
            "field": args.field,
            "removed": removed,
        }));
    }
    if !ctx.quiet() {
        let title = if removed {
            "Field configuration cleared"
        } else {
            "No configuration row to clear"
        };
        print(
            ui,
            &receipt(
                ui,
                title,
                &[("Module", args.module.clone()), ("Field", args.field.clone())],
            ),
        );
    }
    Ok(())
}
