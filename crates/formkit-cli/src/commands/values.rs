use serde_json::json;

use crate::app::AppContext;
use crate::cli::{EntityArgs, ValuesSetArgs};
use crate::helpers::parse_assignments;
use crate::output::value_display;
use crate::ui::{print, print_json, receipt, table};

pub fn handle_get(ctx: &AppContext, args: &EntityArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let values = engine.values().get_values(&args.module, &args.entity_id)?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&serde_json::to_value(&values)?);
    }
    if values.is_empty() {
        if !ctx.quiet() {
            print(ui, "No custom values stored.");
        }
        return Ok(());
    }
    let rows: Vec<Vec<String>> = values
        .iter()
        .map(|(key, value)| vec![key.clone(), value_display(value)])
        .collect();
    print(ui, &table(ui, &["FIELD", "VALUE"], &rows));
    Ok(())
}

pub fn handle_set(ctx: &AppContext, args: &ValuesSetArgs) -> anyhow::Result<()> {
    let values = parse_assignments(&args.values)?;
    let engine = ctx.open_engine()?;
    let entity = &args.entity;
    let changes = engine
        .values()
        .set_values(&entity.module, &entity.entity_id, &values)?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&json!({
            "status": "ok",
            "upserted": changes.upserted,
            "deleted": changes.deleted,
        }));
    }
    if !ctx.quiet() {
        print(
            ui,
            &receipt(
                ui,
                "Values stored",
                &[
                    ("Entity", format!("{}/{}", entity.module, entity.entity_id)),
                    ("Upserted", changes.upserted.to_string()),
                    ("Deleted", changes.deleted.to_string()),
                ],
            ),
        );
    }
    Ok(())
}

pub fn handle_clear(ctx: &AppContext, args: &EntityArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let removed = engine.delete_entity(&args.module, &args.entity_id)?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&json!({"status": "ok", "removed": removed}));
    }
    if !ctx.quiet() {
        print(
            ui,
            &receipt(
                ui,
                "Values cleared",
                &[
                    ("Entity", format!("{}/{}", args.module, args.entity_id)),
                    ("Removed", removed.to_string()),
                ],
            ),
        );
    }
    Ok(())
}
