use serde_json::json;

use formkit_core::DeleteMode;

use crate::app::AppContext;
use crate::cli::{FieldDeleteArgs, FieldKeyArgs};
use crate::ui::{print, print_json, receipt};

pub fn handle_deactivate(ctx: &AppContext, args: &FieldKeyArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let field = engine.registry().deactivate(&args.key)?;
    report(ctx, "Field deactivated", &field.field_key, json!({"active": false}))
}

pub fn handle_activate(ctx: &AppContext, args: &FieldKeyArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let field = engine.registry().activate(&args.key)?;
    report(ctx, "Field activated", &field.field_key, json!({"active": true}))
}

pub fn handle_delete(ctx: &AppContext, args: &FieldDeleteArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let mode = if args.cascade {
        DeleteMode::Cascade
    } else {
        DeleteMode::Restrict
    };
    engine.registry().delete(&args.key, mode)?;
    report(ctx, "Field deleted", &args.key, json!({"deleted": true}))
}

fn report(
    ctx: &AppContext,
    title: &str,
    key: &str,
    mut extra: serde_json::Value,
) -> anyhow::Result<()> {
    let ui = ctx.ui();
    if ui.mode.is_json() {
        extra["status"] = json!("ok");
        extra["key"] = json!(key);
        return print_json(&extra);
    }
    if !ctx.quiet() {
        print(ui, &receipt(ui, title, &[("Key", key.to_string())]));
    }
    Ok(())
}
