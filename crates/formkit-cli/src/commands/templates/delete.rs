use serde_json::json;

use crate::app::AppContext;
use crate::cli::TemplateIdArgs;
use crate::helpers::parse_template_id;
use crate::ui::{print, print_json, receipt};

pub fn handle_delete(ctx: &AppContext, args: &TemplateIdArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let id = parse_template_id(&args.id)?;
    engine.templates().delete(&id)?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&json!({"status": "ok", "id": id}));
    }
    if !ctx.quiet() {
        print(ui, &receipt(ui, "Template deleted", &[("Id", id.to_string())]));
    }
    Ok(())
}
