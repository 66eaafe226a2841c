use serde_json::json;

use crate::app::AppContext;
use crate::cli::TemplateClearDefaultArgs;
use crate::ui::{print, print_json, receipt};

pub fn handle_clear_default(ctx: &AppContext, args: &TemplateClearDefaultArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let owner = if args.shared { None } else { ctx.owner()? };
    let cleared = engine.templates().clear_default(&args.module, owner)?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&json!({"status": "ok", "module": args.module, "cleared": cleared}));
    }
    if !ctx.quiet() {
        let title = if cleared {
            "Default template cleared"
        } else {
            "No default template was set"
        };
        print(ui, &receipt(ui, title, &[("Module", args.module.clone())]));
    }
    Ok(())
}
