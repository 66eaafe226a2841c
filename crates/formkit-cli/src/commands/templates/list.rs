use crate::app::AppContext;
use crate::cli::TemplateListArgs;
use crate::output::{template_rows, TEMPLATE_HEADERS};
use crate::ui::{print, print_json, table};

pub fn handle_list(ctx: &AppContext, args: &TemplateListArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let owner = ctx.owner()?;
    let library = engine.templates();
    let templates = if args.all {
        library.list(&args.module, owner)?
    } else {
        library.selectable(&args.module, owner)?
    };

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&serde_json::to_value(&templates)?);
    }
    if templates.is_empty() {
        if !ctx.quiet() {
            print(ui, "No templates found.");
        }
        return Ok(());
    }
    print(ui, &table(ui, TEMPLATE_HEADERS, &template_rows(&templates)));
    Ok(())
}
