use formkit_core::GLOBAL_MODULE;

use crate::app::AppContext;
use crate::cli::FieldListArgs;
use crate::output::{field_rows, FIELD_HEADERS};
use crate::ui::{print, print_json, table};

pub fn handle_list(ctx: &AppContext, args: &FieldListArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let registry = engine.registry();

    let fields = match (args.module.as_deref(), args.all) {
        (Some(module), false) => registry.list(module, ctx.owner()?)?,
        (Some(module), true) => registry
            .list_all()?
            .into_iter()
            .filter(|field| field.module == module || field.module == GLOBAL_MODULE)
            .collect(),
        (None, all) => registry
            .list_all()?
            .into_iter()
            .filter(|field| all || field.is_active)
            .collect(),
    };

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&serde_json::to_value(&fields)?);
    }
    if fields.is_empty() {
        if !ctx.quiet() {
            print(ui, "No fields found.");
        }
        return Ok(());
    }
    print(ui, &table(ui, FIELD_HEADERS, &field_rows(&fields)));
    Ok(())
}
