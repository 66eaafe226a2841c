pub mod clear_default;
pub mod create;
pub mod deactivate;
pub mod delete;
pub mod list;
pub mod set_default;
pub mod show;
pub mod update;

pub use clear_default::handle_clear_default;
pub use create::handle_create;
pub use deactivate::handle_deactivate;
pub use delete::handle_delete;
pub use list::handle_list;
pub use set_default::handle_set_default;
pub use show::handle_show;
pub use update::handle_update;

use formkit_core::FormTemplate;

use crate::app::AppContext;
use crate::ui::{print, print_json, receipt};

/// Shared output for commands that act on one template.
fn report(ctx: &AppContext, title: &str, template: &FormTemplate) -> anyhow::Result<()> {
    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&serde_json::to_value(template)?);
    }
    if !ctx.quiet() {
        print(
            ui,
            &receipt(
                ui,
                title,
                &[
                    ("Id", template.id.to_string()),
                    ("Name", template.name.clone()),
                    ("Module", template.module.clone()),
                ],
            ),
        );
    }
    Ok(())
}
