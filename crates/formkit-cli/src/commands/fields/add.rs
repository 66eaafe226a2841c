use formkit_core::{FieldType, NewFieldDefinition, ValidationRules};

use crate::app::AppContext;
use crate::cli::FieldAddArgs;
use crate::errors::CliError;
use crate::helpers::{parse_option, parse_value};
use crate::output::field_json;
use crate::ui::{print, print_json, receipt};

pub fn handle_add(ctx: &AppContext, args: &FieldAddArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let field_type: FieldType = args.field_type.parse()?;

    let rules = ValidationRules {
        required: args.required,
        min: args.min,
        max: args.max,
        pattern: args.pattern.clone(),
    };
    let label = args.label.clone().unwrap_or_else(|| args.key.clone());
    let mut new = NewFieldDefinition::new(&args.key, &args.module, label, field_type)
        .with_options(args.options.iter().map(|raw| parse_option(raw)).collect())
        .with_rules(rules);
    if let Some(raw) = args.default.as_deref() {
        new = new.with_default(parse_value(raw));
    }
    if args.system {
        new = new.system();
    }
    if args.private {
        let owner = ctx.owner()?.ok_or_else(|| {
            CliError::invalid_input("--private needs --owner or a default owner in the config")
        })?;
        new = new.owned_by(owner);
    }

    let field = engine.registry().create(new)?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&field_json(&field, 0)?);
    }
    if !ctx.quiet() {
        print(
            ui,
            &receipt(
                ui,
                "Field created",
                &[
                    ("Key", field.field_key.clone()),
                    ("Module", field.module.clone()),
                    ("Type", field.field_type.to_string()),
                    ("Id", field.id.to_string()),
                ],
            ),
        );
    }
    Ok(())
}
