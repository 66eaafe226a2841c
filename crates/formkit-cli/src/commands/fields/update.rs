use formkit_core::{FieldDefinitionUpdate, FieldType};

use crate::app::AppContext;
use crate::cli::FieldUpdateArgs;
use crate::errors::CliError;
use crate::helpers::{parse_option, parse_value};
use crate::output::field_json;
use crate::ui::{print, print_json, receipt};

pub fn handle_update(ctx: &AppContext, args: &FieldUpdateArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let registry = engine.registry();
    let current = registry.require(&args.key)?;

    let touches_rules = args.required
        || args.optional
        || args.clear_constraints
        || args.min.is_some()
        || args.max.is_some()
        || args.pattern.is_some();
    let validation_rules = touches_rules.then(|| {
        let mut rules = current.validation_rules.clone();
        if args.clear_constraints {
            rules.min = None;
            rules.max = None;
            rules.pattern = None;
        }
        if args.required {
            rules.required = true;
        }
        if args.optional {
            rules.required = false;
        }
        rules.min = args.min.or(rules.min);
        rules.max = args.max.or(rules.max);
        if let Some(pattern) = args.pattern.as_ref() {
            rules.pattern = Some(pattern.clone());
        }
        rules
    });

    let default_value = if args.clear_default {
        Some(None)
    } else {
        args.default.as_deref().map(|raw| Some(parse_value(raw)))
    };

    let update = FieldDefinitionUpdate {
        field_key: args.rename.clone(),
        label: args.label.clone(),
        field_type: args
            .field_type
            .as_deref()
            .map(str::parse::<FieldType>)
            .transpose()?,
        options: (!args.options.is_empty())
            .then(|| args.options.iter().map(|raw| parse_option(raw)).collect()),
        validation_rules,
        default_value,
    };

    if update.field_key.is_none()
        && update.label.is_none()
        && update.field_type.is_none()
        && update.options.is_none()
        && update.validation_rules.is_none()
        && update.default_value.is_none()
    {
        return Err(CliError::invalid_input("Nothing to update; pass at least one change").into());
    }

    let field = registry.update(&args.key, update)?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        let references = engine.values().count_for_field(&field.id)?;
        return print_json(&field_json(&field, references)?);
    }
    if !ctx.quiet() {
        print(
            ui,
            &receipt(
                ui,
                "Field updated",
                &[
                    ("Key", field.field_key.clone()),
                    ("Type", field.field_type.to_string()),
                ],
            ),
        );
    }
    Ok(())
}
