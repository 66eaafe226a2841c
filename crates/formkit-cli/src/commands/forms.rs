use serde_json::json;
use tracing::warn;

use formkit_core::{evaluate, FormEngine, NoBaseValidator, SqliteStore, Submission, ValidationErrors, ViewKind};

use crate::app::AppContext;
use crate::cli::{FormValuesArgs, ResolveArgs, SubmitArgs};
use crate::errors::CliError;
use crate::helpers::{parse_selection, read_form_values};
use crate::output::{resolved_rows, state_rows, validation_json, RESOLVED_HEADERS, STATE_HEADERS};
use crate::ui::{badge, header, print, print_json, receipt, table, Badge};

fn warn_unknown_module(engine: &FormEngine<SqliteStore>, module: &str) {
    if engine.catalog().schema(module).is_none() {
        warn!(module, "module has no built-in fields; only custom fields will resolve");
    }
}

pub fn handle_resolve(ctx: &AppContext, args: &ResolveArgs) -> anyhow::Result<()> {
    let view: ViewKind = args.view.parse()?;
    let selection = parse_selection(&args.selection)?;
    let engine = ctx.open_engine()?;
    warn_unknown_module(&engine, &args.module);

    let resolved = engine
        .composer()
        .resolve_view(&args.module, selection, ctx.owner()?, view)?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&serde_json::to_value(&resolved)?);
    }

    if ui.mode.is_pretty() {
        let context = match resolved.template_id {
            Some(id) => format!("{} {}, template {}", args.module, view, id),
            None => format!("{} {}, default", args.module, view),
        };
        print(ui, &header(ui, "resolve", Some(&context)));
    }
    for group in &resolved.groups {
        if let Some(title) = group.title.as_deref() {
            print(ui, "");
            print(ui, title);
        }
        print(ui, &table(ui, RESOLVED_HEADERS, &resolved_rows(&group.fields)));
    }
    Ok(())
}

pub fn handle_evaluate(ctx: &AppContext, args: &FormValuesArgs) -> anyhow::Result<()> {
    let selection = parse_selection(&args.selection)?;
    let values = read_form_values(args)?;
    let engine = ctx.open_engine()?;
    warn_unknown_module(&engine, &args.module);

    let (fields, dependencies) = engine.form(&args.module, selection, ctx.owner()?)?;
    let states = evaluate(&fields, &dependencies, &values);

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&serde_json::to_value(&states)?);
    }
    let order: Vec<String> = fields.iter().map(|field| field.key.clone()).collect();
    print(ui, &table(ui, STATE_HEADERS, &state_rows(&states, &order)));
    Ok(())
}

pub fn handle_validate(ctx: &AppContext, args: &FormValuesArgs) -> anyhow::Result<()> {
    let selection = parse_selection(&args.selection)?;
    let values = read_form_values(args)?;
    let engine = ctx.open_engine()?;
    warn_unknown_module(&engine, &args.module);

    let validator = engine.validator(&args.module, selection, ctx.owner()?, NoBaseValidator)?;
    let errors = validator.validate(&values);
    print_validation(ctx, &errors)?;
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CliError::ValidationFailed {
            count: errors.len(),
        }
        .into())
    }
}

pub fn handle_submit(ctx: &AppContext, args: &SubmitArgs) -> anyhow::Result<()> {
    let form = &args.form;
    let selection = parse_selection(&form.selection)?;
    let values = read_form_values(form)?;
    let engine = ctx.open_engine()?;
    warn_unknown_module(&engine, &form.module);

    let outcome = engine.submit(
        &form.module,
        &args.entity_id,
        selection,
        ctx.owner()?,
        &NoBaseValidator,
        &values,
    )?;

    match outcome {
        Submission::Saved(changes) => {
            let ui = ctx.ui();
            if ui.mode.is_json() {
                return print_json(&json!({
                    "status": "ok",
                    "entity_id": args.entity_id,
                    "upserted": changes.upserted,
                    "deleted": changes.deleted,
                }));
            }
            if !ctx.quiet() {
                print(
                    ui,
                    &receipt(
                        ui,
                        "Submission saved",
                        &[
                            ("Entity", format!("{}/{}", form.module, args.entity_id)),
                            ("Upserted", changes.upserted.to_string()),
                            ("Deleted", changes.deleted.to_string()),
                        ],
                    ),
                );
            }
            Ok(())
        }
        Submission::Rejected(errors) => {
            print_validation(ctx, &errors)?;
            Err(CliError::ValidationFailed {
                count: errors.len(),
            }
            .into())
        }
    }
}

fn print_validation(ctx: &AppContext, errors: &ValidationErrors) -> anyhow::Result<()> {
    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&validation_json(errors)?);
    }
    if errors.is_empty() {
        if !ctx.quiet() {
            print(ui, &badge(ui, Badge::Ok, "Values are valid"));
        }
        return Ok(());
    }

    let rows: Vec<Vec<String>> = errors
        .iter()
        .map(|(key, message)| vec![key.clone(), message.clone()])
        .collect();
    print(ui, &badge(ui, Badge::Err, "Values are invalid"));
    print(ui, &table(ui, &["FIELD", "MESSAGE"], &rows));
    Ok(())
}
