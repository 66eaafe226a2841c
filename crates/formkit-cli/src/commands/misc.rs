use clap::CommandFactory;
use clap_complete::generate;
use serde_json::json;

use formkit_core::ModuleCatalog;

use crate::app::AppContext;
use crate::cli::{Cli, CompletionsArgs, ModulesArgs};
use crate::errors::CliError;
use crate::output::value_display;
use crate::ui::{badge, kv, print, print_json, table, Badge};

pub fn handle_completions(args: &CompletionsArgs) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "formkit", &mut std::io::stdout());
    Ok(())
}

/// Modules of the built-in catalog; does not need a store.
pub fn handle_modules(ctx: &AppContext, args: &ModulesArgs) -> anyhow::Result<()> {
    let catalog = ModuleCatalog::retail();
    let ui = ctx.ui();

    let Some(module) = args.module.as_deref() else {
        let names: Vec<&str> = catalog.module_names().collect();
        if ui.mode.is_json() {
            return print_json(&json!(names));
        }
        let rows: Vec<Vec<String>> = names
            .iter()
            .map(|name| {
                vec![
                    name.to_string(),
                    catalog.base_fields(name).len().to_string(),
                ]
            })
            .collect();
        print(ui, &table(ui, &["MODULE", "FIELDS"], &rows));
        return Ok(());
    };

    let schema = catalog.schema(module).ok_or_else(|| {
        CliError::not_found(
            format!("Unknown module '{}'", module),
            "Run `formkit modules` to list the known modules.",
        )
    })?;
    if ui.mode.is_json() {
        return print_json(&json!({
            "module": schema.name,
            "fields": schema.fields,
            "list_fields": schema.list_fields,
            "detail_groups": schema.detail_groups,
        }));
    }
    let rows: Vec<Vec<String>> = schema
        .fields
        .iter()
        .map(|field| {
            vec![
                field.key.clone(),
                field.label.clone(),
                field.field_type.to_string(),
                field.validation_rules.required.to_string(),
                field
                    .default_value
                    .as_ref()
                    .map(value_display)
                    .unwrap_or_default(),
            ]
        })
        .collect();
    print(ui, &table(ui, &["KEY", "LABEL", "TYPE", "REQUIRED", "DEFAULT"], &rows));
    Ok(())
}

pub fn handle_check(ctx: &AppContext) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let metadata = engine.store().metadata()?;
    let ui = ctx.ui();

    if let Err(err) = engine.store().check_integrity() {
        if ui.mode.is_json() {
            print_json(&json!({"status": "failed", "error": err.to_string()}))?;
        }
        return Err(CliError::IntegrityFailed(err.to_string()).into());
    }

    if ui.mode.is_json() {
        return print_json(&json!({
            "status": "ok",
            "format_version": metadata.format_version,
            "created_at": metadata.created_at,
        }));
    }
    if !ctx.quiet() {
        print(ui, &badge(ui, Badge::Ok, "All checks passed"));
        print(ui, &kv(ui, "Format version", &metadata.format_version));
        print(
            ui,
            &kv(
                ui,
                "Created",
                &metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            ),
        );
    }
    Ok(())
}
