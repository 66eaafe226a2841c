use std::collections::HashMap;

use crate::app::AppContext;
use crate::cli::FieldKeyArgs;
use crate::output::{field_json, rule_rows, value_display, RULE_HEADERS};
use crate::ui::{kv, print, print_json, table};

pub fn handle_show(ctx: &AppContext, args: &FieldKeyArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let field = engine.registry().require(&args.key)?;
    let references = engine.values().count_for_field(&field.id)?;
    let rules = engine.rules().for_fields(&[field.id])?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        let mut value = field_json(&field, references)?;
        value["rules"] = serde_json::to_value(&rules)?;
        return print_json(&value);
    }

    let rules_text = &field.validation_rules;
    let mut lines = vec![
        kv(ui, "Key", &field.field_key),
        kv(ui, "Id", &field.id.to_string()),
        kv(ui, "Module", &field.module),
        kv(ui, "Label", &field.label),
        kv(ui, "Type", &field.field_type.to_string()),
        kv(ui, "Required", &rules_text.required.to_string()),
        kv(ui, "Active", &field.is_active.to_string()),
        kv(ui, "System", &field.is_system_field.to_string()),
        kv(
            ui,
            "Owner",
            &field
                .owner_scope
                .map(|owner| owner.to_string())
                .unwrap_or_else(|| "shared".to_string()),
        ),
        kv(ui, "Stored values", &references.to_string()),
        kv(ui, "Created", &field.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    ];
    if let Some(min) = rules_text.min {
        lines.push(kv(ui, "Min", &min.to_string()));
    }
    if let Some(max) = rules_text.max {
        lines.push(kv(ui, "Max", &max.to_string()));
    }
    if let Some(pattern) = rules_text.pattern.as_deref() {
        lines.push(kv(ui, "Pattern", pattern));
    }
    if let Some(default) = field.default_value.as_ref() {
        lines.push(kv(ui, "Default", &value_display(default)));
    }
    for option in &field.options {
        lines.push(kv(ui, "Option", &format!("{} = {}", option.label, option.value)));
    }
    print(ui, &lines.join("\n"));

    if !rules.is_empty() {
        let keys = HashMap::from([(field.id, field.field_key.clone())]);
        print(ui, "");
        print(ui, &table(ui, RULE_HEADERS, &rule_rows(&rules, &keys)));
    }
    Ok(())
}
