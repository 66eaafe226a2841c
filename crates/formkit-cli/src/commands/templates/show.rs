use crate::app::AppContext;
use crate::cli::TemplateIdArgs;
use crate::helpers::parse_template_id;
use crate::ui::{kv, print, print_json};

pub fn handle_show(ctx: &AppContext, args: &TemplateIdArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let template = engine.templates().require(&parse_template_id(&args.id)?)?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&serde_json::to_value(&template)?);
    }

    let mut lines = vec![
        kv(ui, "Id", &template.id.to_string()),
        kv(ui, "Name", &template.name),
        kv(ui, "Module", &template.module),
        kv(
            ui,
            "Owner",
            &template
                .owner
                .map(|owner| owner.to_string())
                .unwrap_or_else(|| "shared".to_string()),
        ),
        kv(ui, "Default", &template.is_default.to_string()),
        kv(ui, "Active", &template.is_active.to_string()),
    ];
    if let Some(description) = template.description.as_deref() {
        lines.push(kv(ui, "Description", description));
    }
    if !template.base_fields.is_empty() {
        let keys: Vec<&str> = template.base_fields.iter().map(|f| f.key.as_str()).collect();
        lines.push(kv(ui, "Base fields", &keys.join(",")));
    }
    lines.push(kv(ui, "Custom fields", &template.custom_fields.join(",")));
    if let Some(list_fields) = template.list_fields.as_ref() {
        lines.push(kv(ui, "List fields", &list_fields.join(",")));
    }
    for group in template.detail_fields.iter().flatten() {
        lines.push(kv(
            ui,
            "Detail group",
            &format!("{} = {}", group.title, group.fields.join(",")),
        ));
    }
    for (key, rules) in &template.validation_rules {
        lines.push(kv(ui, "Rule", &format!("{} {}", key, serde_json::to_string(rules)?)));
    }
    print(ui, &lines.join("\n"));
    Ok(())
}
