use formkit_core::FormTemplateUpdate;

use crate::app::AppContext;
use crate::cli::TemplateUpdateArgs;
use crate::errors::CliError;
use crate::helpers::{parse_detail_group, parse_template_id, read_base_fields};

pub fn handle_update(ctx: &AppContext, args: &TemplateUpdateArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let id = parse_template_id(&args.id)?;

    let list_fields = if args.clear_list_fields {
        Some(None)
    } else if !args.list_fields.is_empty() {
        Some(Some(args.list_fields.clone()))
    } else {
        None
    };
    let detail_fields = if args.clear_detail_groups {
        Some(None)
    } else if !args.detail_groups.is_empty() {
        Some(Some(
            args.detail_groups
                .iter()
                .map(|raw| parse_detail_group(raw))
                .collect::<anyhow::Result<Vec<_>>>()?,
        ))
    } else {
        None
    };

    let update = FormTemplateUpdate {
        name: args.name.clone(),
        description: args.description.clone().map(Some),
        base_fields: args.base_fields.as_deref().map(read_base_fields).transpose()?,
        custom_fields: (!args.custom_fields.is_empty()).then(|| args.custom_fields.clone()),
        list_fields,
        detail_fields,
        validation_rules: None,
    };
    if update.name.is_none()
        && update.description.is_none()
        && update.base_fields.is_none()
        && update.custom_fields.is_none()
        && update.list_fields.is_none()
        && update.detail_fields.is_none()
    {
        return Err(CliError::invalid_input("Nothing to update; pass at least one change").into());
    }

    let template = engine.templates().update(&id, update)?;
    super::report(ctx, "Template updated", &template)
}
