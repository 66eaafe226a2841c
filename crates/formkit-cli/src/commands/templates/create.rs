use std::collections::BTreeMap;

use formkit_core::{NewFormTemplate, ValidationRules};

use crate::app::AppContext;
use crate::cli::TemplateCreateArgs;
use crate::helpers::{parse_detail_group, read_base_fields};

pub fn handle_create(ctx: &AppContext, args: &TemplateCreateArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;

    let owner = if args.shared { None } else { ctx.owner()? };
    let base_fields = match args.base_fields.as_deref() {
        Some(path) => read_base_fields(path)?,
        None => Vec::new(),
    };
    let detail_fields = if args.detail_groups.is_empty() {
        None
    } else {
        Some(
            args.detail_groups
                .iter()
                .map(|raw| parse_detail_group(raw))
                .collect::<anyhow::Result<Vec<_>>>()?,
        )
    };
    let validation_rules: BTreeMap<String, ValidationRules> = args
        .require
        .iter()
        .map(|key| (key.clone(), ValidationRules::required()))
        .collect();

    let new = NewFormTemplate {
        owner,
        description: args.description.clone(),
        base_fields,
        custom_fields: args.custom_fields.clone(),
        list_fields: (!args.list_fields.is_empty()).then(|| args.list_fields.clone()),
        detail_fields,
        validation_rules,
        is_default: args.default,
        ..NewFormTemplate::new(&args.name, &args.module)
    };

    let template = engine.templates().create(new)?;
    super::report(ctx, "Template created", &template)
}
