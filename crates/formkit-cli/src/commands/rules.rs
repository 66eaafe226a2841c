use std::collections::HashMap;

use serde_json::{json, Value};
use uuid::Uuid;

use formkit_core::{ConditionType, DependencyAction, FormEngine, NewFieldDependency, SqliteStore};

use crate::app::AppContext;
use crate::cli::{RuleAddArgs, RuleListArgs, RuleRemoveArgs};
use crate::helpers::parse_value;
use crate::output::{rule_rows, rules_json, RULE_HEADERS};
use crate::ui::{print, print_json, receipt, table};

pub fn handle_add(ctx: &AppContext, args: &RuleAddArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let target = engine.registry().require(&args.field)?;
    let condition: ConditionType = args.condition.parse()?;
    let action: DependencyAction = args.action.parse()?;
    let value = args.value.as_deref().map(parse_value).unwrap_or(Value::Null);

    let rule = engine.rules().add(NewFieldDependency::new(
        target.id,
        &args.depends_on,
        condition,
        value,
        action,
    ))?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        let keys = HashMap::from([(target.id, target.field_key.clone())]);
        let mut items = rules_json(std::slice::from_ref(&rule), &keys)?;
        return print_json(&items[0].take());
    }
    if !ctx.quiet() {
        print(
            ui,
            &receipt(
                ui,
                "Rule added",
                &[
                    ("Id", rule.id.to_string()),
                    ("Field", target.field_key),
                    ("Depends on", rule.depends_on_field_key.clone()),
                ],
            ),
        );
    }
    Ok(())
}

pub fn handle_list(ctx: &AppContext, args: &RuleListArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let rules = match args.field.as_deref() {
        Some(key) => {
            let field = engine.registry().require(key)?;
            engine.rules().for_fields(&[field.id])?
        }
        None => engine.rules().list()?,
    };
    let keys = field_keys(&engine)?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&rules_json(&rules, &keys)?);
    }
    if rules.is_empty() {
        if !ctx.quiet() {
            print(ui, "No rules found.");
        }
        return Ok(());
    }
    print(ui, &table(ui, RULE_HEADERS, &rule_rows(&rules, &keys)));
    Ok(())
}

pub fn handle_remove(ctx: &AppContext, args: &RuleRemoveArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    engine.rules().remove(args.id)?;

    let ui = ctx.ui();
    if ui.mode.is_json() {
        return print_json(&json!({"status": "ok", "id": args.id}));
    }
    if !ctx.quiet() {
        print(ui, &receipt(ui, "Rule removed", &[("Id", args.id.to_string())]));
    }
    Ok(())
}

/// Definition id to field key, for every stored definition.
fn field_keys(engine: &FormEngine<SqliteStore>) -> anyhow::Result<HashMap<Uuid, String>> {
    Ok(engine
        .registry()
        .list_all()?
        .into_iter()
        .map(|field| (field.id, field.field_key))
        .collect())
}
