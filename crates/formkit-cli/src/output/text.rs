//! Table rows for text output.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use uuid::Uuid;

use formkit_core::{
    FieldConfig, FieldDefinition, FieldDependency, FieldRuntimeState, FormTemplate, ResolvedField,
};

pub const FIELD_HEADERS: &[&str] = &["KEY", "MODULE", "TYPE", "LABEL", "REQUIRED", "ACTIVE", "SCOPE"];
pub const RULE_HEADERS: &[&str] = &["ID", "FIELD", "DEPENDS ON", "CONDITION", "VALUE", "ACTION"];
pub const TEMPLATE_HEADERS: &[&str] = &["ID", "NAME", "SCOPE", "FIELDS", "DEFAULT", "ACTIVE"];
pub const RESOLVED_HEADERS: &[&str] = &["KEY", "LABEL", "TYPE", "SOURCE", "VISIBLE", "EDITABLE", "REQUIRED", "ORDER"];
pub const STATE_HEADERS: &[&str] = &["KEY", "VISIBLE", "ENABLED", "REQUIRED"];
pub const CONFIG_HEADERS: &[&str] = &["FIELD", "VISIBLE", "EDITABLE", "REQUIRED", "ORDER"];

/// Render a JSON value for a table cell; strings lose their quotes.
pub fn value_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "no" }.to_string()
}

fn scope(owner: Option<i64>) -> String {
    match owner {
        Some(owner) => format!("owner {}", owner),
        None => "shared".to_string(),
    }
}

pub fn field_rows(fields: &[FieldDefinition]) -> Vec<Vec<String>> {
    fields
        .iter()
        .map(|field| {
            vec![
                field.field_key.clone(),
                field.module.clone(),
                field.field_type.to_string(),
                field.label.clone(),
                yes_no(field.validation_rules.required),
                yes_no(field.is_active),
                scope(field.owner_scope),
            ]
        })
        .collect()
}

/// Rule rows; `keys` maps definition ids to field keys.
pub fn rule_rows(rules: &[FieldDependency], keys: &HashMap<Uuid, String>) -> Vec<Vec<String>> {
    rules
        .iter()
        .map(|rule| {
            let target = keys
                .get(&rule.field_definition_id)
                .cloned()
                .unwrap_or_else(|| rule.field_definition_id.to_string());
            vec![
                rule.id.to_string(),
                target,
                rule.depends_on_field_key.clone(),
                condition_name(rule),
                value_display(&rule.condition_value),
                action_name(rule),
            ]
        })
        .collect()
}

fn condition_name(rule: &FieldDependency) -> String {
    serde_json::to_value(rule.condition_type)
        .map(|v| value_display(&v))
        .unwrap_or_default()
}

fn action_name(rule: &FieldDependency) -> String {
    serde_json::to_value(rule.action)
        .map(|v| value_display(&v))
        .unwrap_or_default()
}

pub fn template_rows(templates: &[FormTemplate]) -> Vec<Vec<String>> {
    templates
        .iter()
        .map(|template| {
            vec![
                template.id.to_string(),
                template.name.clone(),
                scope(template.owner),
                template.custom_fields.join(","),
                yes_no(template.is_default),
                yes_no(template.is_active),
            ]
        })
        .collect()
}

pub fn resolved_rows(fields: &[ResolvedField]) -> Vec<Vec<String>> {
    fields
        .iter()
        .map(|field| {
            let source = serde_json::to_value(field.source)
                .map(|v| value_display(&v))
                .unwrap_or_default();
            vec![
                field.key.clone(),
                field.label.clone(),
                field.field_type.to_string(),
                source,
                yes_no(field.visible),
                yes_no(field.editable),
                yes_no(field.required),
                field.order.to_string(),
            ]
        })
        .collect()
}

pub fn state_rows(states: &BTreeMap<String, FieldRuntimeState>, order: &[String]) -> Vec<Vec<String>> {
    order
        .iter()
        .filter_map(|key| states.get(key).map(|state| (key, state)))
        .map(|(key, state)| {
            vec![
                key.clone(),
                yes_no(state.visible),
                yes_no(state.enabled),
                yes_no(state.required),
            ]
        })
        .collect()
}

pub fn config_rows(effective: &[(String, FieldConfig)]) -> Vec<Vec<String>> {
    effective
        .iter()
        .map(|(key, config)| {
            vec![
                key.clone(),
                yes_no(config.visible),
                yes_no(config.editable),
                yes_no(config.required),
                config.order.to_string(),
            ]
        })
        .collect()
}
