//! JSON output shapes that add context to stored records.

use std::collections::HashMap;

use serde_json::{json, Value};
use uuid::Uuid;

use formkit_core::{FieldDefinition, FieldDependency, ValidationErrors};

/// A field definition plus how many stored values reference it.
pub fn field_json(field: &FieldDefinition, references: usize) -> anyhow::Result<Value> {
    let mut value = serde_json::to_value(field)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("reference_count".to_string(), json!(references));
    }
    Ok(value)
}

/// Rules with the controlled field's key next to its id.
pub fn rules_json(rules: &[FieldDependency], keys: &HashMap<Uuid, String>) -> anyhow::Result<Value> {
    let items = rules
        .iter()
        .map(|rule| {
            let mut value = serde_json::to_value(rule)?;
            if let Some(object) = value.as_object_mut() {
                object.insert(
                    "field_key".to_string(),
                    json!(keys.get(&rule.field_definition_id)),
                );
            }
            Ok(value)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Value::Array(items))
}

/// Validation outcome: `{"valid": bool, "errors": {key: message}}`.
pub fn validation_json(errors: &ValidationErrors) -> anyhow::Result<Value> {
    Ok(json!({
        "valid": errors.is_empty(),
        "errors": serde_json::to_value(errors)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_json() {
        let mut errors = ValidationErrors::new();
        errors.add("price", "Price is required");

        let value = validation_json(&errors).expect("json should succeed");
        assert_eq!(value["valid"], json!(false));
        assert_eq!(value["errors"]["price"], json!("Price is required"));

        let value = validation_json(&ValidationErrors::new()).expect("json should succeed");
        assert_eq!(value, json!({"valid": true, "errors": {}}));
    }
}
