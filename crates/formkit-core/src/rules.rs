//! Dependency rule book.
//!
//! Stores conditional rules under a zero-padded sequence key so that key
//! order equals id order equals evaluation order.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::{FormError, Result};
use crate::storage::{
    collections, queue_next_id, Batch, RecordFilter, RecordStore, RecordStoreExt, RecordView,
};
use crate::types::{ConditionType, FieldDefinition, FieldDependency, NewFieldDependency};

const RULE_SEQUENCE: &str = "field_dependency";

fn rule_key(id: u64) -> String {
    format!("{:020}", id)
}

/// Dependency rules over a record store.
pub struct DependencyRules<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> DependencyRules<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Add a rule.
    ///
    /// # Errors
    ///
    /// Returns `FormError::UnknownField` if the target definition does not
    /// exist, and `FormError::InvalidInput` if the condition value has the
    /// wrong shape for its condition.
    pub fn add(&self, new: NewFieldDependency) -> Result<FieldDependency> {
        let filter = RecordFilter::new()
            .eq("id", new.field_definition_id.to_string())
            .limit(1);
        let target: Option<FieldDefinition> = self
            .store
            .query_as::<FieldDefinition>(collections::FIELD_DEFINITIONS, &filter)?
            .into_iter()
            .next();
        let Some(target) = target else {
            return Err(FormError::UnknownField {
                key: new.field_definition_id.to_string(),
            });
        };

        if new.depends_on_field_key.trim().is_empty() {
            return Err(FormError::InvalidInput(
                "Controlling field key cannot be empty".to_string(),
            ));
        }
        check_condition_value(new.condition_type, &new.condition_value)?;

        // Id allocation and the rule write share one transaction so that
        // concurrent adds never reuse an id.
        let rule = self.store.transact_with(|view| {
            let mut batch = Batch::new();
            let id = queue_next_id(view, &mut batch, RULE_SEQUENCE)?;
            let rule = FieldDependency {
                id,
                field_definition_id: new.field_definition_id,
                depends_on_field_key: new.depends_on_field_key.clone(),
                condition_type: new.condition_type,
                condition_value: new.condition_value.clone(),
                action: new.action,
            };
            batch.put_record(collections::FIELD_DEPENDENCIES, rule_key(id), &rule)?;
            Ok((batch, rule))
        })?;

        debug!(
            id = rule.id,
            target = %target.field_key,
            depends_on = %rule.depends_on_field_key,
            "added dependency rule"
        );
        Ok(rule)
    }

    /// Every rule, ascending by id.
    pub fn list(&self) -> Result<Vec<FieldDependency>> {
        self.store
            .query_as(collections::FIELD_DEPENDENCIES, &RecordFilter::new())
    }

    /// Rules whose target is one of `definition_ids`, ascending by id.
    pub fn for_fields(&self, definition_ids: &[Uuid]) -> Result<Vec<FieldDependency>> {
        let wanted: BTreeSet<&Uuid> = definition_ids.iter().collect();
        Ok(self
            .list()?
            .into_iter()
            .filter(|rule| wanted.contains(&rule.field_definition_id))
            .collect())
    }

    /// Remove one rule.
    pub fn remove(&self, id: u64) -> Result<()> {
        if !self
            .store
            .delete(collections::FIELD_DEPENDENCIES, &rule_key(id))?
        {
            return Err(FormError::NotFound(format!("Dependency rule {}", id)));
        }
        debug!(id, "removed dependency rule");
        Ok(())
    }

    /// Remove every rule targeting a definition. Returns how many were removed.
    pub fn remove_for_field(&self, definition_id: &Uuid) -> Result<usize> {
        let filter = RecordFilter::new().eq("field_definition_id", definition_id.to_string());
        let records = self.store.query(collections::FIELD_DEPENDENCIES, &filter)?;

        let mut batch = Batch::new();
        for record in &records {
            batch.delete(collections::FIELD_DEPENDENCIES, record.key.as_str());
        }
        self.store.apply(&batch)?;
        Ok(records.len())
    }
}

/// Point every rule controlled by `old_key` at `new_key`.
pub(crate) fn queue_controller_rekey(
    view: &dyn RecordView,
    batch: &mut Batch,
    old_key: &str,
    new_key: &str,
) -> Result<usize> {
    let filter = RecordFilter::new().eq("depends_on_field_key", old_key);
    let rules: Vec<FieldDependency> = view.query_as(collections::FIELD_DEPENDENCIES, &filter)?;
    for mut rule in rules.iter().cloned() {
        rule.depends_on_field_key = new_key.to_string();
        batch.put_record(collections::FIELD_DEPENDENCIES, rule_key(rule.id), &rule)?;
    }
    Ok(rules.len())
}

fn check_condition_value(condition: ConditionType, value: &Value) -> Result<()> {
    match condition {
        ConditionType::In | ConditionType::NotIn => match value {
            Value::Array(_) | Value::String(_) => Ok(()),
            _ => Err(FormError::InvalidInput(
                "Membership conditions need a list or comma-separated string".to_string(),
            )),
        },
        ConditionType::GreaterThan | ConditionType::LessThan => {
            if crate::dependency::as_number(value).is_some() {
                Ok(())
            } else {
                Err(FormError::InvalidInput(
                    "Comparison conditions need a numeric value".to_string(),
                ))
            }
        }
        _ => Ok(()),
    }
}
