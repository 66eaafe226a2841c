//! Custom field value store.
//!
//! Values are kept one row per (entity type, entity id, field definition).
//! The store does no type checking; shape rules live in the validator.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::{FormError, Result};
use crate::registry::FieldRegistry;
use crate::storage::{collections, Batch, RecordFilter, RecordStore, RecordStoreExt, RecordView};
use crate::types::{CustomFieldValue, FieldDefinition, FormValues, GLOBAL_MODULE};

/// `entity_type/entity_id/definition_id`, with `%` and `/` escaped inside
/// the entity parts so distinct entities never share a key.
fn value_key(entity_type: &str, entity_id: &str, definition_id: &Uuid) -> String {
    format!(
        "{}/{}/{}",
        escape_key_part(entity_type),
        escape_key_part(entity_id),
        definition_id
    )
}

fn escape_key_part(part: &str) -> String {
    part.replace('%', "%25").replace('/', "%2F")
}

/// Summary of one `set_values` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueChanges {
    pub upserted: usize,
    pub deleted: usize,
}

/// Entity-attribute-value store over a record store.
pub struct CustomFieldStore<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> CustomFieldStore<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    fn rows(&self, entity_type: &str, entity_id: &str) -> Result<Vec<CustomFieldValue>> {
        let filter = RecordFilter::new()
            .eq("entity_type", entity_type)
            .eq("entity_id", entity_id);
        self.store
            .query_as(collections::CUSTOM_FIELD_VALUES, &filter)
    }

    /// All stored values of an entity keyed by field key.
    ///
    /// Values of deactivated definitions are included. The current key of the
    /// definition is used when it still exists.
    pub fn get_values(&self, entity_type: &str, entity_id: &str) -> Result<FormValues> {
        let registry = FieldRegistry::new(self.store);
        let mut current_keys: BTreeMap<Uuid, String> = BTreeMap::new();
        for def in registry.list_all()? {
            current_keys.insert(def.id, def.field_key);
        }

        Ok(self
            .rows(entity_type, entity_id)?
            .into_iter()
            .map(|row| {
                let key = current_keys
                    .get(&row.field_definition_id)
                    .cloned()
                    .unwrap_or(row.field_key);
                (key, row.value)
            })
            .collect())
    }

    /// One stored value, if any.
    pub fn get_value(
        &self,
        entity_type: &str,
        entity_id: &str,
        field_key: &str,
    ) -> Result<Option<Value>> {
        let Some(def) = FieldRegistry::new(self.store).get(field_key)? else {
            return Ok(None);
        };
        let row: Option<CustomFieldValue> = self.store.get_as(
            collections::CUSTOM_FIELD_VALUES,
            &value_key(entity_type, entity_id, &def.id),
        )?;
        Ok(row.map(|row| row.value))
    }

    /// Diff-and-upsert the given values.
    ///
    /// Present and non-null keys are upserted, present null keys are deleted,
    /// absent keys are left alone. All writes commit as one batch.
    ///
    /// # Errors
    ///
    /// Returns `FormError::UnknownField` if a key has no active definition in
    /// the entity's module or the global scope; nothing is written then.
    pub fn set_values(
        &self,
        entity_type: &str,
        entity_id: &str,
        values: &FormValues,
    ) -> Result<ValueChanges> {
        if entity_type.is_empty() || entity_id.is_empty() {
            return Err(FormError::InvalidInput(
                "Entity type and id cannot be empty".to_string(),
            ));
        }

        // Definition checks, existing rows and the writes share one
        // transaction so a concurrent field delete cannot orphan new values.
        let changes = self.store.transact_with(|view| {
            let mut resolved: Vec<(FieldDefinition, &Value)> = Vec::with_capacity(values.len());
            for (key, value) in values {
                let def = view
                    .get_as::<FieldDefinition>(collections::FIELD_DEFINITIONS, key)?
                    .filter(|def| {
                        def.is_active && (def.module == entity_type || def.module == GLOBAL_MODULE)
                    })
                    .ok_or_else(|| FormError::UnknownField { key: key.clone() })?;
                resolved.push((def, value));
            }

            let now = Utc::now();
            let mut batch = Batch::new();
            let mut changes = ValueChanges::default();
            for (def, value) in resolved {
                let key = value_key(entity_type, entity_id, &def.id);
                if value.is_null() {
                    if view.read(collections::CUSTOM_FIELD_VALUES, &key)?.is_some() {
                        batch.delete(collections::CUSTOM_FIELD_VALUES, key);
                        changes.deleted += 1;
                    }
                    continue;
                }

                let existing: Option<CustomFieldValue> =
                    view.get_as(collections::CUSTOM_FIELD_VALUES, &key)?;
                let row = CustomFieldValue {
                    entity_type: entity_type.to_string(),
                    entity_id: entity_id.to_string(),
                    field_definition_id: def.id,
                    field_key: def.field_key.clone(),
                    value: value.clone(),
                    created_at: existing.map(|row| row.created_at).unwrap_or(now),
                    updated_at: now,
                };
                batch.put_record(collections::CUSTOM_FIELD_VALUES, key, &row)?;
                changes.upserted += 1;
            }
            Ok((batch, changes))
        })?;

        debug!(
            entity_type,
            entity_id,
            upserted = changes.upserted,
            deleted = changes.deleted,
            "stored custom field values"
        );
        Ok(changes)
    }

    /// Delete every value of an entity. Returns how many rows were removed.
    pub fn delete_all(&self, entity_type: &str, entity_id: &str) -> Result<usize> {
        let filter = RecordFilter::new()
            .eq("entity_type", entity_type)
            .eq("entity_id", entity_id);
        let records = self.store.query(collections::CUSTOM_FIELD_VALUES, &filter)?;

        let mut batch = Batch::new();
        for record in &records {
            batch.delete(collections::CUSTOM_FIELD_VALUES, record.key.as_str());
        }
        self.store.apply(&batch)?;
        debug!(entity_type, entity_id, removed = records.len(), "deleted entity values");
        Ok(records.len())
    }

    /// Number of stored values for one definition across all entities.
    pub fn count_for_field(&self, definition_id: &Uuid) -> Result<usize> {
        FieldRegistry::new(self.store).reference_count(definition_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::{FieldType, FieldDefinitionUpdate, NewFieldDefinition};
    use serde_json::json;

    fn setup() -> MemoryStore {
        let store = MemoryStore::new();
        let registry = FieldRegistry::new(&store);
        registry
            .create(NewFieldDefinition::new("a", "products", "A", FieldType::Number))
            .unwrap();
        registry
            .create(NewFieldDefinition::new("b", "products", "B", FieldType::Number))
            .unwrap();
        registry
            .create(NewFieldDefinition::new("notes", "global", "Notes", FieldType::Textarea))
            .unwrap();
        registry
            .create(NewFieldDefinition::new("due", "sales", "Due", FieldType::Date))
            .unwrap();
        store
    }

    fn values(pairs: &[(&str, Value)]) -> FormValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let store = setup();
        let eav = CustomFieldStore::new(&store);

        eav.set_values("products", "1", &values(&[("a", json!(1)), ("b", json!(2))]))
            .unwrap();
        assert_eq!(
            eav.get_values("products", "1").unwrap(),
            values(&[("a", json!(1)), ("b", json!(2))])
        );

        let changes = eav
            .set_values("products", "1", &values(&[("a", Value::Null)]))
            .unwrap();
        assert_eq!(changes, ValueChanges { upserted: 0, deleted: 1 });
        assert_eq!(
            eav.get_values("products", "1").unwrap(),
            values(&[("b", json!(2))])
        );
    }

    #[test]
    fn test_absent_keys_are_untouched() {
        let store = setup();
        let eav = CustomFieldStore::new(&store);
        eav.set_values("products", "1", &values(&[("a", json!(1)), ("b", json!(2))]))
            .unwrap();
        eav.set_values("products", "1", &values(&[("b", json!(3))]))
            .unwrap();

        assert_eq!(eav.get_value("products", "1", "a").unwrap(), Some(json!(1)));
        assert_eq!(eav.get_value("products", "1", "b").unwrap(), Some(json!(3)));
    }

    #[test]
    fn test_entities_are_isolated() {
        let store = setup();
        let eav = CustomFieldStore::new(&store);
        eav.set_values("products", "1", &values(&[("a", json!(1))]))
            .unwrap();
        eav.set_values("products", "2", &values(&[("a", json!(9))]))
            .unwrap();

        assert_eq!(eav.get_value("products", "1", "a").unwrap(), Some(json!(1)));
        assert!(eav.get_values("products", "3").unwrap().is_empty());
    }

    #[test]
    fn test_slashes_in_entity_parts_do_not_collide() {
        let store = setup();
        let eav = CustomFieldStore::new(&store);
        eav.set_values("products/x", "1", &values(&[("notes", json!("first"))]))
            .unwrap();
        eav.set_values("products", "x/1", &values(&[("notes", json!("second"))]))
            .unwrap();

        assert_eq!(
            eav.get_value("products/x", "1", "notes").unwrap(),
            Some(json!("first"))
        );
        assert_eq!(
            eav.get_value("products", "x/1", "notes").unwrap(),
            Some(json!("second"))
        );
        assert_eq!(store.len(collections::CUSTOM_FIELD_VALUES).unwrap(), 2);
        assert_ne!(value_key("a%2Fb", "c", &Uuid::nil()), value_key("a/b", "c", &Uuid::nil()));
    }

    #[test]
    fn test_global_fields_are_in_every_scope() {
        let store = setup();
        let eav = CustomFieldStore::new(&store);
        eav.set_values("products", "1", &values(&[("notes", json!("fragile"))]))
            .unwrap();
        eav.set_values("sales", "7", &values(&[("notes", json!("rush"))]))
            .unwrap();
        assert_eq!(eav.count_for_field(&FieldRegistry::new(&store).require("notes").unwrap().id).unwrap(), 2);
    }

    #[test]
    fn test_unknown_or_out_of_scope_key_writes_nothing() {
        let store = setup();
        let eav = CustomFieldStore::new(&store);

        let err = eav
            .set_values("products", "1", &values(&[("a", json!(1)), ("due", json!("2024-01-01"))]))
            .unwrap_err();
        assert!(matches!(err, FormError::UnknownField { ref key } if key == "due"));

        let err = eav
            .set_values("products", "1", &values(&[("missing", json!(1))]))
            .unwrap_err();
        assert!(matches!(err, FormError::UnknownField { .. }));

        assert!(eav.get_values("products", "1").unwrap().is_empty());
    }

    #[test]
    fn test_inactive_fields_reject_writes_but_keep_values() {
        let store = setup();
        let eav = CustomFieldStore::new(&store);
        eav.set_values("products", "1", &values(&[("a", json!(5))]))
            .unwrap();

        FieldRegistry::new(&store).deactivate("a").unwrap();
        assert!(eav
            .set_values("products", "1", &values(&[("a", json!(6))]))
            .is_err());
        assert_eq!(
            eav.get_values("products", "1").unwrap(),
            values(&[("a", json!(5))])
        );
    }

    #[test]
    fn test_values_follow_rekeyed_definition() {
        let store = setup();
        let registry = FieldRegistry::new(&store);
        registry
            .create(NewFieldDefinition::new("colour", "products", "Color", FieldType::Text))
            .unwrap();
        registry
            .update(
                "colour",
                FieldDefinitionUpdate {
                    field_key: Some("color".into()),
                    ..FieldDefinitionUpdate::default()
                },
            )
            .unwrap();

        let eav = CustomFieldStore::new(&store);
        eav.set_values("products", "1", &values(&[("color", json!("red"))]))
            .unwrap();
        assert_eq!(eav.get_value("products", "1", "color").unwrap(), Some(json!("red")));
    }

    #[test]
    fn test_update_preserves_created_at() {
        let store = setup();
        let eav = CustomFieldStore::new(&store);
        eav.set_values("products", "1", &values(&[("a", json!(1))]))
            .unwrap();
        let def = FieldRegistry::new(&store).require("a").unwrap();
        let key = value_key("products", "1", &def.id);
        let first: CustomFieldValue = store
            .get_as(collections::CUSTOM_FIELD_VALUES, &key)
            .unwrap()
            .unwrap();

        eav.set_values("products", "1", &values(&[("a", json!(2))]))
            .unwrap();
        let second: CustomFieldValue = store
            .get_as(collections::CUSTOM_FIELD_VALUES, &key)
            .unwrap()
            .unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.value, json!(2));
    }

    #[test]
    fn test_delete_all() {
        let store = setup();
        let eav = CustomFieldStore::new(&store);
        eav.set_values("products", "1", &values(&[("a", json!(1)), ("notes", json!("x"))]))
            .unwrap();
        eav.set_values("products", "2", &values(&[("a", json!(1))]))
            .unwrap();

        assert_eq!(eav.delete_all("products", "1").unwrap(), 2);
        assert!(eav.get_values("products", "1").unwrap().is_empty());
        assert_eq!(eav.get_values("products", "2").unwrap().len(), 1);
    }
}
