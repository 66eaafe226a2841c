//! Field definition registry.
//!
//! Catalog of custom field definitions, keyed by their globally unique
//! `field_key`. Definitions are scoped to a module (or "global") and
//! optionally to one owner.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{FormError, Result};
use crate::rules::queue_controller_rekey;
use crate::storage::{collections, Batch, RecordFilter, RecordStore, RecordStoreExt, RecordView};
use crate::templates::queue_field_rekey;
use crate::types::{
    check_field_shape, FieldDefinition, FieldDefinitionUpdate, NewFieldDefinition, OwnerId,
};

/// How [`FieldRegistry::delete`] treats stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Refuse while any stored value references the field
    Restrict,
    /// Remove the definition together with its values
    Cascade,
}

/// Registry of field definitions over a record store.
pub struct FieldRegistry<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> FieldRegistry<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Active definitions visible from `module` for `owner`, oldest first.
    pub fn list(&self, module: &str, owner: Option<OwnerId>) -> Result<Vec<FieldDefinition>> {
        let mut defs: Vec<FieldDefinition> = self
            .list_all()?
            .into_iter()
            .filter(|def| def.is_active && def.in_scope(module, owner))
            .collect();
        sort_definitions(&mut defs);
        Ok(defs)
    }

    /// Every stored definition, including inactive ones.
    pub fn list_all(&self) -> Result<Vec<FieldDefinition>> {
        let mut defs: Vec<FieldDefinition> = self
            .store
            .query_as(collections::FIELD_DEFINITIONS, &RecordFilter::new())?;
        sort_definitions(&mut defs);
        Ok(defs)
    }

    /// Get a definition by key (exact, case-sensitive).
    pub fn get(&self, field_key: &str) -> Result<Option<FieldDefinition>> {
        self.store
            .get_as(collections::FIELD_DEFINITIONS, field_key)
    }

    /// Get a definition by key or fail with `UnknownField`.
    pub fn require(&self, field_key: &str) -> Result<FieldDefinition> {
        self.get(field_key)?.ok_or_else(|| FormError::UnknownField {
            key: field_key.to_string(),
        })
    }

    /// Get a definition by id.
    pub fn get_by_id(&self, id: &Uuid) -> Result<Option<FieldDefinition>> {
        let filter = RecordFilter::new()
            .eq("id", id.to_string())
            .limit(1);
        Ok(self
            .store
            .query_as::<FieldDefinition>(collections::FIELD_DEFINITIONS, &filter)?
            .into_iter()
            .next())
    }

    /// Create a new definition.
    ///
    /// # Errors
    ///
    /// Returns `FormError::DuplicateKey` if the key exists, and
    /// `FormError::InvalidInput` if the definition is malformed.
    pub fn create(&self, new: NewFieldDefinition) -> Result<FieldDefinition> {
        check_field_shape(
            &new.field_key,
            new.field_type,
            &new.options,
            &new.validation_rules,
        )?;
        if new.module.trim().is_empty() {
            return Err(FormError::InvalidInput(
                "Field module cannot be empty".to_string(),
            ));
        }
        if self.get(&new.field_key)?.is_some() {
            return Err(FormError::DuplicateKey { key: new.field_key });
        }

        let now = Utc::now();
        let def = FieldDefinition {
            id: Uuid::new_v4(),
            field_key: new.field_key,
            module: new.module,
            label: new.label,
            field_type: new.field_type,
            options: new.options,
            validation_rules: new.validation_rules,
            default_value: new.default_value,
            is_system_field: new.is_system_field,
            is_active: true,
            owner_scope: new.owner_scope,
            created_at: now,
            updated_at: now,
        };

        self.store
            .put_as(collections::FIELD_DEFINITIONS, &def.field_key, &def)?;
        debug!(key = %def.field_key, module = %def.module, id = %def.id, "created field definition");
        Ok(def)
    }

    /// Apply a partial update.
    ///
    /// Re-keying rewrites the key in every template that lists the field and
    /// in every rule it controls, in the same batch as the definition.
    ///
    /// # Errors
    ///
    /// Returns `FormError::ImmutableField` when changing the key or type of a
    /// field that stored values reference, and `FormError::DuplicateKey` when
    /// re-keying onto an existing key.
    pub fn update(&self, field_key: &str, update: FieldDefinitionUpdate) -> Result<FieldDefinition> {
        let (def, previous_key) = self.store.transact_with(|view| {
            let current = require_in(view, field_key)?;
            let mut def = current.clone();
            let update = update.clone();

            let rekey = update
                .field_key
                .as_ref()
                .filter(|new_key| new_key.as_str() != current.field_key);
            let retype = update
                .field_type
                .filter(|new_type| *new_type != current.field_type);

            if (rekey.is_some() || retype.is_some()) && value_count(view, &current.id)? > 0 {
                return Err(FormError::ImmutableField {
                    key: current.field_key.clone(),
                    attribute: if rekey.is_some() { "key" } else { "type" },
                });
            }

            if let Some(new_key) = rekey {
                if view
                    .read(collections::FIELD_DEFINITIONS, new_key)?
                    .is_some()
                {
                    return Err(FormError::DuplicateKey {
                        key: new_key.clone(),
                    });
                }
                def.field_key = new_key.clone();
            }
            if let Some(new_type) = retype {
                def.field_type = new_type;
            }
            if let Some(label) = update.label {
                def.label = label;
            }
            if let Some(options) = update.options {
                def.options = options;
            }
            if let Some(rules) = update.validation_rules {
                def.validation_rules = rules;
            }
            if let Some(default_value) = update.default_value {
                def.default_value = default_value;
            }

            check_field_shape(
                &def.field_key,
                def.field_type,
                &def.options,
                &def.validation_rules,
            )?;
            def.updated_at = Utc::now();

            let mut batch = Batch::new();
            if def.field_key != current.field_key {
                batch.delete(collections::FIELD_DEFINITIONS, current.field_key.as_str());
                let templates =
                    queue_field_rekey(view, &mut batch, &current.field_key, Some(&def.field_key))?;
                let rules =
                    queue_controller_rekey(view, &mut batch, &current.field_key, &def.field_key)?;
                debug!(templates, rules, "rewrote references to re-keyed field");
            }
            batch.put_record(collections::FIELD_DEFINITIONS, def.field_key.as_str(), &def)?;
            Ok((batch, (def, current.field_key)))
        })?;

        debug!(key = %def.field_key, previous_key = %previous_key, "updated field definition");
        Ok(def)
    }

    /// Soft-disable a definition. Stored values are retained.
    ///
    /// # Errors
    ///
    /// Returns `FormError::SystemFieldProtected` for system fields.
    pub fn deactivate(&self, field_key: &str) -> Result<FieldDefinition> {
        let def = self.require(field_key)?;
        if def.is_system_field {
            return Err(FormError::SystemFieldProtected {
                key: def.field_key,
            });
        }
        self.set_active(def, false)
    }

    /// Re-enable a previously deactivated definition.
    pub fn activate(&self, field_key: &str) -> Result<FieldDefinition> {
        let def = self.require(field_key)?;
        self.set_active(def, true)
    }

    fn set_active(&self, mut def: FieldDefinition, active: bool) -> Result<FieldDefinition> {
        if def.is_active == active {
            return Ok(def);
        }
        def.is_active = active;
        def.updated_at = Utc::now();
        self.store
            .put_as(collections::FIELD_DEFINITIONS, &def.field_key, &def)?;
        debug!(key = %def.field_key, active, "changed field activation");
        Ok(def)
    }

    /// Physically remove a definition. Its dependency rules go with it, and
    /// templates stop listing its key.
    ///
    /// # Errors
    ///
    /// Returns `FormError::SystemFieldProtected` for system fields and, in
    /// `Restrict` mode, `FormError::FieldInUse` while values reference it.
    pub fn delete(&self, field_key: &str, mode: DeleteMode) -> Result<()> {
        let (values, rules, templates) = self.store.transact_with(|view| {
            let def = require_in(view, field_key)?;
            if def.is_system_field {
                return Err(FormError::SystemFieldProtected {
                    key: def.field_key,
                });
            }

            let by_definition =
                RecordFilter::new().eq("field_definition_id", def.id.to_string());
            let values = view.query(collections::CUSTOM_FIELD_VALUES, &by_definition)?;
            if mode == DeleteMode::Restrict && !values.is_empty() {
                return Err(FormError::FieldInUse {
                    key: def.field_key,
                    count: values.len(),
                });
            }
            let rules = view.query(collections::FIELD_DEPENDENCIES, &by_definition)?;

            let mut batch = Batch::new();
            for value in &values {
                batch.delete(collections::CUSTOM_FIELD_VALUES, value.key.as_str());
            }
            for rule in &rules {
                batch.delete(collections::FIELD_DEPENDENCIES, rule.key.as_str());
            }
            let templates = queue_field_rekey(view, &mut batch, &def.field_key, None)?;
            batch.delete(collections::FIELD_DEFINITIONS, def.field_key.as_str());
            Ok((batch, (values.len(), rules.len(), templates)))
        })?;

        debug!(
            key = %field_key,
            values,
            rules,
            templates,
            "deleted field definition"
        );
        Ok(())
    }

    /// Number of stored values referencing a definition.
    pub fn reference_count(&self, id: &Uuid) -> Result<usize> {
        let filter = RecordFilter::new().eq("field_definition_id", id.to_string());
        Ok(self
            .store
            .query(collections::CUSTOM_FIELD_VALUES, &filter)?
            .len())
    }
}

fn require_in(view: &dyn RecordView, field_key: &str) -> Result<FieldDefinition> {
    view.get_as(collections::FIELD_DEFINITIONS, field_key)?
        .ok_or_else(|| FormError::UnknownField {
            key: field_key.to_string(),
        })
}

fn value_count(view: &dyn RecordView, id: &Uuid) -> Result<usize> {
    let filter = RecordFilter::new().eq("field_definition_id", id.to_string());
    Ok(view.query(collections::CUSTOM_FIELD_VALUES, &filter)?.len())
}

fn sort_definitions(defs: &mut [FieldDefinition]) {
    defs.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.field_key.cmp(&b.field_key))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::DependencyRules;
    use crate::storage::MemoryStore;
    use crate::templates::{FormTemplateUpdate, NewFormTemplate, TemplateLibrary};
    use crate::types::{
        ConditionType, DependencyAction, FieldType, NewFieldDependency, SelectOption,
        ValidationRules,
    };
    use serde_json::json;

    fn registry(store: &MemoryStore) -> FieldRegistry<'_, MemoryStore> {
        FieldRegistry::new(store)
    }

    fn fake_value(store: &MemoryStore, def: &FieldDefinition) {
        store
            .write(
                collections::CUSTOM_FIELD_VALUES,
                &format!("products/1/{}", def.id),
                &json!({"field_definition_id": def.id.to_string(), "value": 1}),
            )
            .unwrap();
    }

    #[test]
    fn test_create_and_get() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        let def = reg
            .create(NewFieldDefinition::new("warranty", "products", "Warranty", FieldType::Number).required())
            .unwrap();

        assert!(def.is_active);
        assert_eq!(reg.get("warranty").unwrap(), Some(def.clone()));
        assert_eq!(reg.get_by_id(&def.id).unwrap(), Some(def));
        assert_eq!(reg.get("Warranty").unwrap(), None);
    }

    #[test]
    fn test_create_duplicate_key_fails() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        reg.create(NewFieldDefinition::new("color", "products", "Color", FieldType::Text))
            .unwrap();

        let err = reg
            .create(NewFieldDefinition::new("color", "sales", "Colour", FieldType::Text))
            .unwrap_err();
        assert!(matches!(err, FormError::DuplicateKey { .. }));

        // Case-sensitive: a differently-cased key is a different field.
        reg.create(NewFieldDefinition::new("Color", "products", "Color", FieldType::Text))
            .unwrap();
    }

    #[test]
    fn test_create_select_requires_options() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        let err = reg
            .create(NewFieldDefinition::new("size", "products", "Size", FieldType::Select))
            .unwrap_err();
        assert!(matches!(err, FormError::InvalidInput(_)));

        reg.create(
            NewFieldDefinition::new("size", "products", "Size", FieldType::Select)
                .with_options(vec![SelectOption::new("Small", "s")]),
        )
        .unwrap();
    }

    #[test]
    fn test_list_scopes_by_module_owner_and_activity() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        reg.create(NewFieldDefinition::new("a", "products", "A", FieldType::Text))
            .unwrap();
        reg.create(NewFieldDefinition::new("b", "global", "B", FieldType::Text))
            .unwrap();
        reg.create(NewFieldDefinition::new("c", "sales", "C", FieldType::Text))
            .unwrap();
        reg.create(NewFieldDefinition::new("d", "products", "D", FieldType::Text).owned_by(42))
            .unwrap();
        reg.create(NewFieldDefinition::new("e", "products", "E", FieldType::Text))
            .unwrap();
        reg.deactivate("e").unwrap();

        let keys = |defs: Vec<FieldDefinition>| -> Vec<String> {
            let mut keys: Vec<_> = defs.into_iter().map(|d| d.field_key).collect();
            keys.sort();
            keys
        };

        assert_eq!(keys(reg.list("products", None).unwrap()), vec!["a", "b"]);
        assert_eq!(keys(reg.list("products", Some(42)).unwrap()), vec!["a", "b", "d"]);
        assert_eq!(keys(reg.list("products", Some(7)).unwrap()), vec!["a", "b"]);
        assert_eq!(reg.list_all().unwrap().len(), 5);
    }

    #[test]
    fn test_update_label_and_rules() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        reg.create(NewFieldDefinition::new("weight", "products", "Weight", FieldType::Number))
            .unwrap();

        let updated = reg
            .update(
                "weight",
                FieldDefinitionUpdate {
                    label: Some("Weight (kg)".into()),
                    validation_rules: Some(ValidationRules {
                        min: Some(0.0),
                        ..ValidationRules::default()
                    }),
                    ..FieldDefinitionUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.label, "Weight (kg)");
        assert_eq!(reg.get("weight").unwrap().unwrap().validation_rules.min, Some(0.0));
    }

    #[test]
    fn test_update_rekeys_unreferenced_field() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        let def = reg
            .create(NewFieldDefinition::new("colour", "products", "Color", FieldType::Text))
            .unwrap();

        let updated = reg
            .update(
                "colour",
                FieldDefinitionUpdate {
                    field_key: Some("color".into()),
                    ..FieldDefinitionUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.id, def.id);
        assert!(reg.get("colour").unwrap().is_none());
        assert!(reg.get("color").unwrap().is_some());
    }

    #[test]
    fn test_rekey_rewrites_templates_and_rules() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        reg.create(NewFieldDefinition::new("colour", "products", "Colour", FieldType::Text))
            .unwrap();
        let size = reg
            .create(NewFieldDefinition::new("size", "products", "Size", FieldType::Text))
            .unwrap();
        let rule = DependencyRules::new(&store)
            .add(NewFieldDependency::new(
                size.id,
                "colour",
                ConditionType::IsNotEmpty,
                serde_json::Value::Null,
                DependencyAction::Show,
            ))
            .unwrap();
        let lib = TemplateLibrary::new(&store);
        let template = lib
            .create(
                NewFormTemplate::new("Apparel", "products")
                    .custom_fields(&["colour", "size"])
                    .list_fields(&["name", "colour"])
                    .detail_group("Look", &["colour"])
                    .rule("colour", ValidationRules::required()),
            )
            .unwrap();

        reg.update(
            "colour",
            FieldDefinitionUpdate {
                field_key: Some("color".into()),
                ..FieldDefinitionUpdate::default()
            },
        )
        .unwrap();

        let rewritten = lib.require(&template.id).unwrap();
        assert_eq!(rewritten.custom_fields, vec!["color", "size"]);
        assert_eq!(rewritten.list_fields, Some(vec!["name".to_string(), "color".to_string()]));
        assert_eq!(rewritten.detail_fields.unwrap()[0].fields, vec!["color"]);
        assert!(rewritten.validation_rules.contains_key("color"));
        assert!(!rewritten.validation_rules.contains_key("colour"));

        let rules = DependencyRules::new(&store).list().unwrap();
        assert_eq!(rules[0].id, rule.id);
        assert_eq!(rules[0].depends_on_field_key, "color");

        let renamed = lib
            .update(
                &template.id,
                FormTemplateUpdate {
                    name: Some("Clothing".into()),
                    ..FormTemplateUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.name, "Clothing");
    }

    #[test]
    fn test_delete_drops_key_from_templates() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        let def = reg
            .create(NewFieldDefinition::new("fabric", "products", "Fabric", FieldType::Text))
            .unwrap();
        reg.create(NewFieldDefinition::new("size", "products", "Size", FieldType::Text))
            .unwrap();
        fake_value(&store, &def);
        let lib = TemplateLibrary::new(&store);
        let template = lib
            .create(
                NewFormTemplate::new("Apparel", "products")
                    .custom_fields(&["fabric", "size"])
                    .list_fields(&["fabric", "size"])
                    .rule("fabric", ValidationRules::required()),
            )
            .unwrap();

        reg.delete("fabric", DeleteMode::Restrict).unwrap_err();
        assert_eq!(lib.require(&template.id).unwrap().custom_fields, vec!["fabric", "size"]);

        reg.delete("fabric", DeleteMode::Cascade).unwrap();
        let stripped = lib.require(&template.id).unwrap();
        assert_eq!(stripped.custom_fields, vec!["size"]);
        assert_eq!(stripped.list_fields, Some(vec!["size".to_string()]));
        assert!(stripped.validation_rules.is_empty());

        lib.update(
            &template.id,
            FormTemplateUpdate {
                name: Some("Sizes".into()),
                ..FormTemplateUpdate::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn test_update_referenced_key_or_type_is_immutable() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        let def = reg
            .create(NewFieldDefinition::new("color", "products", "Color", FieldType::Text))
            .unwrap();
        fake_value(&store, &def);

        let err = reg
            .update(
                "color",
                FieldDefinitionUpdate {
                    field_type: Some(FieldType::Number),
                    ..FieldDefinitionUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, FormError::ImmutableField { attribute: "type", .. }));

        let err = reg
            .update(
                "color",
                FieldDefinitionUpdate {
                    field_key: Some("colour".into()),
                    ..FieldDefinitionUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, FormError::ImmutableField { attribute: "key", .. }));

        // Same key and type is not a change.
        reg.update(
            "color",
            FieldDefinitionUpdate {
                field_key: Some("color".into()),
                field_type: Some(FieldType::Text),
                label: Some("Colour".into()),
                ..FieldDefinitionUpdate::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn test_system_fields_are_protected() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        reg.create(NewFieldDefinition::new("tax_id", "global", "Tax ID", FieldType::Text).system())
            .unwrap();

        assert!(matches!(
            reg.deactivate("tax_id").unwrap_err(),
            FormError::SystemFieldProtected { .. }
        ));
        assert!(matches!(
            reg.delete("tax_id", DeleteMode::Cascade).unwrap_err(),
            FormError::SystemFieldProtected { .. }
        ));
        assert!(reg.get("tax_id").unwrap().unwrap().is_active);
    }

    #[test]
    fn test_deactivate_keeps_values() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        let def = reg
            .create(NewFieldDefinition::new("color", "products", "Color", FieldType::Text))
            .unwrap();
        fake_value(&store, &def);

        let deactivated = reg.deactivate("color").unwrap();
        assert!(!deactivated.is_active);
        assert_eq!(reg.reference_count(&def.id).unwrap(), 1);

        assert!(reg.activate("color").unwrap().is_active);
    }

    #[test]
    fn test_delete_restrict_and_cascade() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        let def = reg
            .create(NewFieldDefinition::new("color", "products", "Color", FieldType::Text))
            .unwrap();
        fake_value(&store, &def);
        store
            .write(
                collections::FIELD_DEPENDENCIES,
                "00000000000000000001",
                &json!({"field_definition_id": def.id.to_string()}),
            )
            .unwrap();

        let err = reg.delete("color", DeleteMode::Restrict).unwrap_err();
        assert!(matches!(err, FormError::FieldInUse { count: 1, .. }));

        reg.delete("color", DeleteMode::Cascade).unwrap();
        assert!(reg.get("color").unwrap().is_none());
        assert_eq!(store.len(collections::CUSTOM_FIELD_VALUES).unwrap(), 0);
        assert_eq!(store.len(collections::FIELD_DEPENDENCIES).unwrap(), 0);
    }

    #[test]
    fn test_unknown_field_errors() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        assert!(matches!(
            reg.require("nope").unwrap_err(),
            FormError::UnknownField { .. }
        ));
        assert!(matches!(
            reg.deactivate("nope").unwrap_err(),
            FormError::UnknownField { .. }
        ));
    }
}
