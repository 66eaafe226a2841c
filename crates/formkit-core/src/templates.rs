//! Form template library.
//!
//! A template customizes a module's form: it may replace the compiled-in base
//! fields, append custom fields, pick list columns and detail groups, and
//! tighten validation rules. At most one template per (module, owner) is the
//! default.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::catalog::{DetailGroup, FieldDescriptor};
use crate::error::{FormError, Result};
use crate::storage::{collections, Batch, RecordFilter, RecordStore, RecordStoreExt, RecordView};
use crate::types::{FieldDefinition, OwnerId, ValidationRules};

/// A stored form template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormTemplate {
    pub id: Uuid,
    pub name: String,
    pub module: String,
    /// `None` = shared by every owner
    #[serde(default)]
    pub owner: Option<OwnerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replaces the compiled-in base fields when non-empty
    #[serde(default)]
    pub base_fields: Vec<FieldDescriptor>,
    /// Field keys of custom fields, in display order
    #[serde(default)]
    pub custom_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_fields: Option<Vec<DetailGroup>>,
    /// Extra rules per field key
    #[serde(default)]
    pub validation_rules: BTreeMap<String, ValidationRules>,
    #[serde(default)]
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormTemplate {
    /// Rename a custom field key in the field list, list columns, detail
    /// groups and rules; `None` removes it. Returns `true` if anything
    /// referenced the key. Base fields are compiled-in descriptors and are
    /// left alone.
    fn rekey_custom_field(&mut self, old_key: &str, new_key: Option<&str>) -> bool {
        if !self.custom_fields.iter().any(|k| k == old_key) {
            return false;
        }
        rekey_keys(&mut self.custom_fields, old_key, new_key);
        if let Some(list_fields) = self.list_fields.as_mut() {
            rekey_keys(list_fields, old_key, new_key);
        }
        for group in self.detail_fields.iter_mut().flatten() {
            rekey_keys(&mut group.fields, old_key, new_key);
        }
        if let Some(rules) = self.validation_rules.remove(old_key) {
            if let Some(new_key) = new_key {
                self.validation_rules.insert(new_key.to_string(), rules);
            }
        }
        true
    }
}

/// Builder for creating new templates.
#[derive(Debug, Clone)]
pub struct NewFormTemplate {
    pub name: String,
    pub module: String,
    pub owner: Option<OwnerId>,
    pub description: Option<String>,
    pub base_fields: Vec<FieldDescriptor>,
    pub custom_fields: Vec<String>,
    pub list_fields: Option<Vec<String>>,
    pub detail_fields: Option<Vec<DetailGroup>>,
    pub validation_rules: BTreeMap<String, ValidationRules>,
    pub is_default: bool,
}

impl NewFormTemplate {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            owner: None,
            description: None,
            base_fields: Vec::new(),
            custom_fields: Vec::new(),
            list_fields: None,
            detail_fields: None,
            validation_rules: BTreeMap::new(),
            is_default: false,
        }
    }

    pub fn owned_by(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn base_field(mut self, field: FieldDescriptor) -> Self {
        self.base_fields.push(field);
        self
    }

    pub fn custom_fields(mut self, keys: &[&str]) -> Self {
        self.custom_fields = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn list_fields(mut self, keys: &[&str]) -> Self {
        self.list_fields = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn detail_group(mut self, title: impl Into<String>, keys: &[&str]) -> Self {
        self.detail_fields
            .get_or_insert_with(Vec::new)
            .push(DetailGroup::new(title, keys));
        self
    }

    pub fn rule(mut self, field_key: impl Into<String>, rules: ValidationRules) -> Self {
        self.validation_rules.insert(field_key.into(), rules);
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Partial update of a template; `None` leaves an attribute as is.
#[derive(Debug, Clone, Default)]
pub struct FormTemplateUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub base_fields: Option<Vec<FieldDescriptor>>,
    pub custom_fields: Option<Vec<String>>,
    pub list_fields: Option<Option<Vec<String>>>,
    pub detail_fields: Option<Option<Vec<DetailGroup>>>,
    pub validation_rules: Option<BTreeMap<String, ValidationRules>>,
}

/// Template library over a record store.
pub struct TemplateLibrary<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> TemplateLibrary<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Create a template.
    ///
    /// # Errors
    ///
    /// Returns `FormError::InvalidInput` for an empty name or malformed base
    /// field, and `FormError::UnknownField` for custom field keys that have
    /// no definition.
    pub fn create(&self, new: NewFormTemplate) -> Result<FormTemplate> {
        let now = Utc::now();
        let template = FormTemplate {
            id: Uuid::new_v4(),
            name: new.name,
            module: new.module,
            owner: new.owner,
            description: new.description,
            base_fields: new.base_fields,
            custom_fields: new.custom_fields,
            list_fields: new.list_fields,
            detail_fields: new.detail_fields,
            validation_rules: new.validation_rules,
            is_default: new.is_default,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store.transact(&mut |view| {
            check(view, &template)?;
            let mut batch = Batch::new();
            if template.is_default {
                queue_clear_default(view, &mut batch, &template.module, template.owner, None)?;
            }
            batch.put_record(collections::FORM_TEMPLATES, template.id.to_string(), &template)?;
            Ok(batch)
        })?;

        debug!(id = %template.id, name = %template.name, module = %template.module, "created form template");
        Ok(template)
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<FormTemplate>> {
        self.store
            .get_as(collections::FORM_TEMPLATES, &id.to_string())
    }

    /// Get a template or fail with `TemplateNotFound`.
    pub fn require(&self, id: &Uuid) -> Result<FormTemplate> {
        self.get(id)?.ok_or_else(|| FormError::TemplateNotFound { id: id.to_string() })
    }

    /// Templates of a module visible to `owner` (shared ones plus the
    /// owner's own), including inactive ones, oldest first.
    pub fn list(&self, module: &str, owner: Option<OwnerId>) -> Result<Vec<FormTemplate>> {
        let filter = RecordFilter::new().eq("module", module);
        let mut templates: Vec<FormTemplate> = self
            .store
            .query_as::<FormTemplate>(collections::FORM_TEMPLATES, &filter)?
            .into_iter()
            .filter(|t| t.owner.is_none() || t.owner == owner)
            .collect();
        templates.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(templates)
    }

    /// Templates an end user may pick.
    pub fn selectable(&self, module: &str, owner: Option<OwnerId>) -> Result<Vec<FormTemplate>> {
        Ok(self
            .list(module, owner)?
            .into_iter()
            .filter(|t| t.is_active)
            .collect())
    }

    pub fn update(&self, id: &Uuid, update: FormTemplateUpdate) -> Result<FormTemplate> {
        let template = self.store.transact_with(|view| {
            let mut template = require_in(view, id)?;
            let update = update.clone();

            if let Some(name) = update.name {
                template.name = name;
            }
            if let Some(description) = update.description {
                template.description = description;
            }
            if let Some(base_fields) = update.base_fields {
                template.base_fields = base_fields;
            }
            if let Some(custom_fields) = update.custom_fields {
                template.custom_fields = custom_fields;
            }
            if let Some(list_fields) = update.list_fields {
                template.list_fields = list_fields;
            }
            if let Some(detail_fields) = update.detail_fields {
                template.detail_fields = detail_fields;
            }
            if let Some(rules) = update.validation_rules {
                template.validation_rules = rules;
            }
            check(view, &template)?;
            template.updated_at = Utc::now();

            let mut batch = Batch::new();
            batch.put_record(collections::FORM_TEMPLATES, template.id.to_string(), &template)?;
            Ok((batch, template))
        })?;
        debug!(id = %template.id, "updated form template");
        Ok(template)
    }

    /// Delete a template. Entities that referenced it resolve to the default
    /// afterwards.
    pub fn delete(&self, id: &Uuid) -> Result<()> {
        if !self
            .store
            .delete(collections::FORM_TEMPLATES, &id.to_string())?
        {
            return Err(FormError::TemplateNotFound { id: id.to_string() });
        }
        debug!(id = %id, "deleted form template");
        Ok(())
    }

    /// Make a template the default of its (module, owner), clearing any
    /// previous default in the same batch.
    pub fn set_default(&self, id: &Uuid) -> Result<FormTemplate> {
        let template = self.store.transact_with(|view| {
            let mut template = require_in(view, id)?;
            if !template.is_active {
                return Err(FormError::InvalidInput(format!(
                    "Template '{}' is inactive and cannot be the default",
                    template.name
                )));
            }

            let mut batch = Batch::new();
            queue_clear_default(view, &mut batch, &template.module, template.owner, Some(template.id))?;
            template.is_default = true;
            template.updated_at = Utc::now();
            batch.put_record(collections::FORM_TEMPLATES, template.id.to_string(), &template)?;
            Ok((batch, template))
        })?;

        debug!(id = %template.id, module = %template.module, owner = ?template.owner, "set default template");
        Ok(template)
    }

    /// Clear the default of a (module, owner). Returns `true` if one was set.
    pub fn clear_default(&self, module: &str, owner: Option<OwnerId>) -> Result<bool> {
        self.store.transact_with(|view| {
            let mut batch = Batch::new();
            queue_clear_default(view, &mut batch, module, owner, None)?;
            let cleared = !batch.is_empty();
            Ok((batch, cleared))
        })
    }

    /// The active default template of exactly (module, owner).
    pub fn default_for(&self, module: &str, owner: Option<OwnerId>) -> Result<Option<FormTemplate>> {
        Ok(self
            .defaults_of(module, owner)?
            .into_iter()
            .find(|t| t.is_active))
    }

    /// Hide a template from selection. It stays resolvable by id and stops
    /// being a default.
    pub fn deactivate(&self, id: &Uuid) -> Result<FormTemplate> {
        let template = self.store.transact_with(|view| {
            let mut template = require_in(view, id)?;
            template.is_active = false;
            template.is_default = false;
            template.updated_at = Utc::now();
            let mut batch = Batch::new();
            batch.put_record(collections::FORM_TEMPLATES, template.id.to_string(), &template)?;
            Ok((batch, template))
        })?;
        debug!(id = %template.id, "deactivated form template");
        Ok(template)
    }

    fn defaults_of(&self, module: &str, owner: Option<OwnerId>) -> Result<Vec<FormTemplate>> {
        Ok(self
            .store
            .query_as::<FormTemplate>(collections::FORM_TEMPLATES, &defaults_filter(module))?
            .into_iter()
            .filter(|t| t.owner == owner)
            .collect())
    }
}

/// Structural checks plus custom field lookups against the stored
/// definitions. A custom field must be in scope for the template's module
/// and owner.
fn check(view: &dyn RecordView, template: &FormTemplate) -> Result<()> {
    if template.name.trim().is_empty() {
        return Err(FormError::InvalidInput(
            "Template name cannot be empty".to_string(),
        ));
    }
    if template.module.trim().is_empty() {
        return Err(FormError::InvalidInput(
            "Template module cannot be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for field in &template.base_fields {
        field.validate()?;
        if !seen.insert(field.key.as_str()) {
            return Err(FormError::InvalidInput(format!(
                "Base field '{}' is listed twice",
                field.key
            )));
        }
    }

    for key in &template.custom_fields {
        let def: Option<FieldDefinition> = view.get_as(collections::FIELD_DEFINITIONS, key)?;
        match def {
            Some(def) if def.in_scope(&template.module, template.owner) => {}
            _ => return Err(FormError::UnknownField { key: key.clone() }),
        }
    }
    Ok(())
}

fn require_in(view: &dyn RecordView, id: &Uuid) -> Result<FormTemplate> {
    view.get_as(collections::FORM_TEMPLATES, &id.to_string())?
        .ok_or_else(|| FormError::TemplateNotFound { id: id.to_string() })
}

fn defaults_filter(module: &str) -> RecordFilter {
    RecordFilter::new()
        .eq("module", module)
        .eq("is_default", true)
}

fn queue_clear_default(
    view: &dyn RecordView,
    batch: &mut Batch,
    module: &str,
    owner: Option<OwnerId>,
    keep: Option<Uuid>,
) -> Result<()> {
    let defaults: Vec<FormTemplate> =
        view.query_as(collections::FORM_TEMPLATES, &defaults_filter(module))?;
    for mut previous in defaults.into_iter().filter(|t| t.owner == owner) {
        if Some(previous.id) == keep {
            continue;
        }
        previous.is_default = false;
        previous.updated_at = Utc::now();
        batch.put_record(collections::FORM_TEMPLATES, previous.id.to_string(), &previous)?;
    }
    Ok(())
}

/// Rename (or with `None` drop) every reference a template holds to a
/// custom field key. Returns how many templates changed.
pub(crate) fn queue_field_rekey(
    view: &dyn RecordView,
    batch: &mut Batch,
    old_key: &str,
    new_key: Option<&str>,
) -> Result<usize> {
    let templates: Vec<FormTemplate> =
        view.query_as(collections::FORM_TEMPLATES, &RecordFilter::new())?;
    let mut changed = 0;
    for mut template in templates {
        if template.rekey_custom_field(old_key, new_key) {
            template.updated_at = Utc::now();
            batch.put_record(collections::FORM_TEMPLATES, template.id.to_string(), &template)?;
            changed += 1;
        }
    }
    Ok(changed)
}

fn rekey_keys(keys: &mut Vec<String>, old_key: &str, new_key: Option<&str>) -> bool {
    if !keys.iter().any(|k| k == old_key) {
        return false;
    }
    match new_key {
        Some(new_key) => keys
            .iter_mut()
            .filter(|k| k.as_str() == old_key)
            .for_each(|k| *k = new_key.to_string()),
        None => keys.retain(|k| k != old_key),
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldRegistry;
    use crate::storage::MemoryStore;
    use crate::types::{FieldType, NewFieldDefinition};

    fn count_defaults(lib: &TemplateLibrary<'_, MemoryStore>, module: &str, owner: Option<OwnerId>) -> usize {
        lib.list(module, owner)
            .unwrap()
            .iter()
            .filter(|t| t.is_default && t.owner == owner)
            .count()
    }

    #[test]
    fn test_create_and_require() {
        let store = MemoryStore::new();
        let lib = TemplateLibrary::new(&store);
        let template = lib
            .create(NewFormTemplate::new("Clothing", "products").description("Apparel items"))
            .unwrap();

        assert_eq!(lib.require(&template.id).unwrap(), template);
        assert!(matches!(
            lib.require(&Uuid::new_v4()).unwrap_err(),
            FormError::TemplateNotFound { .. }
        ));
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let store = MemoryStore::new();
        let lib = TemplateLibrary::new(&store);

        assert!(matches!(
            lib.create(NewFormTemplate::new(" ", "products")).unwrap_err(),
            FormError::InvalidInput(_)
        ));
        assert!(matches!(
            lib.create(NewFormTemplate::new("T", "products").custom_fields(&["nope"]))
                .unwrap_err(),
            FormError::UnknownField { .. }
        ));
        assert!(matches!(
            lib.create(
                NewFormTemplate::new("T", "products")
                    .base_field(FieldDescriptor::new("name", "Name", FieldType::Text))
                    .base_field(FieldDescriptor::new("name", "Name again", FieldType::Text))
            )
            .unwrap_err(),
            FormError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_custom_fields_must_be_in_scope() {
        let store = MemoryStore::new();
        let registry = FieldRegistry::new(&store);
        registry
            .create(NewFieldDefinition::new("due", "sales", "Due", FieldType::Date))
            .unwrap();
        registry
            .create(NewFieldDefinition::new("private", "products", "Private", FieldType::Text).owned_by(7))
            .unwrap();
        registry
            .create(NewFieldDefinition::new("note", "global", "Note", FieldType::Text))
            .unwrap();
        let lib = TemplateLibrary::new(&store);

        assert!(matches!(
            lib.create(NewFormTemplate::new("T", "products").custom_fields(&["due"]))
                .unwrap_err(),
            FormError::UnknownField { .. }
        ));
        assert!(matches!(
            lib.create(NewFormTemplate::new("T", "products").custom_fields(&["private"]))
                .unwrap_err(),
            FormError::UnknownField { .. }
        ));
        lib.create(
            NewFormTemplate::new("Mine", "products")
                .owned_by(7)
                .custom_fields(&["private", "note"]),
        )
        .unwrap();

        let shared = lib.create(NewFormTemplate::new("Shared", "products")).unwrap();
        let err = lib
            .update(
                &shared.id,
                FormTemplateUpdate {
                    custom_fields: Some(vec!["due".into()]),
                    ..FormTemplateUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, FormError::UnknownField { .. }));
    }

    #[test]
    fn test_concurrent_defaults_leave_one() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    TemplateLibrary::new(&*store)
                        .create(NewFormTemplate::new(format!("T{}", i), "products").owned_by(42).as_default())
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let lib = TemplateLibrary::new(&*store);
        assert_eq!(lib.list("products", Some(42)).unwrap().len(), 8);
        assert_eq!(count_defaults(&lib, "products", Some(42)), 1);
    }

    #[test]
    fn test_at_most_one_default_per_module_and_owner() {
        let store = MemoryStore::new();
        let lib = TemplateLibrary::new(&store);

        let first = lib
            .create(NewFormTemplate::new("A", "products").owned_by(42).as_default())
            .unwrap();
        let second = lib
            .create(NewFormTemplate::new("B", "products").owned_by(42).as_default())
            .unwrap();
        lib.create(NewFormTemplate::new("Shared", "products").as_default())
            .unwrap();

        assert_eq!(count_defaults(&lib, "products", Some(42)), 1);
        assert_eq!(lib.default_for("products", Some(42)).unwrap().unwrap().id, second.id);
        assert_eq!(lib.default_for("products", None).unwrap().unwrap().name, "Shared");

        lib.set_default(&first.id).unwrap();
        assert_eq!(count_defaults(&lib, "products", Some(42)), 1);
        assert_eq!(lib.default_for("products", Some(42)).unwrap().unwrap().id, first.id);

        assert!(lib.clear_default("products", Some(42)).unwrap());
        assert!(lib.default_for("products", Some(42)).unwrap().is_none());
        assert!(!lib.clear_default("products", Some(42)).unwrap());
    }

    #[test]
    fn test_list_is_scoped_to_owner() {
        let store = MemoryStore::new();
        let lib = TemplateLibrary::new(&store);
        lib.create(NewFormTemplate::new("Shared", "products")).unwrap();
        lib.create(NewFormTemplate::new("Mine", "products").owned_by(42))
            .unwrap();
        lib.create(NewFormTemplate::new("Theirs", "products").owned_by(7))
            .unwrap();
        lib.create(NewFormTemplate::new("Sales", "sales")).unwrap();

        let names: Vec<String> = lib
            .list("products", Some(42))
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Shared".to_string()));
        assert!(names.contains(&"Mine".to_string()));
        assert_eq!(lib.list("products", None).unwrap().len(), 1);
    }

    #[test]
    fn test_deactivated_template_is_not_selectable_but_resolves() {
        let store = MemoryStore::new();
        let lib = TemplateLibrary::new(&store);
        let template = lib
            .create(NewFormTemplate::new("Old", "products").as_default())
            .unwrap();

        lib.deactivate(&template.id).unwrap();
        assert!(lib.selectable("products", None).unwrap().is_empty());
        assert!(lib.get(&template.id).unwrap().is_some());
        assert!(lib.default_for("products", None).unwrap().is_none());
        assert!(matches!(
            lib.set_default(&template.id).unwrap_err(),
            FormError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_update_and_delete() {
        let store = MemoryStore::new();
        FieldRegistry::new(&store)
            .create(NewFieldDefinition::new("fabric", "products", "Fabric", FieldType::Text))
            .unwrap();
        let lib = TemplateLibrary::new(&store);
        let template = lib.create(NewFormTemplate::new("Clothing", "products")).unwrap();

        let updated = lib
            .update(
                &template.id,
                FormTemplateUpdate {
                    custom_fields: Some(vec!["fabric".into()]),
                    list_fields: Some(Some(vec!["name".into(), "fabric".into()])),
                    ..FormTemplateUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.custom_fields, vec!["fabric"]);

        lib.delete(&template.id).unwrap();
        assert!(matches!(
            lib.delete(&template.id).unwrap_err(),
            FormError::TemplateNotFound { .. }
        ));
    }
}
