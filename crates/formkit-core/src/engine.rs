//! Form engine facade.
//!
//! Owns a record store and a module catalog and hands out the registry, rule
//! book, value store, template library, module configuration and composer
//! bound to them.

use std::collections::BTreeMap;

use tracing::debug;

use crate::catalog::ModuleCatalog;
use crate::composer::{ResolvedField, TemplateComposer, TemplateSelection};
use crate::dependency::{evaluate, FieldRuntimeState};
use crate::error::Result;
use crate::module_config::ModuleConfig;
use crate::registry::FieldRegistry;
use crate::rules::DependencyRules;
use crate::storage::RecordStore;
use crate::templates::TemplateLibrary;
use crate::types::{FieldDependency, FormField, FormValues, OwnerId};
use crate::validator::{compose, validate_form, ComposedValidator, EntityValidator, ValidationErrors};
use crate::values::{CustomFieldStore, ValueChanges};

/// Outcome of [`FormEngine::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Values passed validation and custom values were stored
    Saved(ValueChanges),
    /// Validation failed; nothing was written
    Rejected(ValidationErrors),
}

impl Submission {
    pub fn is_saved(&self) -> bool {
        matches!(self, Submission::Saved(_))
    }
}

/// Entry point tying the engine components to one store.
pub struct FormEngine<S: RecordStore> {
    store: S,
    catalog: ModuleCatalog,
}

impl<S: RecordStore> FormEngine<S> {
    pub fn new(store: S, catalog: ModuleCatalog) -> Self {
        Self { store, catalog }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn registry(&self) -> FieldRegistry<'_, S> {
        FieldRegistry::new(&self.store)
    }

    pub fn rules(&self) -> DependencyRules<'_, S> {
        DependencyRules::new(&self.store)
    }

    pub fn values(&self) -> CustomFieldStore<'_, S> {
        CustomFieldStore::new(&self.store)
    }

    pub fn templates(&self) -> TemplateLibrary<'_, S> {
        TemplateLibrary::new(&self.store)
    }

    pub fn module_config(&self) -> ModuleConfig<'_, S> {
        ModuleConfig::new(&self.store)
    }

    pub fn composer(&self) -> TemplateComposer<'_, S> {
        TemplateComposer::new(&self.store, &self.catalog)
    }

    /// Resolve the form fields of a module together with the dependency
    /// rules targeting them.
    pub fn form(
        &self,
        module: &str,
        selection: TemplateSelection,
        owner: Option<OwnerId>,
    ) -> Result<(Vec<ResolvedField>, Vec<FieldDependency>)> {
        let fields = self.composer().resolve_fields(module, selection, owner)?;
        let ids: Vec<_> = fields.iter().filter_map(|f| f.definition_id()).collect();
        let dependencies = self.rules().for_fields(&ids)?;
        Ok((fields, dependencies))
    }

    /// Runtime state of every field of a resolved form for the given values.
    pub fn runtime_state(
        &self,
        module: &str,
        selection: TemplateSelection,
        owner: Option<OwnerId>,
        values: &FormValues,
    ) -> Result<BTreeMap<String, FieldRuntimeState>> {
        let (fields, dependencies) = self.form(module, selection, owner)?;
        Ok(evaluate(&fields, &dependencies, values))
    }

    /// Build a validator for a resolved form.
    pub fn validator<B: EntityValidator>(
        &self,
        module: &str,
        selection: TemplateSelection,
        owner: Option<OwnerId>,
        base: B,
    ) -> Result<ComposedValidator<B, ResolvedField>> {
        let (fields, dependencies) = self.form(module, selection, owner)?;
        Ok(compose(base, fields, dependencies))
    }

    /// Validate a submission and, when valid, store its custom field values.
    ///
    /// Only keys of custom fields on the resolved form are written; built-in
    /// attributes go through the caller's own entity write path. Entity type
    /// is the module name.
    pub fn submit<B: EntityValidator + ?Sized>(
        &self,
        module: &str,
        entity_id: &str,
        selection: TemplateSelection,
        owner: Option<OwnerId>,
        base: &B,
        values: &FormValues,
    ) -> Result<Submission> {
        let (fields, dependencies) = self.form(module, selection, owner)?;
        let errors = validate_form(base, &fields, &dependencies, values);
        if !errors.is_empty() {
            debug!(module, entity_id, errors = errors.len(), "submission rejected");
            return Ok(Submission::Rejected(errors));
        }

        let custom: FormValues = fields
            .iter()
            .filter(|field| field.definition_id.is_some())
            .filter_map(|field| {
                values
                    .get(&field.key)
                    .map(|value| (field.key.clone(), value.clone()))
            })
            .collect();
        let changes = self.values().set_values(module, entity_id, &custom)?;
        Ok(Submission::Saved(changes))
    }

    /// Forget every custom value of an entity.
    pub fn delete_entity(&self, module: &str, entity_id: &str) -> Result<usize> {
        self.values().delete_all(module, entity_id)
    }
}
