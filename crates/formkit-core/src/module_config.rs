//! Per-module field configuration.
//!
//! Rows override the compiled-in presentation of a module's base fields:
//! visibility, editability, required and order. An owner's row overrides the
//! global row attribute by attribute, and a missing attribute falls back to
//! the field's static default.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::FieldDescriptor;
use crate::error::{FormError, Result};
use crate::storage::{collections, Batch, RecordFilter, RecordStore, RecordStoreExt};
use crate::types::OwnerId;

/// Optional overrides for one field. `None` means "not customized here".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl FieldOverride {
    /// Attributes set in `other` replace ours.
    pub fn overlay(&self, other: &FieldOverride) -> FieldOverride {
        FieldOverride {
            visible: other.visible.or(self.visible),
            editable: other.editable.or(self.editable),
            required: other.required.or(self.required),
            order: other.order.or(self.order),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == FieldOverride::default()
    }
}

/// One stored configuration row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleFieldConfiguration {
    pub module: String,
    pub field_key: String,
    /// `None` = applies to every owner
    #[serde(default)]
    pub owner: Option<OwnerId>,
    #[serde(flatten)]
    pub overrides: FieldOverride,
    pub updated_at: DateTime<Utc>,
}

/// Fully resolved presentation of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub visible: bool,
    pub editable: bool,
    pub required: bool,
    pub order: i32,
}

fn config_key(module: &str, field_key: &str, owner: Option<OwnerId>) -> String {
    match owner {
        Some(owner) => format!("{}/{}/{}", module, field_key, owner),
        None => format!("{}/{}/*", module, field_key),
    }
}

/// Module field configuration over a record store.
pub struct ModuleConfig<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> ModuleConfig<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Every stored row of a module, global and owner rows alike.
    pub fn rows(&self, module: &str) -> Result<Vec<ModuleFieldConfiguration>> {
        let filter = RecordFilter::new().eq("module", module);
        self.store
            .query_as(collections::MODULE_FIELD_CONFIG, &filter)
    }

    /// Merged overrides for `owner`: owner row over global row, per attribute.
    pub fn get(&self, module: &str, owner: Option<OwnerId>) -> Result<BTreeMap<String, FieldOverride>> {
        let rows = self.rows(module)?;
        let mut merged: BTreeMap<String, FieldOverride> = BTreeMap::new();

        for row in rows.iter().filter(|row| row.owner.is_none()) {
            merged.insert(row.field_key.clone(), row.overrides);
        }
        if owner.is_some() {
            for row in rows.iter().filter(|row| row.owner == owner) {
                let entry = merged.entry(row.field_key.clone()).or_default();
                *entry = entry.overlay(&row.overrides);
            }
        }

        Ok(merged)
    }

    /// Insert or merge a row. Attributes unset in `overrides` keep their
    /// stored values.
    pub fn upsert(
        &self,
        module: &str,
        field_key: &str,
        owner: Option<OwnerId>,
        overrides: FieldOverride,
    ) -> Result<ModuleFieldConfiguration> {
        if module.is_empty() || field_key.is_empty() {
            return Err(FormError::InvalidInput(
                "Module and field key cannot be empty".to_string(),
            ));
        }

        let key = config_key(module, field_key, owner);
        let row = self.store.transact_with(|view| {
            let existing: Option<ModuleFieldConfiguration> =
                view.get_as(collections::MODULE_FIELD_CONFIG, &key)?;
            let merged = existing
                .map(|row| row.overrides.overlay(&overrides))
                .unwrap_or(overrides);

            let row = ModuleFieldConfiguration {
                module: module.to_string(),
                field_key: field_key.to_string(),
                owner,
                overrides: merged,
                updated_at: Utc::now(),
            };
            let mut batch = Batch::new();
            batch.put_record(collections::MODULE_FIELD_CONFIG, key.as_str(), &row)?;
            Ok((batch, row))
        })?;
        debug!(module, field = field_key, owner = ?owner, "upserted module field config");
        Ok(row)
    }

    /// Remove a row. Returns `true` if one existed.
    pub fn clear(&self, module: &str, field_key: &str, owner: Option<OwnerId>) -> Result<bool> {
        let removed = self.store.delete(
            collections::MODULE_FIELD_CONFIG,
            &config_key(module, field_key, owner),
        )?;
        if removed {
            debug!(module, field = field_key, owner = ?owner, "cleared module field config");
        }
        Ok(removed)
    }

    /// Resolved configuration of each base field, keyed by field key.
    ///
    /// Static defaults: visible, editable as declared, required per the
    /// field's rules, ordered by declared position.
    pub fn effective(
        &self,
        module: &str,
        owner: Option<OwnerId>,
        base_fields: &[FieldDescriptor],
    ) -> Result<BTreeMap<String, FieldConfig>> {
        let overrides = self.get(module, owner)?;
        Ok(base_fields
            .iter()
            .enumerate()
            .map(|(position, field)| {
                let defaults = FieldConfig {
                    visible: true,
                    editable: field.editable,
                    required: field.validation_rules.required,
                    order: position as i32,
                };
                let config = match overrides.get(&field.key) {
                    Some(o) => resolve(defaults, o),
                    None => defaults,
                };
                (field.key.clone(), config)
            })
            .collect())
    }
}

/// Apply overrides to static defaults.
pub fn resolve(defaults: FieldConfig, overrides: &FieldOverride) -> FieldConfig {
    FieldConfig {
        visible: overrides.visible.unwrap_or(defaults.visible),
        editable: overrides.editable.unwrap_or(defaults.editable),
        required: overrides.required.unwrap_or(defaults.required),
        order: overrides.order.unwrap_or(defaults.order),
    }
}
