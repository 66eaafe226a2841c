//! Form template composition.
//!
//! Resolution of a module's form:
//!
//! 1. start from the compiled-in base fields of the module;
//! 2. a selected template with non-empty `base_fields` replaces them;
//! 3. the template's custom fields are appended in stored order;
//! 4. template validation rules are layered on each field;
//! 5. module field configuration (owner row, then global row, then static
//!    default) sets visibility, editability, required and order.
//!
//! A selected template that no longer exists resolves as the default
//! template; callers never see `TemplateNotFound` from here.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::catalog::{DetailGroup, FieldDescriptor, ModuleCatalog};
use crate::dependency::FieldRuntimeState;
use crate::error::{FormError, Result};
use crate::module_config::{resolve, FieldConfig, FieldOverride, ModuleConfig};
use crate::registry::FieldRegistry;
use crate::storage::RecordStore;
use crate::templates::{FormTemplate, TemplateLibrary};
use crate::types::{FieldType, FormField, OwnerId, SelectOption, ValidationRules};

/// Number of list columns when nothing declares them.
pub const DEFAULT_LIST_COLUMNS: usize = 4;

/// Number of detail fields when nothing declares them.
pub const DEFAULT_DETAIL_FIELDS: usize = 8;

/// Where a resolved field comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Base,
    Custom,
}

/// Which template to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateSelection {
    /// The synthetic default: compiled-in base fields only
    #[default]
    Default,
    /// A specific stored template
    Template(Uuid),
    /// The owner's default template, else the shared default, else synthetic
    Preferred,
}

/// The kind of view being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Form,
    List,
    Detail,
}

impl ViewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Form => "form",
            ViewKind::List => "list",
            ViewKind::Detail => "detail",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewKind {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "form" => Ok(ViewKind::Form),
            "list" => Ok(ViewKind::List),
            "detail" => Ok(ViewKind::Detail),
            other => Err(FormError::InvalidInput(format!("Unknown view '{}'", other))),
        }
    }
}

/// One entry of a resolved, ordered field list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedField {
    pub key: String,
    pub label: String,
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    pub validation_rules: ValidationRules,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    pub source: FieldSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<Uuid>,
    pub visible: bool,
    pub editable: bool,
    pub required: bool,
    pub order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl ResolvedField {
    fn from_descriptor(descriptor: &FieldDescriptor) -> Self {
        Self {
            key: descriptor.key.clone(),
            label: descriptor.label.clone(),
            field_type: descriptor.field_type,
            options: descriptor.options.clone(),
            validation_rules: descriptor.validation_rules.clone(),
            default_value: descriptor.default_value.clone(),
            source: FieldSource::Base,
            definition_id: None,
            visible: true,
            editable: descriptor.editable,
            required: descriptor.validation_rules.required,
            order: 0,
            group: descriptor.group.clone(),
        }
    }

    fn apply_config(&mut self, config: FieldConfig) {
        self.visible = config.visible;
        self.editable = config.editable;
        self.required = config.required;
        self.validation_rules.required = config.required;
        self.order = config.order;
    }
}

impl FormField for ResolvedField {
    fn key(&self) -> &str {
        &self.key
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn field_type(&self) -> FieldType {
        self.field_type
    }

    fn options(&self) -> &[SelectOption] {
        &self.options
    }

    fn rules(&self) -> &ValidationRules {
        &self.validation_rules
    }

    fn definition_id(&self) -> Option<Uuid> {
        self.definition_id
    }

    fn static_state(&self) -> FieldRuntimeState {
        FieldRuntimeState {
            visible: self.visible,
            enabled: self.editable,
            required: self.required,
        }
    }
}

/// A titled group of fields within a view. Form and list views have a
/// single untitled group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub fields: Vec<ResolvedField>,
}

/// A resolved view of a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedView {
    pub module: String,
    pub kind: ViewKind,
    /// Stored template the view came from; `None` for the synthetic default
    pub template_id: Option<Uuid>,
    pub groups: Vec<ViewGroup>,
}

impl ResolvedView {
    /// All fields of the view in display order.
    pub fn fields(&self) -> impl Iterator<Item = &ResolvedField> {
        self.groups.iter().flat_map(|group| group.fields.iter())
    }

    pub fn keys(&self) -> Vec<&str> {
        self.fields().map(|field| field.key.as_str()).collect()
    }
}

/// Assembles field lists and views from the catalog, stored templates,
/// custom field definitions and module configuration.
pub struct TemplateComposer<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    catalog: &'a ModuleCatalog,
}

impl<'a, S: RecordStore + ?Sized> TemplateComposer<'a, S> {
    pub fn new(store: &'a S, catalog: &'a ModuleCatalog) -> Self {
        Self { store, catalog }
    }

    /// Pick the stored template to use, if any. Missing or mismatched
    /// templates fall back to the synthetic default.
    pub fn select_template(
        &self,
        module: &str,
        selection: TemplateSelection,
        owner: Option<OwnerId>,
    ) -> Result<Option<FormTemplate>> {
        let library = TemplateLibrary::new(self.store);
        match selection {
            TemplateSelection::Default => Ok(None),
            TemplateSelection::Template(id) => match library.require(&id) {
                Ok(template) if template.module != module => {
                    warn!(template = %id, module, "template belongs to another module, using default");
                    Ok(None)
                }
                Ok(template) if template.owner.is_some() && template.owner != owner => {
                    warn!(template = %id, owner = ?owner, "template belongs to another owner, using default");
                    Ok(None)
                }
                Ok(template) => Ok(Some(template)),
                Err(FormError::TemplateNotFound { .. }) => {
                    warn!(template = %id, module, "template not found, using default");
                    Ok(None)
                }
                Err(e) => Err(e),
            },
            TemplateSelection::Preferred => {
                if owner.is_some() {
                    if let Some(template) = library.default_for(module, owner)? {
                        return Ok(Some(template));
                    }
                }
                library.default_for(module, None)
            }
        }
    }

    /// Ordered form fields for a module.
    pub fn resolve_fields(
        &self,
        module: &str,
        selection: TemplateSelection,
        owner: Option<OwnerId>,
    ) -> Result<Vec<ResolvedField>> {
        let template = self.select_template(module, selection, owner)?;
        self.compose(module, template.as_ref(), owner)
    }

    /// Resolve one view of a module.
    pub fn resolve_view(
        &self,
        module: &str,
        selection: TemplateSelection,
        owner: Option<OwnerId>,
        view: ViewKind,
    ) -> Result<ResolvedView> {
        let template = self.select_template(module, selection, owner)?;
        let fields = self.compose(module, template.as_ref(), owner)?;

        let groups = match view {
            ViewKind::Form => vec![ViewGroup {
                title: None,
                fields,
            }],
            ViewKind::List => vec![ViewGroup {
                title: None,
                fields: self.list_subset(module, template.as_ref(), &fields),
            }],
            ViewKind::Detail => self.detail_groups(module, template.as_ref(), &fields),
        };

        Ok(ResolvedView {
            module: module.to_string(),
            kind: view,
            template_id: template.map(|t| t.id),
            groups,
        })
    }

    fn compose(
        &self,
        module: &str,
        template: Option<&FormTemplate>,
        owner: Option<OwnerId>,
    ) -> Result<Vec<ResolvedField>> {
        let base: &[FieldDescriptor] = match template {
            Some(t) if !t.base_fields.is_empty() => t.base_fields.as_slice(),
            _ => self.catalog.base_fields(module),
        };

        let mut fields: Vec<ResolvedField> = base.iter().map(ResolvedField::from_descriptor).collect();
        let mut seen: HashSet<String> = fields.iter().map(|f| f.key.clone()).collect();

        if let Some(template) = template {
            let registry = FieldRegistry::new(self.store);
            for key in &template.custom_fields {
                let def = match registry.get(key)? {
                    Some(def) if def.is_active && def.in_scope(module, owner) => def,
                    Some(_) => {
                        debug!(field = %key, template = %template.id, "skipping out-of-scope or inactive custom field");
                        continue;
                    }
                    None => {
                        debug!(field = %key, template = %template.id, "skipping unknown custom field");
                        continue;
                    }
                };
                if !seen.insert(def.field_key.clone()) {
                    continue;
                }
                fields.push(ResolvedField {
                    key: def.field_key,
                    label: def.label,
                    field_type: def.field_type,
                    options: def.options,
                    required: def.validation_rules.required,
                    validation_rules: def.validation_rules,
                    default_value: def.default_value,
                    source: FieldSource::Custom,
                    definition_id: Some(def.id),
                    visible: true,
                    editable: true,
                    order: 0,
                    group: None,
                });
            }

            for field in fields.iter_mut() {
                if let Some(extra) = template.validation_rules.get(&field.key) {
                    field.validation_rules = field.validation_rules.overlay(extra);
                    field.required = field.validation_rules.required;
                }
            }
        }

        let overrides: BTreeMap<String, FieldOverride> = ModuleConfig::new(self.store).get(module, owner)?;
        for (position, field) in fields.iter_mut().enumerate() {
            let defaults = FieldConfig {
                visible: true,
                editable: field.editable,
                required: field.required,
                order: position as i32,
            };
            let config = match overrides.get(&field.key) {
                Some(o) => resolve(defaults, o),
                None => defaults,
            };
            field.apply_config(config);
        }

        // sort_by_key is stable, so equal orders keep declared position
        fields.sort_by_key(|field| field.order);
        Ok(fields)
    }

    fn list_subset(
        &self,
        module: &str,
        template: Option<&FormTemplate>,
        fields: &[ResolvedField],
    ) -> Vec<ResolvedField> {
        let declared: Option<&[String]> = template
            .and_then(|t| t.list_fields.as_deref())
            .filter(|keys| !keys.is_empty())
            .or_else(|| {
                self.catalog
                    .schema(module)
                    .map(|schema| schema.list_fields.as_slice())
                    .filter(|keys| !keys.is_empty())
            });

        let picked = declared
            .map(|keys| pick(fields, keys))
            .unwrap_or_default();
        if !picked.is_empty() {
            return picked;
        }
        first_visible(fields, DEFAULT_LIST_COLUMNS)
    }

    fn detail_groups(
        &self,
        module: &str,
        template: Option<&FormTemplate>,
        fields: &[ResolvedField],
    ) -> Vec<ViewGroup> {
        let declared: Option<&[DetailGroup]> = template
            .and_then(|t| t.detail_fields.as_deref())
            .filter(|groups| !groups.is_empty())
            .or_else(|| {
                self.catalog
                    .schema(module)
                    .map(|schema| schema.detail_groups.as_slice())
                    .filter(|groups| !groups.is_empty())
            });

        let groups: Vec<ViewGroup> = declared
            .unwrap_or(&[])
            .iter()
            .map(|group| ViewGroup {
                title: Some(group.title.clone()),
                fields: pick(fields, &group.fields),
            })
            .filter(|group| !group.fields.is_empty())
            .collect();
        if !groups.is_empty() {
            return groups;
        }

        vec![ViewGroup {
            title: None,
            fields: first_visible(fields, DEFAULT_DETAIL_FIELDS),
        }]
    }
}

/// Look up `keys` in the resolved form list, in key order, dropping unknown
/// and invisible fields.
fn pick(fields: &[ResolvedField], keys: &[String]) -> Vec<ResolvedField> {
    keys.iter()
        .filter_map(|key| fields.iter().find(|field| &field.key == key))
        .filter(|field| field.visible)
        .cloned()
        .collect()
}

fn first_visible(fields: &[ResolvedField], count: usize) -> Vec<ResolvedField> {
    fields
        .iter()
        .filter(|field| field.visible)
        .take(count)
        .cloned()
        .collect()
}
