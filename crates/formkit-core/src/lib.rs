//! # Formkit Core
//!
//! Field metadata and dynamic form composition for business entities.
//!
//! Every entity of a module carries its compiled-in attributes plus an
//! open-ended set of custom fields defined at runtime. This crate holds the
//! definitions, the conditional rules between fields, the stored values and
//! the templates that decide which fields a form, list or detail view shows.
//!
//! ## Architecture
//!
//! - **types**: field definitions, dependency rules, stored values
//! - **catalog**: compiled-in base fields per module
//! - **registry**: field definition lookup and lifecycle
//! - **dependency**: runtime visibility/enabled/required evaluation
//! - **rules**: dependency rule storage
//! - **values**: entity-attribute-value store for custom fields
//! - **validator**: base validator + field-derived checks
//! - **templates**: stored form templates
//! - **module_config**: per-module presentation overrides
//! - **composer**: ordered field lists and views
//! - **engine**: facade over one store and catalog
//! - **storage**: persistence trait and backends

pub mod catalog;
pub mod composer;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod module_config;
pub mod registry;
pub mod rules;
pub mod storage;
pub mod templates;
pub mod types;
pub mod validator;
pub mod values;

pub use catalog::{DetailGroup, FieldDescriptor, ModuleCatalog, ModuleSchema};
pub use composer::{
    FieldSource, ResolvedField, ResolvedView, TemplateComposer, TemplateSelection, ViewGroup,
    ViewKind,
};
pub use dependency::{evaluate, FieldRuntimeState};
pub use engine::{FormEngine, Submission};
pub use error::{FormError, Result};
pub use module_config::{FieldConfig, FieldOverride, ModuleConfig, ModuleFieldConfiguration};
pub use registry::{DeleteMode, FieldRegistry};
pub use rules::DependencyRules;
pub use storage::{MemoryStore, RecordStore, SqliteStore};
pub use templates::{FormTemplate, FormTemplateUpdate, NewFormTemplate, TemplateLibrary};
pub use types::{
    ConditionType, CustomFieldValue, DependencyAction, FieldDefinition, FieldDefinitionUpdate,
    FieldDependency, FieldType, FormField, FormValues, NewFieldDefinition, NewFieldDependency,
    OwnerId, SelectOption, ValidationRules, GLOBAL_MODULE,
};
pub use validator::{
    compose, validate_form, ComposedValidator, EntityValidator, NoBaseValidator, ValidationErrors,
};
pub use values::{CustomFieldStore, ValueChanges};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
