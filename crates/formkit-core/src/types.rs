//! Core data model: field definitions, dependency rules and stored values.
//!
//! These records cross the persistence boundary as JSON, so their serde
//! shape is the stable external schema of the engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dependency::FieldRuntimeState;
use crate::error::{FormError, Result};

/// Identifier of a tenant (seller/shop owner).
pub type OwnerId = i64;

/// Snapshot of form values keyed by field key.
pub type FormValues = BTreeMap<String, Value>;

/// Module scope shared by every module.
pub const GLOBAL_MODULE: &str = "global";

/// The type of a field; determines the value shape it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Select,
    Boolean,
    Textarea,
    Signature,
    Image,
}

impl FieldType {
    pub const ALL: [FieldType; 8] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Date,
        FieldType::Select,
        FieldType::Boolean,
        FieldType::Textarea,
        FieldType::Signature,
        FieldType::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Select => "select",
            FieldType::Boolean => "boolean",
            FieldType::Textarea => "textarea",
            FieldType::Signature => "signature",
            FieldType::Image => "image",
        }
    }

    /// Only select fields carry options.
    pub fn has_options(&self) -> bool {
        matches!(self, FieldType::Select)
    }

    /// Types whose values are free text and accept a `pattern` rule.
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Textarea)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self> {
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| FormError::InvalidInput(format!("Unknown field type '{}'", s)))
    }
}

/// A single option of a select field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Declarative constraints attached to a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ValidationRules {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    /// Layer extra rules on top of these. The result is never looser than
    /// either side: `required` can only be switched on, the higher `min` and
    /// the lower `max` win, and our own pattern is kept when both set one.
    pub fn overlay(&self, extra: &ValidationRules) -> ValidationRules {
        ValidationRules {
            required: self.required || extra.required,
            min: tighter(self.min, extra.min, f64::max),
            max: tighter(self.max, extra.max, f64::min),
            pattern: self.pattern.clone().or_else(|| extra.pattern.clone()),
        }
    }
}

fn tighter(ours: Option<f64>, extra: Option<f64>, pick: fn(f64, f64) -> f64) -> Option<f64> {
    match (ours, extra) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

/// Check the structural invariants shared by stored definitions and
/// template base fields.
pub(crate) fn check_field_shape(
    key: &str,
    field_type: FieldType,
    options: &[SelectOption],
    rules: &ValidationRules,
) -> Result<()> {
    if key.is_empty() {
        return Err(FormError::InvalidInput("Field key cannot be empty".to_string()));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(FormError::InvalidInput(format!(
            "Field key '{}' contains invalid characters",
            key
        )));
    }
    if field_type.has_options() && options.is_empty() {
        return Err(FormError::InvalidInput(format!(
            "Select field '{}' requires at least one option",
            key
        )));
    }
    if !field_type.has_options() && !options.is_empty() {
        return Err(FormError::InvalidInput(format!(
            "Field '{}' of type {} cannot have options",
            key, field_type
        )));
    }
    if let (Some(min), Some(max)) = (rules.min, rules.max) {
        if min > max {
            return Err(FormError::InvalidInput(format!(
                "Field '{}' has min {} greater than max {}",
                key, min, max
            )));
        }
    }
    if let Some(ref pattern) = rules.pattern {
        Regex::new(pattern).map_err(|e| {
            FormError::InvalidInput(format!("Field '{}' has invalid pattern: {}", key, e))
        })?;
    }
    Ok(())
}

/// Common read access over anything that can appear in a form: stored
/// definitions, compiled-in descriptors and resolved fields.
pub trait FormField {
    fn key(&self) -> &str;
    fn label(&self) -> &str;
    fn field_type(&self) -> FieldType;
    fn options(&self) -> &[SelectOption];
    fn rules(&self) -> &ValidationRules;

    /// Id of the backing field definition, if this is a custom field.
    fn definition_id(&self) -> Option<Uuid> {
        None
    }

    /// State before any dependency rule runs.
    fn static_state(&self) -> FieldRuntimeState {
        FieldRuntimeState {
            visible: true,
            enabled: true,
            required: self.rules().required,
        }
    }
}

/// A named field available for attachment to entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Unique identifier, referenced by rules and stored values
    pub id: Uuid,

    /// Globally unique, case-sensitive key (e.g., "warranty_months")
    pub field_key: String,

    /// Module name, or "global"
    pub module: String,

    pub label: String,

    pub field_type: FieldType,

    #[serde(default)]
    pub options: Vec<SelectOption>,

    #[serde(default)]
    pub validation_rules: ValidationRules,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,

    #[serde(default)]
    pub is_system_field: bool,

    pub is_active: bool,

    /// `None` = shared across all owners
    #[serde(default)]
    pub owner_scope: Option<OwnerId>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl FieldDefinition {
    /// Whether this definition is visible from `module` for `owner`.
    pub fn in_scope(&self, module: &str, owner: Option<OwnerId>) -> bool {
        let module_ok = self.module == module || self.module == GLOBAL_MODULE;
        let owner_ok = match self.owner_scope {
            None => true,
            Some(scope) => Some(scope) == owner,
        };
        module_ok && owner_ok
    }
}

impl FormField for FieldDefinition {
    fn key(&self) -> &str {
        &self.field_key
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
        Some(self.id)
    }
}

/// Builder for creating new field definitions.
#[derive(Debug, Clone)]
pub struct NewFieldDefinition {
    pub field_key: String,
    pub module: String,
    pub label: String,
    pub field_type: FieldType,
    pub options: Vec<SelectOption>,
    pub validation_rules: ValidationRules,
    pub default_value: Option<Value>,
    pub is_system_field: bool,
    pub owner_scope: Option<OwnerId>,
}

impl NewFieldDefinition {
    pub fn new(
        field_key: impl Into<String>,
        module: impl Into<String>,
        label: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        Self {
            field_key: field_key.into(),
            module: module.into(),
            label: label.into(),
            field_type,
            options: Vec::new(),
            validation_rules: ValidationRules::default(),
            default_value: None,
            is_system_field: false,
            owner_scope: None,
        }
    }

    pub fn with_options(mut self, options: Vec<SelectOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.validation_rules = rules;
        self
    }

    pub fn required(mut self) -> Self {
        self.validation_rules.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system_field = true;
        self
    }

    pub fn owned_by(mut self, owner: OwnerId) -> Self {
        self.owner_scope = Some(owner);
        self
    }
}

/// Partial update of a field definition; `None` leaves an attribute as is.
#[derive(Debug, Clone, Default)]
pub struct FieldDefinitionUpdate {
    pub field_key: Option<String>,
    pub label: Option<String>,
    pub field_type: Option<FieldType>,
    pub options: Option<Vec<SelectOption>>,
    pub validation_rules: Option<ValidationRules>,
    /// `Some(None)` clears the default
    pub default_value: Option<Option<Value>>,
}

/// Condition evaluated against the controlling field's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    In,
    NotIn,
    IsEmpty,
    IsNotEmpty,
}

impl FromStr for ConditionType {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| FormError::InvalidInput(format!("Unknown condition type '{}'", s)))
    }
}

/// What a satisfied rule does to its target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyAction {
    Show,
    Hide,
    Enable,
    Disable,
    SetRequired,
    SetOptional,
}

impl FromStr for DependencyAction {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| FormError::InvalidInput(format!("Unknown dependency action '{}'", s)))
    }
}

/// A conditional rule controlling one field's runtime state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDependency {
    /// Ascending evaluation key
    pub id: u64,

    /// The field whose state is controlled
    pub field_definition_id: Uuid,

    /// The controlling field (base or custom)
    pub depends_on_field_key: String,

    pub condition_type: ConditionType,

    #[serde(default)]
    pub condition_value: Value,

    pub action: DependencyAction,
}

/// Builder for creating new dependency rules.
#[derive(Debug, Clone)]
pub struct NewFieldDependency {
    pub field_definition_id: Uuid,
    pub depends_on_field_key: String,
    pub condition_type: ConditionType,
    pub condition_value: Value,
    pub action: DependencyAction,
}

impl NewFieldDependency {
    pub fn new(
        field_definition_id: Uuid,
        depends_on_field_key: impl Into<String>,
        condition_type: ConditionType,
        condition_value: Value,
        action: DependencyAction,
    ) -> Self {
        Self {
            field_definition_id,
            depends_on_field_key: depends_on_field_key.into(),
            condition_type,
            condition_value,
            action,
        }
    }
}

/// One stored value of one custom field for one entity instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub entity_type: String,
    pub entity_id: String,
    pub field_definition_id: Uuid,
    /// Key at write time, kept for display of orphaned values
    pub field_key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_parse_and_display() {
        for field_type in FieldType::ALL {
            let parsed: FieldType = field_type.as_str().parse().unwrap();
            assert_eq!(parsed, field_type);
        }
        assert!("color".parse::<FieldType>().is_err());
        assert_eq!(FieldType::Textarea.to_string(), "textarea");
    }

    #[test]
    fn test_condition_and_action_parse_snake_case() {
        assert_eq!(
            "greater_than".parse::<ConditionType>().unwrap(),
            ConditionType::GreaterThan
        );
        assert_eq!(
            "set_required".parse::<DependencyAction>().unwrap(),
            DependencyAction::SetRequired
        );
        assert!("maybe".parse::<DependencyAction>().is_err());
    }

    #[test]
    fn test_rules_overlay() {
        let base = ValidationRules {
            required: false,
            min: Some(0.0),
            max: Some(10.0),
            pattern: None,
        };
        let extra = ValidationRules {
            required: true,
            min: None,
            max: Some(5.0),
            pattern: Some("^x".into()),
        };
        let merged = base.overlay(&extra);
        assert!(merged.required);
        assert_eq!(merged.min, Some(0.0));
        assert_eq!(merged.max, Some(5.0));
        assert_eq!(merged.pattern.as_deref(), Some("^x"));
    }

    #[test]
    fn test_rules_overlay_never_relaxes() {
        let definition = ValidationRules {
            required: true,
            min: Some(12.0),
            max: Some(48.0),
            pattern: Some("^[0-9]+$".into()),
        };
        let looser = ValidationRules {
            required: false,
            min: Some(0.0),
            max: Some(100.0),
            pattern: Some(".*".into()),
        };
        let merged = definition.overlay(&looser);
        assert!(merged.required);
        assert_eq!(merged.min, Some(12.0));
        assert_eq!(merged.max, Some(48.0));
        assert_eq!(merged.pattern.as_deref(), Some("^[0-9]+$"));

        let stricter = ValidationRules {
            min: Some(24.0),
            max: Some(36.0),
            ..ValidationRules::default()
        };
        let merged = definition.overlay(&stricter);
        assert_eq!(merged.min, Some(24.0));
        assert_eq!(merged.max, Some(36.0));
    }

    #[test]
    fn test_check_field_shape() {
        let rules = ValidationRules::default();
        assert!(check_field_shape("color", FieldType::Select, &[], &rules).is_err());
        assert!(check_field_shape(
            "color",
            FieldType::Text,
            &[SelectOption::new("Red", "red")],
            &rules
        )
        .is_err());
        assert!(check_field_shape("bad key", FieldType::Text, &[], &rules).is_err());

        let inverted = ValidationRules {
            min: Some(5.0),
            max: Some(1.0),
            ..ValidationRules::default()
        };
        assert!(check_field_shape("qty", FieldType::Number, &[], &inverted).is_err());

        let bad_pattern = ValidationRules {
            pattern: Some("(".into()),
            ..ValidationRules::default()
        };
        assert!(check_field_shape("code", FieldType::Text, &[], &bad_pattern).is_err());

        assert!(check_field_shape(
            "size",
            FieldType::Select,
            &[SelectOption::new("Small", "s")],
            &rules
        )
        .is_ok());
    }

    #[test]
    fn test_definition_scope() {
        let now = Utc::now();
        let mut def = FieldDefinition {
            id: Uuid::new_v4(),
            field_key: "warranty".into(),
            module: "products".into(),
            label: "Warranty".into(),
            field_type: FieldType::Number,
            options: Vec::new(),
            validation_rules: ValidationRules::default(),
            default_value: None,
            is_system_field: false,
            is_active: true,
            owner_scope: None,
            created_at: now,
            updated_at: now,
        };
        assert!(def.in_scope("products", None));
        assert!(def.in_scope("products", Some(7)));
        assert!(!def.in_scope("sales", None));

        def.owner_scope = Some(42);
        assert!(def.in_scope("products", Some(42)));
        assert!(!def.in_scope("products", Some(7)));
        assert!(!def.in_scope("products", None));

        def.module = GLOBAL_MODULE.into();
        assert!(def.in_scope("sales", Some(42)));
    }

    #[test]
    fn test_definition_json_shape() {
        let json = serde_json::json!({
            "id": Uuid::nil(),
            "field_key": "size",
            "module": "products",
            "label": "Size",
            "field_type": "select",
            "options": [{"label": "Small", "value": "s"}],
            "validation_rules": {"required": true},
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        });
        let def: FieldDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(def.field_type, FieldType::Select);
        assert!(def.validation_rules.required);
        assert!(!def.is_system_field);
        assert_eq!(def.owner_scope, None);
    }
}
