//! Validator composition.
//!
//! A form is validated by a hand-written base validator for its built-in
//! attributes, followed by checks derived from each field's declared type and
//! rules. Runtime state decides what is checked: hidden fields are skipped
//! entirely, disabled but visible fields are still checked, and `required`
//! comes from the evaluated state rather than the static rule.

use std::collections::btree_map::{self, Entry};
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::dependency::{as_number, evaluate, is_empty_value};
use crate::types::{FieldDependency, FieldType, FormField, FormValues};

/// Field key → message. Absence of a key means no error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error unless the key already has one.
    pub fn add(&mut self, key: impl Into<String>, message: impl Into<String>) {
        if let Entry::Vacant(slot) = self.0.entry(key.into()) {
            slot.insert(message.into());
        }
    }

    /// Merge another error map; existing messages are kept.
    pub fn merge(&mut self, other: ValidationErrors) {
        for (key, message) in other.0 {
            self.add(key, message);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl From<BTreeMap<String, String>> for ValidationErrors {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl IntoIterator for ValidationErrors {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Validates a complete value snapshot of one entity.
pub trait EntityValidator {
    fn validate(&self, values: &FormValues) -> ValidationErrors;
}

impl<F> EntityValidator for F
where
    F: Fn(&FormValues) -> ValidationErrors,
{
    fn validate(&self, values: &FormValues) -> ValidationErrors {
        self(values)
    }
}

/// Base validator for entities without hand-written checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBaseValidator;

impl EntityValidator for NoBaseValidator {
    fn validate(&self, _values: &FormValues) -> ValidationErrors {
        ValidationErrors::new()
    }
}

/// A base validator merged with field-derived checks.
///
/// Holds no mutable state; validating the same values twice gives the same
/// result.
pub struct ComposedValidator<B, F> {
    base: B,
    fields: Vec<F>,
    dependencies: Vec<FieldDependency>,
    patterns: HashMap<String, Regex>,
}

/// Combine a base validator with the constraints of `fields`.
pub fn compose<B: EntityValidator, F: FormField>(
    base: B,
    fields: Vec<F>,
    dependencies: Vec<FieldDependency>,
) -> ComposedValidator<B, F> {
    let patterns = compile_patterns(&fields);
    ComposedValidator {
        base,
        fields,
        dependencies,
        patterns,
    }
}

impl<B: EntityValidator, F: FormField> ComposedValidator<B, F> {
    pub fn fields(&self) -> &[F] {
        &self.fields
    }

    pub fn validate(&self, values: &FormValues) -> ValidationErrors {
        let mut errors = self.base.validate(values);
        errors.merge(check_fields(
            &self.fields,
            &self.dependencies,
            &self.patterns,
            values,
        ));
        errors
    }
}

impl<B: EntityValidator, F: FormField> EntityValidator for ComposedValidator<B, F> {
    fn validate(&self, values: &FormValues) -> ValidationErrors {
        ComposedValidator::validate(self, values)
    }
}

/// One-shot validation without building a [`ComposedValidator`].
pub fn validate_form<B: EntityValidator + ?Sized, F: FormField>(
    base: &B,
    fields: &[F],
    dependencies: &[FieldDependency],
    values: &FormValues,
) -> ValidationErrors {
    let patterns = compile_patterns(fields);
    let mut errors = base.validate(values);
    errors.merge(check_fields(fields, dependencies, &patterns, values));
    errors
}

fn compile_patterns<F: FormField>(fields: &[F]) -> HashMap<String, Regex> {
    let mut patterns = HashMap::new();
    for field in fields {
        if !field.field_type().is_textual() {
            continue;
        }
        let Some(pattern) = field.rules().pattern.as_deref() else {
            continue;
        };
        match Regex::new(pattern) {
            Ok(re) => {
                patterns.insert(field.key().to_string(), re);
            }
            Err(e) => {
                warn!(field = field.key(), pattern, error = %e, "skipping invalid validation pattern");
            }
        }
    }
    patterns
}

fn check_fields<F: FormField>(
    fields: &[F],
    dependencies: &[FieldDependency],
    patterns: &HashMap<String, Regex>,
    values: &FormValues,
) -> ValidationErrors {
    let states = evaluate(fields, dependencies, values);
    let mut errors = ValidationErrors::new();

    for field in fields {
        let state = states
            .get(field.key())
            .copied()
            .unwrap_or_else(|| field.static_state());
        if !state.visible {
            continue;
        }

        let value = match values.get(field.key()) {
            Some(value) if !is_empty_value(value) => value,
            _ => {
                if state.required {
                    errors.add(field.key(), format!("{} is required", field.label()));
                }
                continue;
            }
        };

        if let Some(message) = check_value(field, value, patterns.get(field.key())) {
            errors.add(field.key(), message);
        }
    }

    errors
}

/// Type dispatch for a non-empty value.
fn check_value<F: FormField>(field: &F, value: &Value, pattern: Option<&Regex>) -> Option<String> {
    let label = field.label();
    match field.field_type() {
        FieldType::Number => {
            let Some(number) = as_number(value) else {
                return Some(format!("{} must be a number", label));
            };
            let rules = field.rules();
            if let Some(min) = rules.min.filter(|min| number < *min) {
                return Some(format!("{} must be at least {}", label, min));
            }
            if let Some(max) = rules.max.filter(|max| number > *max) {
                return Some(format!("{} must be at most {}", label, max));
            }
            None
        }
        FieldType::Text | FieldType::Textarea => {
            let re = pattern?;
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (!re.is_match(&text)).then(|| format!("{} has an invalid format", label))
        }
        FieldType::Select => {
            let chosen = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let known = field.options().iter().any(|option| option.value == chosen);
            (!known).then(|| format!("{} must be one of the available options", label))
        }
        FieldType::Date => {
            let valid = value.as_str().is_some_and(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
                    || DateTime::parse_from_rfc3339(s).is_ok()
            });
            (!valid).then(|| format!("{} must be a valid date", label))
        }
        FieldType::Boolean => (!value.is_boolean()).then(|| format!("{} must be true or false", label)),
        FieldType::Signature | FieldType::Image => None,
    }
}
