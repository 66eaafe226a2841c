//! Field dependency evaluation.
//!
//! Given the fields of a form, their dependency rules and a snapshot of the
//! current values, compute whether each field is visible, enabled and
//! required. Evaluation is a pure function of its inputs so it can run on
//! every keystroke.
//!
//! Rules are applied in ascending rule-id order and a satisfied rule
//! overwrites whatever an earlier rule set for the same attribute: the last
//! matching rule wins. Conflicting rules are expected (an admin override
//! placed after a general rule) and are not reported.
//!
//! A field targeted by at least one `show` rule starts hidden and a field
//! targeted by an `enable` rule starts disabled; such rules gate the field
//! open only while their condition holds.
//!
//! The controlling value is read straight from the snapshot even when the
//! controlling field is itself hidden. Hidden state does not propagate down
//! dependency chains.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;
use uuid::Uuid;

use crate::types::{ConditionType, DependencyAction, FieldDependency, FormField, FormValues};

/// Computed state of one field after rules are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRuntimeState {
    pub visible: bool,
    pub enabled: bool,
    pub required: bool,
}

/// Evaluate dependency rules against current values.
///
/// Rules whose target is not among `fields` are ignored. The returned map
/// has one entry per field, keyed by field key.
pub fn evaluate<F: FormField>(
    fields: &[F],
    dependencies: &[FieldDependency],
    values: &FormValues,
) -> BTreeMap<String, FieldRuntimeState> {
    let key_by_id: HashMap<Uuid, &str> = fields
        .iter()
        .filter_map(|field| field.definition_id().map(|id| (id, field.key())))
        .collect();

    let mut rules: Vec<&FieldDependency> = dependencies
        .iter()
        .filter(|rule| key_by_id.contains_key(&rule.field_definition_id))
        .collect();
    rules.sort_by_key(|rule| rule.id);

    let gated_visible: HashSet<Uuid> = rules
        .iter()
        .filter(|rule| rule.action == DependencyAction::Show)
        .map(|rule| rule.field_definition_id)
        .collect();
    let gated_enabled: HashSet<Uuid> = rules
        .iter()
        .filter(|rule| rule.action == DependencyAction::Enable)
        .map(|rule| rule.field_definition_id)
        .collect();

    let mut states: BTreeMap<String, FieldRuntimeState> = fields
        .iter()
        .map(|field| {
            let mut state = field.static_state();
            if let Some(id) = field.definition_id() {
                if gated_visible.contains(&id) {
                    state.visible = false;
                }
                if gated_enabled.contains(&id) {
                    state.enabled = false;
                }
            }
            (field.key().to_string(), state)
        })
        .collect();

    for rule in rules {
        let actual = values.get(&rule.depends_on_field_key);
        if !condition_holds(rule.condition_type, actual, &rule.condition_value) {
            continue;
        }

        let Some(key) = key_by_id.get(&rule.field_definition_id) else {
            continue;
        };
        if let Some(state) = states.get_mut(*key) {
            trace!(rule = rule.id, field = %key, action = ?rule.action, "dependency rule applied");
            apply_action(state, rule.action);
        }
    }

    states
}

fn apply_action(state: &mut FieldRuntimeState, action: DependencyAction) {
    match action {
        DependencyAction::Show => state.visible = true,
        DependencyAction::Hide => state.visible = false,
        DependencyAction::Enable => state.enabled = true,
        DependencyAction::Disable => state.enabled = false,
        DependencyAction::SetRequired => state.required = true,
        DependencyAction::SetOptional => state.required = false,
    }
}

/// Evaluate one condition. A missing value behaves like `null`.
pub fn condition_holds(condition: ConditionType, actual: Option<&Value>, expected: &Value) -> bool {
    let actual = actual.unwrap_or(&Value::Null);
    match condition {
        ConditionType::Equals => values_equal(actual, expected),
        ConditionType::NotEquals => !values_equal(actual, expected),
        ConditionType::GreaterThan => match (as_number(actual), as_number(expected)) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        },
        ConditionType::LessThan => match (as_number(actual), as_number(expected)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        },
        ConditionType::Contains => contains(actual, expected),
        ConditionType::In => is_member(actual, expected),
        ConditionType::NotIn => !is_member(actual, expected),
        ConditionType::IsEmpty => is_empty_value(actual),
        ConditionType::IsNotEmpty => !is_empty_value(actual),
    }
}

/// Null, empty string (after trimming) and empty list count as empty.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Numeric view of a value: JSON numbers and numeric strings.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// String view used for non-numeric comparison.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    if actual.is_null() || expected.is_null() {
        return actual.is_null() && expected.is_null();
    }
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return a == b;
    }
    as_text(actual) == as_text(expected)
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        Value::String(haystack) => match as_text(expected) {
            Some(needle) => haystack.contains(&needle),
            None => false,
        },
        _ => false,
    }
}

/// Membership of `actual` in a list condition value. A string condition is
/// read as a comma-separated list. A list actual value is a member when any
/// of its items is.
fn is_member(actual: &Value, expected: &Value) -> bool {
    let candidates: Vec<Value> = match expected {
        Value::Array(items) => items.clone(),
        Value::String(s) => s
            .split(',')
            .map(|part| Value::String(part.trim().to_string()))
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    };

    match actual {
        Value::Null => false,
        Value::Array(items) => items
            .iter()
            .any(|item| candidates.iter().any(|c| values_equal(item, c))),
        value => candidates.iter().any(|c| values_equal(value, c)),
    }
}
