//! Output formatting helpers for the CLI.
//!
//! JSON shapes for records that need extra context, and table rows for
//! text output.

mod json;
mod text;

pub use json::{field_json, rules_json, validation_json};
pub use text::{
    config_rows, field_rows, resolved_rows, rule_rows, state_rows, template_rows, value_display,
    CONFIG_HEADERS, FIELD_HEADERS, RESOLVED_HEADERS, RULE_HEADERS, STATE_HEADERS, TEMPLATE_HEADERS,
};
