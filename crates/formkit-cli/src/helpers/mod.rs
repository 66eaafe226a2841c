//! Shared helpers for command handlers.

mod parsing;

pub use parsing::{
    parse_assignments, parse_detail_group, parse_option, parse_selection, parse_template_id,
    parse_value, read_base_fields, read_form_values,
};
