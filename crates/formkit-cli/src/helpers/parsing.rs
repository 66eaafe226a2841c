//! Parsing helpers for values, options, groups and template selection.

use std::path::Path;

use serde_json::Value;
use uuid::Uuid;

use formkit_core::{DetailGroup, FieldDescriptor, FormValues, SelectOption, TemplateSelection};

use crate::cli::{FormValuesArgs, SelectionArgs};
use crate::errors::CliError;

/// Parse a command-line value: JSON when it parses, a bare string otherwise.
///
/// `24` is a number, `true` a boolean, `null` null, `["a","b"]` an array and
/// `Acme` the string "Acme".
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parse `KEY=VALUE`.
pub fn parse_assignment(raw: &str) -> anyhow::Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::invalid_input(format!("Expected KEY=VALUE, got '{}'", raw)))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::invalid_input(format!("Missing key in '{}'", raw)).into());
    }
    Ok((key.to_string(), parse_value(value)))
}

/// Collect form values from `--values-file` and then `--set`, later
/// assignments overriding earlier ones.
pub fn read_form_values(args: &FormValuesArgs) -> anyhow::Result<FormValues> {
    let mut values = match args.values_file.as_deref() {
        Some(path) => read_values_file(Path::new(path))?,
        None => FormValues::new(),
    };
    values.extend(parse_assignments(&args.values)?);
    Ok(values)
}

pub fn parse_assignments(raw: &[String]) -> anyhow::Result<FormValues> {
    raw.iter().map(|item| parse_assignment(item)).collect()
}

fn read_values_file(path: &Path) -> anyhow::Result<FormValues> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&contents).map_err(|e| {
        CliError::invalid_input(format!(
            "{} must hold a JSON object of values: {}",
            path.display(),
            e
        ))
        .into()
    })
}

/// Parse a select option `LABEL=VALUE`; a bare word is both label and value.
pub fn parse_option(raw: &str) -> SelectOption {
    match raw.split_once('=') {
        Some((label, value)) => SelectOption::new(label.trim(), value.trim()),
        None => SelectOption::new(raw.trim(), raw.trim()),
    }
}

/// Parse a detail group `TITLE=key1,key2`.
pub fn parse_detail_group(raw: &str) -> anyhow::Result<DetailGroup> {
    let (title, keys) = raw.split_once('=').ok_or_else(|| {
        CliError::invalid_input(format!("Expected TITLE=key1,key2, got '{}'", raw))
    })?;
    let keys: Vec<&str> = keys
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .collect();
    if keys.is_empty() {
        return Err(CliError::invalid_input(format!("Detail group '{}' has no fields", title)).into());
    }
    Ok(DetailGroup::new(title.trim(), &keys))
}

/// Read an array of base field descriptors from a JSON file.
pub fn read_base_fields(path: &str) -> anyhow::Result<Vec<FieldDescriptor>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path, e))?;
    serde_json::from_str(&contents).map_err(|e| {
        CliError::invalid_input(format!("{} must hold an array of base fields: {}", path, e)).into()
    })
}

pub fn parse_template_id(raw: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| CliError::invalid_input(format!("Invalid template id '{}'", raw)).into())
}

/// Turn `--template`/`--preferred` into a selection.
pub fn parse_selection(args: &SelectionArgs) -> anyhow::Result<TemplateSelection> {
    if let Some(raw) = args.template.as_deref() {
        return Ok(TemplateSelection::Template(parse_template_id(raw)?));
    }
    if args.preferred {
        return Ok(TemplateSelection::Preferred);
    }
    Ok(TemplateSelection::Default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("24"), json!(24));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("null"), Value::Null);
        assert_eq!(parse_value("[\"a\",\"b\"]"), json!(["a", "b"]));
        assert_eq!(parse_value("Acme Ltd"), json!("Acme Ltd"));
    }

    #[test]
    fn test_parse_assignment_splits_on_first_equals() {
        let (key, value) = parse_assignment("formula=a=b").expect("parse should succeed");
        assert_eq!(key, "formula");
        assert_eq!(value, json!("a=b"));

        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=5").is_err());
    }

    #[test]
    fn test_parse_option() {
        assert_eq!(parse_option("Small=s"), SelectOption::new("Small", "s"));
        assert_eq!(parse_option("red"), SelectOption::new("red", "red"));
    }

    #[test]
    fn test_parse_detail_group() {
        let group = parse_detail_group("Pricing=price, cost").expect("parse should succeed");
        assert_eq!(group, DetailGroup::new("Pricing", &["price", "cost"]));
        assert!(parse_detail_group("Pricing=").is_err());
        assert!(parse_detail_group("Pricing").is_err());
    }

    #[test]
    fn test_parse_selection() {
        let none = SelectionArgs {
            template: None,
            preferred: false,
        };
        assert_eq!(parse_selection(&none).expect("parse should succeed"), TemplateSelection::Default);

        let preferred = SelectionArgs {
            template: None,
            preferred: true,
        };
        assert_eq!(
            parse_selection(&preferred).expect("parse should succeed"),
            TemplateSelection::Preferred
        );

        let id = Uuid::new_v4();
        let explicit = SelectionArgs {
            template: Some(id.to_string()),
            preferred: false,
        };
        assert_eq!(
            parse_selection(&explicit).expect("parse should succeed"),
            TemplateSelection::Template(id)
        );

        let bad = SelectionArgs {
            template: Some("nope".into()),
            preferred: false,
        };
        assert!(parse_selection(&bad).is_err());
    }

    #[test]
    fn test_read_form_values_overrides_file() {
        let dir = tempfile::tempdir().expect("tempdir should succeed");
        let path = dir.path().join("values.json");
        std::fs::write(&path, r#"{"price": 10, "name": "TV"}"#).expect("write should succeed");

        let args = FormValuesArgs {
            module: "products".into(),
            selection: SelectionArgs {
                template: None,
                preferred: false,
            },
            values: vec!["price=12".into()],
            values_file: Some(path.to_string_lossy().to_string()),
        };
        let values = read_form_values(&args).expect("read should succeed");
        assert_eq!(values["price"], json!(12));
        assert_eq!(values["name"], json!("TV"));
    }
}
