//! Compiled-in base fields per module.
//!
//! Each business module ships a fixed list of built-in attributes. The
//! synthetic "default" form template of a module is exactly this list.
//! Consumers build a [`ModuleCatalog`] once at startup; [`ModuleCatalog::retail`]
//! is the preset for the retail/business modules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::{check_field_shape, FieldType, FormField, SelectOption, ValidationRules};

/// A base field descriptor: compiled-in, or declared by a template's
/// `base_fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub key: String,
    pub label: String,
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(default)]
    pub validation_rules: ValidationRules,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Detail-view group name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default = "default_true")]
    pub editable: bool,
}

fn default_true() -> bool {
    true
}

impl FieldDescriptor {
    pub fn new(key: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type,
            options: Vec::new(),
            validation_rules: ValidationRules::default(),
            default_value: None,
            group: None,
            editable: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.validation_rules.required = true;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.validation_rules.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.validation_rules.max = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.validation_rules.pattern = Some(pattern.into());
        self
    }

    pub fn options(mut self, options: &[(&str, &str)]) -> Self {
        self.options = options
            .iter()
            .map(|(label, value)| SelectOption::new(*label, *value))
            .collect();
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    /// Check key, options and rule invariants.
    pub fn validate(&self) -> Result<()> {
        check_field_shape(
            &self.key,
            self.field_type,
            &self.options,
            &self.validation_rules,
        )
    }
}

impl FormField for FieldDescriptor {
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
}

/// A named group of field keys for detail views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailGroup {
    pub title: String,
    pub fields: Vec<String>,
}

impl DetailGroup {
    pub fn new(title: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            title: title.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Compiled-in schema of one module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSchema {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    /// Default list columns; empty means "first few fields"
    pub list_fields: Vec<String>,
    /// Default detail groups; empty means "first few fields"
    pub detail_groups: Vec<DetailGroup>,
}

impl ModuleSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            list_fields: Vec::new(),
            detail_groups: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn list_fields(mut self, keys: &[&str]) -> Self {
        self.list_fields = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn detail_group(mut self, title: impl Into<String>, keys: &[&str]) -> Self {
        self.detail_groups.push(DetailGroup::new(title, keys));
        self
    }
}

/// All compiled-in module schemas, keyed by module name.
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    modules: BTreeMap<String, ModuleSchema>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a module schema.
    pub fn module(mut self, schema: ModuleSchema) -> Self {
        self.modules.insert(schema.name.clone(), schema);
        self
    }

    pub fn schema(&self, module: &str) -> Option<&ModuleSchema> {
        self.modules.get(module)
    }

    /// Compiled-in base fields of a module; empty for unknown modules.
    pub fn base_fields(&self, module: &str) -> &[FieldDescriptor] {
        self.modules
            .get(module)
            .map(|schema| schema.fields.as_slice())
            .unwrap_or(&[])
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Preset for the retail/business-management modules.
    pub fn retail() -> Self {
        use FieldType::*;

        let payment_methods = [
            ("Cash", "cash"),
            ("Card", "card"),
            ("Bank transfer", "bank_transfer"),
            ("Credit", "credit"),
        ];

        Self::new()
            .module(
                ModuleSchema::new("products")
                    .field(FieldDescriptor::new("name", "Name", Text).required())
                    .field(FieldDescriptor::new("sku", "SKU", Text).pattern("^[A-Za-z0-9-]+$"))
                    .field(FieldDescriptor::new("category", "Category", Text))
                    .field(FieldDescriptor::new("price", "Price", Number).required().min(0.0))
                    .field(FieldDescriptor::new("cost", "Cost", Number).min(0.0).group("Pricing"))
                    .field(FieldDescriptor::new("quantity", "Stock quantity", Number).min(0.0))
                    .field(FieldDescriptor::new("barcode", "Barcode", Text).group("Inventory"))
                    .field(FieldDescriptor::new("description", "Description", Textarea))
                    .field(FieldDescriptor::new("image", "Image", Image))
                    .list_fields(&["name", "sku", "price", "quantity"])
                    .detail_group("General", &["name", "sku", "category", "description"])
                    .detail_group("Pricing", &["price", "cost"])
                    .detail_group("Inventory", &["quantity", "barcode"]),
            )
            .module(
                ModuleSchema::new("customers")
                    .field(FieldDescriptor::new("name", "Name", Text).required())
                    .field(FieldDescriptor::new("phone", "Phone", Text).pattern(r"^\+?[0-9 ()-]{6,}$"))
                    .field(FieldDescriptor::new("email", "Email", Text).pattern(r"^[^@\s]+@[^@\s]+$"))
                    .field(FieldDescriptor::new("address", "Address", Textarea))
                    .field(FieldDescriptor::new("credit_limit", "Credit limit", Number).min(0.0))
                    .field(FieldDescriptor::new("notes", "Notes", Textarea))
                    .list_fields(&["name", "phone", "email"]),
            )
            .module(
                ModuleSchema::new("suppliers")
                    .field(FieldDescriptor::new("name", "Name", Text).required())
                    .field(FieldDescriptor::new("contact_person", "Contact person", Text))
                    .field(FieldDescriptor::new("phone", "Phone", Text))
                    .field(FieldDescriptor::new("email", "Email", Text).pattern(r"^[^@\s]+@[^@\s]+$"))
                    .field(FieldDescriptor::new("address", "Address", Textarea))
                    .list_fields(&["name", "contact_person", "phone"]),
            )
            .module(
                ModuleSchema::new("employees")
                    .field(FieldDescriptor::new("name", "Name", Text).required())
                    .field(FieldDescriptor::new("role", "Role", Select).options(&[
                        ("Cashier", "cashier"),
                        ("Manager", "manager"),
                        ("Stock keeper", "stock_keeper"),
                    ]))
                    .field(FieldDescriptor::new("phone", "Phone", Text))
                    .field(FieldDescriptor::new("salary", "Salary", Number).min(0.0))
                    .field(FieldDescriptor::new("hired_on", "Hired on", Date))
                    .field(FieldDescriptor::new("active", "Active", Boolean).default_value(Value::Bool(true)))
                    .list_fields(&["name", "role", "phone"]),
            )
            .module(
                ModuleSchema::new("sales")
                    .field(FieldDescriptor::new("title", "Title", Text).required())
                    .field(FieldDescriptor::new("customer", "Customer", Text))
                    .field(FieldDescriptor::new("date", "Date", Date).required())
                    .field(FieldDescriptor::new("total", "Total", Number).required().min(0.0))
                    .field(FieldDescriptor::new("discount", "Discount", Number).min(0.0))
                    .field(FieldDescriptor::new("payment_method", "Payment method", Select).options(&payment_methods))
                    .field(FieldDescriptor::new("status", "Status", Select).options(&[
                        ("Draft", "draft"),
                        ("Completed", "completed"),
                        ("Refunded", "refunded"),
                    ]))
                    .field(FieldDescriptor::new("notes", "Notes", Textarea))
                    .field(FieldDescriptor::new("signature", "Customer signature", Signature))
                    .list_fields(&["title", "customer", "date", "total"]),
            )
            .module(
                ModuleSchema::new("purchases")
                    .field(FieldDescriptor::new("title", "Title", Text).required())
                    .field(FieldDescriptor::new("supplier", "Supplier", Text))
                    .field(FieldDescriptor::new("date", "Date", Date).required())
                    .field(FieldDescriptor::new("total", "Total", Number).required().min(0.0))
                    .field(FieldDescriptor::new("payment_method", "Payment method", Select).options(&payment_methods))
                    .field(FieldDescriptor::new("invoice", "Invoice", Image))
                    .field(FieldDescriptor::new("notes", "Notes", Textarea))
                    .list_fields(&["title", "supplier", "date", "total"]),
            )
            .module(
                ModuleSchema::new("expenses")
                    .field(FieldDescriptor::new("title", "Title", Text).required())
                    .field(FieldDescriptor::new("category", "Category", Text))
                    .field(FieldDescriptor::new("amount", "Amount", Number).required().min(0.0))
                    .field(FieldDescriptor::new("date", "Date", Date).required())
                    .field(FieldDescriptor::new("receipt", "Receipt", Image))
                    .field(FieldDescriptor::new("notes", "Notes", Textarea))
                    .list_fields(&["title", "category", "amount", "date"]),
            )
            .module(
                ModuleSchema::new("income")
                    .field(FieldDescriptor::new("title", "Title", Text).required())
                    .field(FieldDescriptor::new("source", "Source", Text))
                    .field(FieldDescriptor::new("amount", "Amount", Number).required().min(0.0))
                    .field(FieldDescriptor::new("date", "Date", Date).required())
                    .field(FieldDescriptor::new("notes", "Notes", Textarea))
                    .list_fields(&["title", "source", "amount", "date"]),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retail_preset_is_well_formed() {
        let catalog = ModuleCatalog::retail();
        let names: Vec<_> = catalog.module_names().collect();
        assert!(names.contains(&"products"));
        assert!(names.contains(&"sales"));

        for name in names {
            let schema = catalog.schema(name).unwrap();
            for field in &schema.fields {
                field.validate().unwrap();
            }
            let keys: Vec<_> = schema.fields.iter().map(|f| f.key.as_str()).collect();
            for key in &schema.list_fields {
                assert!(keys.contains(&key.as_str()), "{}: unknown list field {}", name, key);
            }
            for group in &schema.detail_groups {
                for key in &group.fields {
                    assert!(keys.contains(&key.as_str()), "{}: unknown detail field {}", name, key);
                }
            }
        }
    }

    #[test]
    fn test_unknown_module_has_no_base_fields() {
        let catalog = ModuleCatalog::retail();
        assert!(catalog.base_fields("reports").is_empty());
        assert_eq!(catalog.base_fields("products")[0].key, "name");
    }

    #[test]
    fn test_descriptor_json_defaults() {
        let json = serde_json::json!({"key": "color", "label": "Color", "field_type": "text"});
        let descriptor: FieldDescriptor = serde_json::from_value(json).unwrap();
        assert!(descriptor.editable);
        assert!(descriptor.options.is_empty());
        assert!(!descriptor.validation_rules.required);
    }
}
