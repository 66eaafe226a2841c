//! Error types for Formkit core operations.
//!
//! Registry, rule, template and value-store errors are caller errors: they
//! point at a programming or data-integrity mistake and are never retried.
//! Field-level validation problems are not errors at all; they are returned
//! as a [`ValidationErrors`](crate::validator::ValidationErrors) value.

use thiserror::Error;

/// Result type alias for Formkit operations.
pub type Result<T> = std::result::Result<T, FormError>;

/// Core error type for Formkit operations.
#[derive(Debug, Error)]
pub enum FormError {
    /// A field definition with this key already exists
    #[error("Duplicate field key: {key}")]
    DuplicateKey { key: String },

    /// Attempt to change the key or type of a field that stored values reference
    #[error("Field '{key}' is referenced by stored values; its {attribute} cannot change")]
    ImmutableField { key: String, attribute: &'static str },

    /// System fields cannot be deactivated or deleted
    #[error("Field '{key}' is a system field and cannot be deactivated or deleted")]
    SystemFieldProtected { key: String },

    /// No active field definition for this key in the requested scope
    #[error("Unknown field: {key}")]
    UnknownField { key: String },

    /// Field still has stored values and was deleted without cascade
    #[error("Field '{key}' still has {count} stored value(s)")]
    FieldInUse { key: String, count: usize },

    /// Form template lookup failed
    #[error("Template not found: {id}")]
    TemplateNotFound { id: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for FormError {
    fn from(err: rusqlite::Error) -> Self {
        FormError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for FormError {
    fn from(err: std::io::Error) -> Self {
        FormError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for FormError {
    fn from(err: serde_json::Error) -> Self {
        FormError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FormError::DuplicateKey {
            key: "warranty".into(),
        };
        assert_eq!(err.to_string(), "Duplicate field key: warranty");
    }

    #[test]
    fn test_immutable_field_names_attribute() {
        let err = FormError::ImmutableField {
            key: "color".into(),
            attribute: "type",
        };
        assert!(err.to_string().contains("color"));
        assert!(err.to_string().contains("type"));
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: FormError = json_err.into();
        assert!(matches!(err, FormError::Serialization(_)));
    }
}
