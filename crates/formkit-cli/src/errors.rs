//! CLI error types for structured error handling.
//!
//! Typed errors map to specific exit codes. Core errors reaching `main`
//! through `anyhow` are classified the same way.

use std::fmt;

use formkit_core::FormError;

use crate::constants::exit_codes;

/// CLI-specific errors with associated exit codes.
#[derive(Debug)]
pub enum CliError {
    /// Resource not found (config, store, field, template)
    NotFound { message: String, hint: String },

    /// Invalid user input
    InvalidInput(String),

    /// Submitted values failed validation; the errors were already printed
    ValidationFailed { count: usize },

    /// Store integrity check failed
    IntegrityFailed(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::NotFound { message, hint } => write!(f, "{}\n{}", message, hint),
            CliError::InvalidInput(message) => write!(f, "{}", message),
            CliError::ValidationFailed { count } => {
                write!(f, "Validation failed with {} error(s)", count)
            }
            CliError::IntegrityFailed(message) => write!(f, "Integrity check failed: {}", message),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Create a NotFound error with message and hint.
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput(message.into())
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::InvalidInput(_) => exit_codes::INVALID_INPUT,
            CliError::ValidationFailed { .. } => exit_codes::VALIDATION_FAILED,
            CliError::IntegrityFailed(_) => exit_codes::INTEGRITY_FAILED,
        }
    }
}

/// Exit code for any error bubbling up to `main`.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return cli_err.exit_code();
    }
    match err.downcast_ref::<FormError>() {
        Some(
            FormError::UnknownField { .. }
            | FormError::TemplateNotFound { .. }
            | FormError::NotFound(_),
        ) => exit_codes::NOT_FOUND,
        Some(
            FormError::DuplicateKey { .. }
            | FormError::ImmutableField { .. }
            | FormError::SystemFieldProtected { .. }
            | FormError::FieldInUse { .. }
            | FormError::InvalidInput(_),
        ) => exit_codes::INVALID_INPUT,
        _ => 1,
    }
}

/// Contextual hint for common core errors.
pub fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    match err.downcast_ref::<FormError>()? {
        FormError::UnknownField { .. } => Some("Run `formkit field list` to see defined fields."),
        FormError::TemplateNotFound { .. } => {
            Some("Run `formkit template list --module <MODULE>` to find template ids.")
        }
        FormError::FieldInUse { .. } => {
            Some("Use `--cascade` to delete the stored values too, or deactivate the field instead.")
        }
        FormError::ImmutableField { .. } => {
            Some("Create a new field instead, or delete the stored values first.")
        }
        FormError::DuplicateKey { .. } => Some("Field keys are unique across every module."),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_exit_codes() {
        let missing = anyhow::Error::new(FormError::UnknownField {
            key: "warranty".into(),
        });
        assert_eq!(exit_code_for(&missing), exit_codes::NOT_FOUND);
        assert!(hint_for(&missing).is_some());

        let duplicate = anyhow::Error::new(FormError::DuplicateKey {
            key: "warranty".into(),
        });
        assert_eq!(exit_code_for(&duplicate), exit_codes::INVALID_INPUT);

        let storage = anyhow::Error::new(FormError::Storage("disk".into()));
        assert_eq!(exit_code_for(&storage), 1);
        assert!(hint_for(&storage).is_none());
    }

    #[test]
    fn test_cli_errors_keep_their_code() {
        let err = anyhow::Error::new(CliError::ValidationFailed { count: 2 });
        assert_eq!(exit_code_for(&err), exit_codes::VALIDATION_FAILED);
        assert_eq!(err.to_string(), "Validation failed with 2 error(s)");

        let err = anyhow::Error::new(CliError::not_found("No store", "Run init"));
        assert_eq!(exit_code_for(&err), exit_codes::NOT_FOUND);
    }
}
