//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (used by anyhow for unhandled errors)
/// - 2: Misuse of shell command (reserved by shells)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// Resource not found (config, store, field, template, rule).
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input or arguments.
    pub const INVALID_INPUT: i32 = 4;

    /// Integrity check failed.
    pub const INTEGRITY_FAILED: i32 = 5;

    /// Submitted values failed validation.
    pub const VALIDATION_FAILED: i32 = 6;
}

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "FORMKIT_LOG";

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "FORMKIT_CONFIG";
