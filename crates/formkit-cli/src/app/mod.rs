//! Application-level utilities for the Formkit CLI.
//!
//! - Application context for unified CLI + config handling
//! - Path resolution for config and store files

mod context;
mod resolver;

pub use context::AppContext;
pub use resolver::resolve_config_path;
