//! UI primitives for the Formkit CLI.
//!
//! - **Context**: environment detection (TTY, color, unicode)
//! - **Mode**: output mode resolution (json, plain, pretty)
//! - **Theme**: badges and text styling
//! - **Render**: tables, receipts, hints, errors

mod context;
mod mode;
pub mod render;
pub mod theme;

pub use context::UiContext;
pub use mode::OutputMode;
pub use theme::Badge;

pub use render::{badge, header, hint, kv, print, print_error, print_json, receipt, table};
