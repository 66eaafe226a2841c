//! Badges and text styling.

use owo_colors::OwoColorize;

/// Badge types for status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Ok,
    Warn,
    Err,
    Info,
}

impl Badge {
    /// Badge with symbol for display.
    pub fn display(&self, unicode: bool) -> &'static str {
        match (self, unicode) {
            (Self::Ok, true) => "[\u{2713}]",
            (Self::Ok, false) => "[OK]",
            (Self::Warn, true) => "[\u{26A0}]",
            (Self::Warn, false) => "[WARN]",
            (Self::Err, true) => "[\u{2717}]",
            (Self::Err, false) => "[ERR]",
            (Self::Info, true) => "[\u{2139}]",
            (Self::Info, false) => "[INFO]",
        }
    }

    /// Badge text colored for its kind.
    pub fn paint(&self, unicode: bool, color: bool) -> String {
        let text = self.display(unicode);
        if !color {
            return text.to_string();
        }
        match self {
            Self::Ok => text.green().to_string(),
            Self::Warn => text.yellow().to_string(),
            Self::Err => text.red().to_string(),
            Self::Info => text.cyan().to_string(),
        }
    }
}

/// Dim text (labels, metadata).
pub fn dim(text: &str, color: bool) -> String {
    if color {
        text.dimmed().to_string()
    } else {
        text.to_string()
    }
}

/// Bold text (titles).
pub fn bold(text: &str, color: bool) -> String {
    if color {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}
