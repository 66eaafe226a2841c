//! Output mode routing logic.

/// Output mode determines how results are formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Machine-readable JSON output only
    Json,
    /// Plain `key=value` and tab-separated rows, stable for scripts
    #[default]
    Plain,
    /// Tables and badges for humans
    Pretty,
}

impl OutputMode {
    /// Resolve output mode from flags and environment.
    ///
    /// Routing rules:
    /// 1. `--json` overrides everything
    /// 2. `--format plain` forces plain, `--format table` forces pretty
    /// 3. `TERM=dumb` forces plain
    /// 4. Otherwise pretty on a TTY, plain elsewhere
    pub fn resolve(
        json_flag: bool,
        format_flag: Option<&str>,
        is_tty: bool,
        term_is_dumb: bool,
    ) -> Self {
        if json_flag {
            return Self::Json;
        }

        match format_flag {
            Some("plain") => return Self::Plain,
            Some("table") => return Self::Pretty,
            Some("json") => return Self::Json,
            _ => {}
        }

        if term_is_dumb {
            return Self::Plain;
        }

        if is_tty {
            Self::Pretty
        } else {
            Self::Plain
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }

    pub fn is_pretty(&self) -> bool {
        matches!(self, Self::Pretty)
    }
}
