//! Rendering primitives for CLI output.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table as ComfyTable};

use super::context::UiContext;
use super::theme::{bold, dim, Badge};

/// Render a title line for a command.
///
/// Pretty mode: "Formkit · command (context)"
/// Plain mode: "formkit command"
pub fn header(ctx: &UiContext, command: &str, context: Option<&str>) -> String {
    if ctx.mode.is_pretty() {
        let title = bold("Formkit", ctx.color);
        match context {
            Some(c) => format!("{} \u{00B7} {} ({})", title, command, c),
            None => format!("{} \u{00B7} {}", title, command),
        }
    } else {
        format!("formkit {}", command)
    }
}

/// Render a badge with optional message.
pub fn badge(ctx: &UiContext, kind: Badge, message: &str) -> String {
    let painted = kind.paint(ctx.unicode, ctx.color);
    if message.is_empty() {
        painted
    } else {
        format!("{} {}", painted, message)
    }
}

/// Render a key-value pair.
///
/// Pretty mode: "Key: value" with dim key
/// Plain mode: "key=value"
pub fn kv(ctx: &UiContext, key: &str, value: &str) -> String {
    if ctx.mode.is_pretty() {
        format!("{} {}", dim(&format!("{}:", key), ctx.color), value)
    } else {
        format!("{}={}", key.to_lowercase().replace(' ', "_"), value)
    }
}

/// Render a hint line.
pub fn hint(ctx: &UiContext, text: &str) -> String {
    if ctx.mode.is_pretty() {
        format!("{} {}", dim("Hint:", ctx.color), text)
    } else {
        format!("hint={}", text)
    }
}

/// Render a receipt (summary block after an action).
///
/// Pretty mode: badge plus indented key-value pairs
/// Plain mode: status=ok plus key=value lines
pub fn receipt(ctx: &UiContext, title: &str, items: &[(&str, String)]) -> String {
    let mut lines = Vec::new();

    if ctx.mode.is_pretty() {
        lines.push(badge(ctx, Badge::Ok, title));
        for (key, value) in items {
            lines.push(format!("  {}", kv(ctx, key, value)));
        }
    } else {
        lines.push("status=ok".to_string());
        for (key, value) in items {
            lines.push(kv(ctx, key, value));
        }
    }

    lines.join("\n")
}

/// Render rows under column headers.
///
/// Pretty mode: bordered table
/// Plain mode: tab-separated values, no header
pub fn table(ctx: &UiContext, headers: &[&str], rows: &[Vec<String>]) -> String {
    if !ctx.mode.is_pretty() {
        return rows
            .iter()
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n");
    }

    let mut table = ComfyTable::new();
    if ctx.unicode {
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS);
    } else {
        table.load_preset(comfy_table::presets::ASCII_MARKDOWN);
    }
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| {
            let cell = Cell::new(h);
            if ctx.color {
                cell.add_attribute(Attribute::Bold)
            } else {
                cell
            }
        })
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    table.to_string()
}

/// Print a message to stdout unless in JSON mode.
pub fn print(ctx: &UiContext, message: &str) {
    if !ctx.mode.is_json() {
        println!("{}", message);
    }
}

/// Print pretty JSON to stdout.
pub fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format an error message with optional hint.
pub fn error_message(ctx: &UiContext, message: &str, error_hint: Option<&str>) -> String {
    let mut lines = Vec::new();

    if ctx.mode.is_pretty() {
        lines.push(badge(ctx, Badge::Err, message));
        if let Some(h) = error_hint {
            lines.push(hint(ctx, h));
        }
    } else {
        lines.push(format!("error={}", message.replace('\n', " ")));
        if let Some(h) = error_hint {
            lines.push(format!("hint={}", h));
        }
    }

    lines.join("\n")
}

/// Print an error message to stderr with optional hint.
pub fn print_error(ctx: &UiContext, message: &str, error_hint: Option<&str>) {
    eprintln!("{}", error_message(ctx, message, error_hint));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::OutputMode;

    fn plain_ctx() -> UiContext {
        UiContext {
            color: false,
            unicode: false,
            mode: OutputMode::Plain,
        }
    }

    fn pretty_ctx() -> UiContext {
        UiContext {
            color: false,
            unicode: true,
            mode: OutputMode::Pretty,
        }
    }

    #[test]
    fn test_header() {
        assert_eq!(header(&plain_ctx(), "resolve", None), "formkit resolve");
        let pretty = header(&pretty_ctx(), "resolve", Some("products"));
        assert!(pretty.contains("Formkit"));
        assert!(pretty.contains("(products)"));
    }

    #[test]
    fn test_kv_plain_normalizes_key() {
        assert_eq!(kv(&plain_ctx(), "Field Key", "warranty"), "field_key=warranty");
        assert_eq!(kv(&pretty_ctx(), "Key", "warranty"), "Key: warranty");
    }

    #[test]
    fn test_receipt_plain() {
        let out = receipt(&plain_ctx(), "Created", &[("key", "warranty".to_string())]);
        assert_eq!(out, "status=ok\nkey=warranty");
    }

    #[test]
    fn test_table_plain_is_tab_separated() {
        let rows = vec![
            vec!["name".to_string(), "text".to_string()],
            vec!["price".to_string(), "number".to_string()],
        ];
        let out = table(&plain_ctx(), &["KEY", "TYPE"], &rows);
        assert_eq!(out, "name\ttext\nprice\tnumber");
    }

    #[test]
    fn test_table_pretty_has_headers() {
        let rows = vec![vec!["name".to_string()]];
        let out = table(&pretty_ctx(), &["KEY"], &rows);
        assert!(out.contains("KEY"));
        assert!(out.contains("name"));
    }

    #[test]
    fn test_error_message_plain_is_single_line() {
        let out = error_message(&plain_ctx(), "No store\nRun init", Some("formkit init"));
        assert_eq!(out, "error=No store Run init\nhint=formkit init");
    }
}
