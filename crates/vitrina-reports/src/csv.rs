//! Minimal RFC-4180 rendering
//!
//! Fields containing a comma, quote or line break are quoted, with inner
//! quotes doubled. Output uses `\n` line endings.

/// Render one row, escaping fields as needed
pub fn render_row(fields: &[String]) -> String {
    fields.iter().map(|f| escape(f)).collect::<Vec<_>>().join(",")
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
