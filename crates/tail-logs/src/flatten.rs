//! Flattening of nested JSON objects into dot-notation string views.
//!
//! Nested object keys are joined with `.`; everything else is a leaf and is
//! rendered by [`stringify`]. Arrays are leaves too: they are rendered whole
//! as compact JSON rather than expanded per index.

use serde_json::{Number, Value};

use crate::types::{FlatView, JsonObject};

/// Flattens a JSON object into a property-name → string-value view.
#[must_use]
pub fn flatten(raw: &JsonObject) -> FlatView {
    let mut out = FlatView::new();
    flatten_into(raw, None, &mut out);
    out
}

fn flatten_into(object: &JsonObject, prefix: Option<&str>, out: &mut FlatView) {
    for (key, value) in object {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(child) => flatten_into(child, Some(&path), out),
            leaf => {
                out.insert(path, stringify(leaf));
            }
        }
    }
}

/// Renders a JSON value as the canonical string used for indexing and search.
///
/// - `null` → empty string
/// - booleans → `true` / `false`
/// - numbers → integers as-is, floats in shortest decimal form, never in
///   scientific notation
/// - strings → verbatim
/// - arrays and objects → compact JSON
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        // f64's Display is shortest round-trip and never uses an exponent.
        n.as_f64().map(|f| f.to_string()).unwrap_or_default()
    }
}
