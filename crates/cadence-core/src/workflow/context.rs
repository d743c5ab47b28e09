//! Template resolution against an execution's variable bag.
//!
//! `{{ path }}` placeholders (whitespace inside the braces optional) are
//! replaced with the stringified value at the dotted `path`. Unknown
//! references are left as-is (not an error).

use cadence_types::workflow::Variables;
use serde_json::Value;

use super::condition::{resolve_path, stringify};

/// Replace every resolvable `{{ path }}` placeholder in `template`.
pub fn render_template(template: &str, variables: &Variables) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let path = after_open[..end].trim();
        match resolve_path(variables, path) {
            Some(value) if !path.is_empty() => out.push_str(&stringify(Some(value))),
            _ => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Resolve templates inside a JSON parameter tree.
///
/// A string that is exactly one placeholder is replaced by the raw value so
/// numbers and objects keep their type; other strings are interpolated.
pub fn resolve_params(params: &Value, variables: &Variables) -> Value {
    match params {
        Value::String(s) => {
            if let Some(path) = sole_placeholder(s) {
                if let Some(value) = resolve_path(variables, path) {
                    return value.clone();
                }
            }
            Value::String(render_template(s, variables))
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_params(item, variables))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_params(v, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn sole_placeholder(s: &str) -> Option<&str> {
    let inner = s.trim().strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}
