//! Placeholder interpolation
//!
//! `{{name}}` placeholders are resolved against a JSON scope object (see
//! [`scope::ScopeLayers::combined`]). Names cannot contain whitespace or
//! braces, so `{{ name }}` stays literal. Unknown names are left unchanged.
//! Resolved values that contain placeholders are expanded recursively; a
//! placeholder whose expansion re-enters itself is replaced by its raw value.

pub mod dynamic;
pub mod request;
pub mod scope;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

pub use request::interpolate_request;
pub use scope::ScopeLayers;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{([^{}\s]+)\}\}").expect("placeholder pattern is valid")
});

/// Maximum nesting of recursive expansion
const MAX_DEPTH: usize = 10;

/// Expansion re-entered a name that is already being expanded
struct Cycle;

/// Output escaping applied to substituted string values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    /// Escape as the inside of a JSON string literal
    JsonString,
}

/// Interpolate a template against a scope
pub fn interpolate_str(template: &str, scope: &Value) -> String {
    expand_top(template, scope, Escape::None)
}

/// Interpolate a JSON document template. Substituted strings are escaped so
/// a value containing quotes keeps the document valid; non-string values are
/// inserted as JSON text.
pub fn interpolate_json(template: &str, scope: &Value) -> String {
    expand_top(template, scope, Escape::JsonString)
}

/// True when the text holds at least one placeholder
pub fn has_placeholders(text: &str) -> bool {
    PLACEHOLDER_RE.is_match(text)
}

fn expand_top(template: &str, scope: &Value, escape: Escape) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }

    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];

            if let Some(generated) = generate_dynamic(name) {
                return escape_value(&generated, escape);
            }

            match scope::lookup(scope, name) {
                None => caps[0].to_string(),
                Some(Value::String(raw)) => {
                    let mut stack = vec![name.to_string()];
                    let expanded = match expand_nested(raw, scope, &mut stack) {
                        Ok(expanded) => expanded,
                        Err(Cycle) => raw.clone(),
                    };
                    escape_value(&expanded, escape)
                }
                Some(other) => other.to_string(),
            }
        })
        .into_owned()
}

fn expand_nested(template: &str, scope: &Value, stack: &mut Vec<String>) -> Result<String, Cycle> {
    if !template.contains("{{") {
        return Ok(template.to_string());
    }
    if stack.len() > MAX_DEPTH {
        return Err(Cycle);
    }

    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&template[last..whole.start()]);
        last = whole.end();

        let name = &caps[1];
        if let Some(generated) = generate_dynamic(name) {
            out.push_str(&generated);
            continue;
        }
        if stack.iter().any(|n| n == name) {
            return Err(Cycle);
        }

        match scope::lookup(scope, name) {
            None => out.push_str(whole.as_str()),
            Some(Value::String(raw)) => {
                stack.push(name.to_string());
                let expanded = expand_nested(raw, scope, stack)?;
                stack.pop();
                out.push_str(&expanded);
            }
            Some(other) => out.push_str(&other.to_string()),
        }
    }

    out.push_str(&template[last..]);
    Ok(out)
}

fn generate_dynamic(name: &str) -> Option<String> {
    name.strip_prefix(dynamic::DYNAMIC_PREFIX)
        .and_then(dynamic::generate)
}

fn escape_value(value: &str, escape: Escape) -> String {
    match escape {
        Escape::None => value.to_string(),
        Escape::JsonString => {
            let quoted = Value::String(value.to_string()).to_string();
            quoted[1..quoted.len() - 1].to_string()
        }
    }
}
