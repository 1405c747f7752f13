//! Variable scopes and path lookup
//!
//! Scopes are layered lowest to highest precedence: global environment,
//! environment, collection variables, folder variables, request variables,
//! OAuth2 credential variables and runtime variables. Process environment
//! variables only appear under `process.env`.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::interpolate_str;

/// Every variable layer visible to one request
#[derive(Debug, Clone, Default)]
pub struct ScopeLayers {
    pub process_env: IndexMap<String, String>,
    pub global_env: IndexMap<String, Value>,
    pub env: IndexMap<String, Value>,
    pub collection_vars: IndexMap<String, Value>,
    pub folder_vars: IndexMap<String, Value>,
    pub request_vars: IndexMap<String, Value>,
    /// Already nested as `{ "$oauth2": { "<id>": { ... } } }`
    pub oauth2_vars: IndexMap<String, Value>,
    pub runtime_vars: IndexMap<String, Value>,
}

impl ScopeLayers {
    /// `{ "process": { "env": { ... } } }`
    pub fn process_scope(&self) -> Value {
        let env: Map<String, Value> = self
            .process_env
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let mut process = Map::new();
        process.insert("env".to_string(), Value::Object(env));

        let mut root = Map::new();
        root.insert("process".to_string(), Value::Object(process));
        Value::Object(root)
    }

    /// Flatten the layers into one object; later layers overwrite earlier
    /// ones on name collisions. String environment values are resolved
    /// against `process.env` first.
    pub fn combined(&self) -> Value {
        let process = self.process_scope();
        let mut merged = Map::new();

        for (name, value) in self.global_env.iter().chain(self.env.iter()) {
            merged.insert(name.clone(), resolve_against(value, &process));
        }

        let layers = [
            &self.collection_vars,
            &self.folder_vars,
            &self.request_vars,
            &self.oauth2_vars,
            &self.runtime_vars,
        ];
        for layer in layers {
            for (name, value) in layer {
                merged.insert(name.clone(), value.clone());
            }
        }

        // `process` only fills in when no variable already has that name
        if let Value::Object(process) = process {
            for (name, value) in process {
                merged.entry(name).or_insert(value);
            }
        }
        Value::Object(merged)
    }
}

fn resolve_against(value: &Value, scope: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate_str(s, scope)),
        other => other.clone(),
    }
}

/// One step of a variable path
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Split `a.b[0]['c-d']` into segments. Returns `None` for malformed paths.
pub fn parse_path(path: &str) -> Option<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut chars = path.chars().peekable();
    let mut current = String::new();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                if !closed {
                    return None;
                }
                let inner = inner.trim();
                let quoted = inner
                    .strip_prefix('\'')
                    .and_then(|s| s.strip_suffix('\''))
                    .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
                match quoted {
                    Some(key) => segments.push(PathSegment::Key(key.to_string())),
                    None => segments.push(PathSegment::Index(inner.parse().ok()?)),
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(PathSegment::Key(current));
    }
    Some(segments)
}

/// Walk a parsed path through objects and arrays
pub fn walk<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |value, segment| match segment {
        PathSegment::Key(key) => value.as_object()?.get(key),
        PathSegment::Index(i) => value.as_array()?.get(*i),
    })
}

/// Look a name up in a scope object: the nested path first, then a flat key
/// that literally contains dots or brackets
pub fn lookup<'a>(scope: &'a Value, name: &str) -> Option<&'a Value> {
    parse_path(name)
        .and_then(|segments| walk(scope, &segments))
        .or_else(|| scope.as_object()?.get(name))
}

/// Convert a string map into JSON values
pub fn string_layer(map: &IndexMap<String, String>) -> IndexMap<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path("items[0].id").unwrap(),
            vec![
                PathSegment::Key("items".into()),
                PathSegment::Index(0),
                PathSegment::Key("id".into())
            ]
        );
        assert_eq!(
            parse_path("headers['x-id']").unwrap(),
            vec![PathSegment::Key("headers".into()), PathSegment::Key("x-id".into())]
        );
        assert!(parse_path("a[1").is_none());
        assert!(parse_path("a[x]").is_none());
    }

    #[test]
    fn test_nested_before_flat() {
        let scope = json!({
            "user": {"address": {"city": "Berlin"}},
            "user.address.city": "flat",
            "api.key": "k"
        });
        assert_eq!(lookup(&scope, "user.address.city"), Some(&json!("Berlin")));
        assert_eq!(lookup(&scope, "api.key"), Some(&json!("k")));
        assert_eq!(lookup(&scope, "missing.key"), None);
    }

    #[test]
    fn test_precedence() {
        let mut layers = ScopeLayers::default();
        layers.env.insert("host".into(), json!("env"));
        layers.collection_vars.insert("host".into(), json!("collection"));
        layers.request_vars.insert("host".into(), json!("request"));
        assert_eq!(layers.combined()["host"], json!("request"));

        layers.runtime_vars.insert("host".into(), json!("runtime"));
        assert_eq!(layers.combined()["host"], json!("runtime"));
    }

    #[test]
    fn test_env_resolved_against_process_env_only() {
        let mut layers = ScopeLayers::default();
        layers.process_env.insert("TOKEN".into(), "secret".into());
        layers.env.insert("auth".into(), json!("Bearer {{process.env.TOKEN}}"));
        layers.env.insert("other".into(), json!("{{host}}"));
        layers.request_vars.insert("host".into(), json!("h"));

        let combined = layers.combined();
        assert_eq!(combined["auth"], json!("Bearer secret"));
        assert_eq!(combined["other"], json!("{{host}}"));
        assert_eq!(combined["process"]["env"]["TOKEN"], json!("secret"));
        assert!(combined.get("TOKEN").is_none());
    }

    #[test]
    fn test_user_variable_named_process_is_kept() {
        let mut layers = ScopeLayers::default();
        layers.process_env.insert("TOKEN".into(), "secret".into());
        layers.runtime_vars.insert("process".into(), json!("batch-7"));

        assert_eq!(layers.combined()["process"], json!("batch-7"));
    }
}
