//! Run context: environment selection and process variables

pub mod dotenv;

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::collection::{load_environment_file, Collection, Environment};
use crate::errors::{Result, RunnerError};

static ENV_OVERRIDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^=]+)=(.*)$").expect("Invalid env override regex"));

/// Folder next to the collection document holding `<name>.json|yaml|yml`
/// environment files
const ENVIRONMENTS_DIR: &str = "environments";

/// The environment a run uses, overrides applied
#[derive(Debug, Clone, Default)]
pub struct SelectedEnvironment {
    pub name: Option<String>,
    pub vars: IndexMap<String, Value>,
}

/// Pick the environment by name or file and apply `name=value` overrides
pub fn select_environment(
    collection: &Collection,
    env_name: Option<&str>,
    env_file: Option<&Path>,
    overrides: &[String],
) -> Result<SelectedEnvironment> {
    let environment = match (env_name, env_file) {
        (Some(_), Some(_)) => return Err(RunnerError::ConflictingEnvOptions),
        (Some(name), None) => Some(find_named(collection, name)?),
        (None, Some(path)) => Some(load_environment_file(path)?),
        (None, None) => None,
    };

    let mut selected = SelectedEnvironment::default();
    if let Some(environment) = environment {
        selected.vars = enabled_vars(&environment);
        selected.name = Some(environment.name);
    }

    for (name, value) in parse_overrides(overrides)? {
        selected.vars.insert(name, Value::String(value));
    }

    Ok(selected)
}

/// Enabled variables of a global environment file, or nothing without one
pub fn load_global_environment(path: Option<&Path>) -> Result<IndexMap<String, Value>> {
    let Some(path) = path else {
        return Ok(IndexMap::new());
    };
    let environment = load_environment_file(path)?;
    Ok(enabled_vars(&environment))
}

fn enabled_vars(environment: &Environment) -> IndexMap<String, Value> {
    environment
        .variables
        .iter()
        .filter(|v| v.enabled)
        .map(|v| (v.name.clone(), v.value.clone()))
        .collect()
}

/// Split `name=value` overrides
pub fn parse_overrides(overrides: &[String]) -> Result<Vec<(String, String)>> {
    overrides
        .iter()
        .map(|raw| {
            let caps = ENV_OVERRIDE_RE
                .captures(raw)
                .ok_or_else(|| RunnerError::MalformedEnvOverride(raw.clone()))?;
            Ok((caps[1].to_string(), caps[2].to_string()))
        })
        .collect()
}

fn find_named(collection: &Collection, name: &str) -> Result<Environment> {
    if let Some(env) = collection.environments.iter().find(|e| e.name == name) {
        return Ok(env.clone());
    }

    let dir = collection.base_dir.join(ENVIRONMENTS_DIR);
    let candidate = ["json", "yaml", "yml"]
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|path: &PathBuf| path.is_file());

    match candidate {
        Some(path) => {
            let mut env = load_environment_file(&path)?;
            env.name = name.to_string();
            Ok(env)
        }
        None => Err(RunnerError::EnvNotFound(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::EnvVariable;
    use serde_json::json;

    fn collection() -> Collection {
        Collection {
            name: "api".into(),
            environments: vec![Environment {
                name: "local".into(),
                variables: vec![
                    EnvVariable {
                        name: "host".into(),
                        value: json!("http://localhost:3000"),
                        enabled: true,
                        secret: false,
                    },
                    EnvVariable {
                        name: "disabled".into(),
                        value: json!("x"),
                        enabled: false,
                        secret: false,
                    },
                ],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_select_named_environment() {
        let selected = select_environment(&collection(), Some("local"), None, &[]).unwrap();
        assert_eq!(selected.name.as_deref(), Some("local"));
        assert_eq!(selected.vars.get("host"), Some(&json!("http://localhost:3000")));
        assert!(!selected.vars.contains_key("disabled"));
    }

    #[test]
    fn test_overrides_apply() {
        let overrides = vec!["host=http://example.test".to_string(), "token=a=b".to_string()];
        let selected = select_environment(&collection(), Some("local"), None, &overrides).unwrap();
        assert_eq!(selected.vars.get("host"), Some(&json!("http://example.test")));
        assert_eq!(selected.vars.get("token"), Some(&json!("a=b")));
    }

    #[test]
    fn test_malformed_override() {
        let err = parse_overrides(&["novalue".to_string()]).unwrap_err();
        assert!(matches!(err, RunnerError::MalformedEnvOverride(raw) if raw == "novalue"));
        let err = parse_overrides(&["=value".to_string()]).unwrap_err();
        assert!(matches!(err, RunnerError::MalformedEnvOverride(_)));
    }

    #[test]
    fn test_missing_environment() {
        let err = select_environment(&collection(), Some("prod"), None, &[]).unwrap_err();
        assert!(matches!(err, RunnerError::EnvNotFound(name) if name == "prod"));
    }

    #[test]
    fn test_env_and_file_conflict() {
        let err = select_environment(&collection(), Some("local"), Some(Path::new("env.json")), &[]).unwrap_err();
        assert!(matches!(err, RunnerError::ConflictingEnvOptions));
    }

    #[test]
    fn test_global_environment_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("global.json");
        std::fs::write(&path, r#"{"tenant": "acme"}"#).unwrap();

        let vars = load_global_environment(Some(&path)).unwrap();
        assert_eq!(vars.get("tenant"), Some(&json!("acme")));
        assert!(load_global_environment(None).unwrap().is_empty());
    }

    #[test]
    fn test_environment_file_in_collection_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("environments")).unwrap();
        std::fs::write(
            dir.path().join("environments/staging.json"),
            r#"{"host": "https://staging.test"}"#,
        )
        .unwrap();

        let mut collection = collection();
        collection.base_dir = dir.path().to_path_buf();
        let selected = select_environment(&collection, Some("staging"), None, &[]).unwrap();
        assert_eq!(selected.name.as_deref(), Some("staging"));
        assert_eq!(selected.vars.get("host"), Some(&json!("https://staging.test")));
    }
}
