//! Collection and environment documents
//!
//! Collections are read from JSON, YAML or TOML renditions of the in-memory
//! tree. The file extension picks the parser; unknown extensions try YAML
//! (a superset of JSON) and then TOML.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::errors::{Result, RunnerError};

use super::{Collection, EnvVariable, Environment};

/// Maximum collection document size (16 MB)
const MAX_DOCUMENT_SIZE: u64 = 16 * 1024 * 1024;

/// Load a collection document, sort its levels and assign node paths
pub fn load_collection(path: &Path) -> Result<Collection> {
    let mut collection: Collection = load_document(path)?;

    collection.base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    collection.prepare();

    tracing::debug!(
        name = %collection.name,
        nodes = collection.flatten().len(),
        "Collection loaded"
    );

    Ok(collection)
}

/// Environment file: either a named environment or a flat name/value map
#[derive(Deserialize)]
#[serde(untagged)]
enum EnvironmentDocument {
    Named(Environment),
    Flat(IndexMap<String, serde_json::Value>),
}

/// Load an environment from a standalone file. The environment name
/// defaults to the file stem.
pub fn load_environment_file(path: &Path) -> Result<Environment> {
    if !path.exists() {
        return Err(RunnerError::EnvNotFound(path.display().to_string()));
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let env = match load_document::<EnvironmentDocument>(path)? {
        EnvironmentDocument::Named(mut env) => {
            if env.name.is_empty() {
                env.name = stem;
            }
            env
        }
        EnvironmentDocument::Flat(map) => Environment {
            name: stem,
            variables: map
                .into_iter()
                .map(|(name, value)| EnvVariable {
                    name,
                    value,
                    enabled: true,
                    secret: false,
                })
                .collect(),
        },
    };

    Ok(env)
}

fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let metadata = fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RunnerError::PathNotFound(path.display().to_string())
        } else {
            RunnerError::Io(e)
        }
    })?;

    if metadata.len() > MAX_DOCUMENT_SIZE {
        return Err(RunnerError::Collection(format!(
            "{} is too large: {} bytes (max {} bytes)",
            path.display(),
            metadata.len(),
            MAX_DOCUMENT_SIZE
        )));
    }

    let content = fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let parsed = match extension.as_str() {
        "json" => serde_json::from_str(&content).map_err(|e| {
            RunnerError::Collection(format!("Failed to parse JSON {}: {}", path.display(), e))
        })?,
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| {
            RunnerError::Collection(format!("Failed to parse YAML {}: {}", path.display(), e))
        })?,
        "toml" => toml::from_str(&content).map_err(|e| {
            RunnerError::Collection(format!("Failed to parse TOML {}: {}", path.display(), e))
        })?,
        _ => serde_yaml::from_str(&content).or_else(|_| {
            toml::from_str(&content).map_err(|e| {
                RunnerError::Collection(format!("Failed to parse {}: {}", path.display(), e))
            })
        })?,
    };

    Ok(parsed)
}
