//! .env file loading
//!
//! A `.env` next to the collection document is merged over the process
//! environment before a run; its values win.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::errors::{Result, RunnerError};

/// Process environment as an ordered map
pub fn process_env() -> IndexMap<String, String> {
    std::env::vars().collect()
}

/// Load `<dir>/.env` over `base`. A missing file leaves `base` unchanged.
pub fn merge_dotenv(base: &mut IndexMap<String, String>, dir: &Path) -> Result<()> {
    let path = dir.join(".env");
    if !path.is_file() {
        return Ok(());
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| RunnerError::Config(format!("Failed to read .env file: {}", e)))?;
    let vars = parse(&content);
    debug!(path = %path.display(), count = vars.len(), "Loaded .env file");
    base.extend(vars);
    Ok(())
}

/// Parse .env content. Lines that are not `KEY=value` are skipped.
pub fn parse(content: &str) -> IndexMap<String, String> {
    let mut vars = IndexMap::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_env_line(line) {
            Some((key, value)) => {
                vars.insert(key, value);
            }
            None => warn!("Ignoring invalid .env line {}: {}", line_num + 1, line),
        }
    }

    vars
}

fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value_part) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }

    let value_part = value_part.trim();
    let value = if value_part.len() >= 2 && value_part.starts_with('"') && value_part.ends_with('"') {
        unescape_double_quoted(&value_part[1..value_part.len() - 1])
    } else if value_part.len() >= 2 && value_part.starts_with('\'') && value_part.ends_with('\'') {
        value_part[1..value_part.len() - 1].to_string()
    } else {
        // Unquoted values stop at an inline comment
        match value_part.find(" #") {
            Some(pos) => value_part[..pos].trim_end().to_string(),
            None => value_part.to_string(),
        }
    };

    Some((key.to_string(), value))
}

fn unescape_double_quoted(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}
