//! Config file handling

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::errors::{Result, RunnerError};
use crate::pipeline::RunOptions;
use crate::scripting::SandboxMode;

/// Overrides the platform config directory
pub const CONFIG_DIR_ENV: &str = "PULSE_RUNNER_CONFIG_DIR";

/// Defaults applied to every run unless a flag says otherwise
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub sandbox: Option<SandboxMode>,
    /// Milliseconds between requests
    pub delay: Option<f64>,
    pub bail: Option<bool>,
    /// Seconds
    pub script_timeout: Option<u64>,
    /// Milliseconds
    pub request_timeout: Option<u64>,
    pub insecure: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    pub skip_headers: Vec<String>,
    pub skip_all_headers: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
struct ConfigFile {
    defaults: Defaults,
    reporter: ReporterConfig,
}

/// pulse-runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub config_dir: PathBuf,
    pub defaults: Defaults,
    pub reporter: ReporterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: Self::default_config_dir(),
            defaults: Defaults::default(),
            reporter: ReporterConfig::default(),
        }
    }
}

impl Config {
    /// Load `config.toml` from the config directory. A missing file yields
    /// the defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_dir())
    }

    pub fn load_from(config_dir: &Path) -> Result<Self> {
        let config_file = config_dir.join("config.toml");

        if !config_file.exists() {
            return Ok(Self {
                config_dir: config_dir.to_path_buf(),
                ..Self::default()
            });
        }

        let content = std::fs::read_to_string(&config_file)
            .map_err(|e| RunnerError::Config(format!("Failed to read config: {}", e)))?;

        let file: ConfigFile = toml::from_str(&content)
            .map_err(|e| RunnerError::Config(format!("Invalid config TOML: {}", e)))?;
        debug!(path = %config_file.display(), "Loaded config");

        Ok(Self {
            config_dir: config_dir.to_path_buf(),
            defaults: file.defaults,
            reporter: file.reporter,
        })
    }

    /// Seed run options with the configured defaults. Call before applying
    /// command line flags so the flags win.
    pub fn apply_defaults(&self, options: &mut RunOptions) {
        let defaults = &self.defaults;
        if let Some(sandbox) = defaults.sandbox {
            options.sandbox = sandbox;
        }
        if defaults.delay.is_some() {
            options.delay_ms = defaults.delay;
        }
        if let Some(bail) = defaults.bail {
            options.bail = bail;
        }
        if defaults.script_timeout.is_some() {
            options.script_timeout_secs = defaults.script_timeout;
        }
        if defaults.request_timeout.is_some() {
            options.request_timeout_ms = defaults.request_timeout;
        }
        if let Some(insecure) = defaults.insecure {
            options.insecure = insecure;
        }

        options.redaction.skip_all |= self.reporter.skip_all_headers;
        for name in &self.reporter.skip_headers {
            if !options.redaction.skip_names.contains(name) {
                options.redaction.skip_names.push(name.clone());
            }
        }
    }

    /// Get the default config directory
    fn default_config_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return PathBuf::from(dir);
        }
        dirs::config_dir()
            .map(|p| p.join("pulse-runner"))
            .unwrap_or_else(|| PathBuf::from(".pulse-runner"))
    }
}
