//! Run options

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::report::{Redaction, ReportTargets};
use crate::scripting::{SandboxMode, ScriptLimits};

/// Everything that shapes one collection run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunOptions {
    /// Files and folders to run, relative to the collection root. Empty
    /// runs the whole collection.
    pub call_stack_paths: Vec<String>,
    pub recursive: bool,
    /// Stop at the first failing request
    pub bail: bool,
    /// Pause between requests in milliseconds. Anything other than a
    /// positive number is ignored with a warning.
    pub delay_ms: Option<f64>,
    pub sandbox: SandboxMode,
    /// Only run requests that carry tests or enabled assertions
    pub tests_only: bool,
    pub redaction: Redaction,
    pub env_name: Option<String>,
    pub env_file: Option<PathBuf>,
    /// `name=value` pairs applied over the selected environment
    pub env_overrides: Vec<String>,
    pub global_env_file: Option<PathBuf>,
    pub reports: ReportTargets,
    pub script_timeout_secs: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub insecure: bool,
}

impl RunOptions {
    pub fn script_limits(&self) -> ScriptLimits {
        match self.script_timeout_secs {
            Some(secs) => ScriptLimits::with_timeout(Duration::from_secs(secs)),
            None => ScriptLimits::default(),
        }
    }

    /// The delay to apply, or `Err(())` when one was given but is unusable
    pub(crate) fn delay(&self) -> Result<Option<Duration>, ()> {
        match self.delay_ms {
            None => Ok(None),
            Some(ms) if ms.is_finite() && ms > 0.0 => Duration::try_from_secs_f64(ms / 1000.0)
                .map(Some)
                .map_err(|_| ()),
            Some(_) => Err(()),
        }
    }
}
