//! Script execution
//!
//! User scripts run inside QuickJS behind the [`ScriptRuntime`] trait. Two
//! runtimes exist: [`SafeRuntime`] exposes only the scripting API (`bru`,
//! `req`, `res`, `test`, `expect`), while [`DeveloperRuntime`] also provides
//! `require` with crypto, encoding and filesystem modules plus
//! `process.env`.
//!
//! Scripts call back into the engine through a [`ScriptHost`]: variable
//! reads and writes, interpolation and sub-requests. Execution happens on a
//! blocking thread so the host may wait on async work.

mod developer;
mod engine;
pub mod modules;
mod safe;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ResponseSnapshot;
use crate::errors::Result;

pub use developer::DeveloperRuntime;
pub use engine::ScriptLimits;
pub use safe::SafeRuntime;

/// Isolation level for user scripts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SandboxMode {
    #[default]
    Developer,
    Safe,
}

impl std::fmt::Display for SandboxMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxMode::Developer => write!(f, "developer"),
            SandboxMode::Safe => write!(f, "safe"),
        }
    }
}

/// Which script slot is being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptPhase {
    PreRequest,
    PostResponse,
    Tests,
}

/// Request fields visible to, and writable from, a script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestView {
    pub method: String,
    pub url: String,
    pub headers: IndexMap<String, String>,
    pub body: Value,
    pub timeout: Option<u64>,
}

/// Everything a script can read about the request it runs for
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptContext {
    pub phase: ScriptPhase,
    pub request: RequestView,
    pub response: Option<ResponseSnapshot>,
    pub request_name: String,
    pub request_path: String,
    pub collection_name: String,
    pub collection_path: String,
    pub env_name: Option<String>,
    /// Exposed as `process.env` in developer mode only
    pub process_env: IndexMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
}

/// Outcome of one `test(...)` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub description: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Pass
    }
}

/// One captured `console.*` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub level: String,
    pub message: String,
}

/// Jump requested by `bru.setNextRequest`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextRequest {
    Unset,
    /// `setNextRequest(null)`: end the run
    Halt,
    Name(String),
}

/// What a script left behind once it finished
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptOutcome {
    /// Present when the script modified the request
    pub request: Option<RequestView>,
    pub next_request_set: bool,
    pub next_request: Option<String>,
    pub stop_execution: bool,
    pub skip_request: bool,
    pub tests: Vec<TestResult>,
    pub logs: Vec<ConsoleEntry>,
    pub error: Option<String>,
    pub done: bool,
}

impl ScriptOutcome {
    pub fn next_request(&self) -> NextRequest {
        match (&self.next_request_set, &self.next_request) {
            (false, _) => NextRequest::Unset,
            (true, None) => NextRequest::Halt,
            (true, Some(name)) => NextRequest::Name(name.clone()),
        }
    }
}

/// Read-only variable layers reachable from scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VarScope {
    Collection,
    Folder,
    Request,
    GlobalEnv,
    Oauth2,
    Process,
}

/// Engine services available to a running script. Called from a blocking
/// thread.
pub trait ScriptHost: Send + Sync {
    fn runtime_var(&self, name: &str) -> Option<Value>;
    fn set_runtime_var(&self, name: &str, value: Value);
    fn delete_runtime_var(&self, name: &str);
    fn env_var(&self, name: &str) -> Option<Value>;
    fn set_env_var(&self, name: &str, value: Value);
    fn scoped_var(&self, scope: VarScope, name: &str) -> Option<Value>;
    fn interpolate(&self, template: &str) -> String;
    /// Execute another request of the collection and return its response
    fn run_request(&self, path: &str) -> Result<ResponseSnapshot>;
}

/// A sandbox able to execute user scripts
#[async_trait]
pub trait ScriptRuntime: Send + Sync {
    fn mode(&self) -> SandboxMode;

    async fn run_script(
        &self,
        script: &str,
        context: ScriptContext,
        host: Arc<dyn ScriptHost>,
    ) -> Result<ScriptOutcome>;
}

/// Build the runtime for a sandbox mode
pub fn create_runtime(mode: SandboxMode, limits: ScriptLimits) -> Arc<dyn ScriptRuntime> {
    match mode {
        SandboxMode::Safe => Arc::new(SafeRuntime::new(limits)),
        SandboxMode::Developer => Arc::new(DeveloperRuntime::new(limits)),
    }
}

impl ScriptLimits {
    pub fn with_timeout(timeout: Duration) -> Self {
        ScriptLimits {
            timeout,
            ..ScriptLimits::default()
        }
    }
}

/// Emit captured console output under the `script` target
pub(crate) fn forward_logs(request_name: &str, logs: &[ConsoleEntry]) {
    for entry in logs {
        tracing::debug!(target: "script", request = %request_name, level = %entry.level, "{}", entry.message);
    }
}
