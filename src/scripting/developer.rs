//! Full-capability runtime

use std::sync::Arc;

use async_trait::async_trait;

use super::engine::{Capabilities, QuickJsEngine, ScriptLimits};
use super::{SandboxMode, ScriptContext, ScriptHost, ScriptOutcome, ScriptRuntime};
use crate::errors::{Result, RunnerError};

/// Adds `require('crypto' | 'encoding' | 'fs' | './local.js')` and
/// `process.env` on top of the scripting API
pub struct DeveloperRuntime {
    engine: Arc<QuickJsEngine>,
}

impl DeveloperRuntime {
    pub fn new(limits: ScriptLimits) -> Self {
        DeveloperRuntime {
            engine: Arc::new(QuickJsEngine::new(limits, Capabilities::Full)),
        }
    }
}

#[async_trait]
impl ScriptRuntime for DeveloperRuntime {
    fn mode(&self) -> SandboxMode {
        SandboxMode::Developer
    }

    async fn run_script(
        &self,
        script: &str,
        context: ScriptContext,
        host: Arc<dyn ScriptHost>,
    ) -> Result<ScriptOutcome> {
        let engine = self.engine.clone();
        let script = script.to_string();
        tokio::task::spawn_blocking(move || engine.execute(&script, &context, host))
            .await
            .map_err(|e| RunnerError::Script(format!("Script task failed: {}", e)))?
    }
}
