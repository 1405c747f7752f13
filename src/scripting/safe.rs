//! Isolated runtime: the scripting API only

use std::sync::Arc;

use async_trait::async_trait;

use super::engine::{Capabilities, QuickJsEngine, ScriptLimits};
use super::{SandboxMode, ScriptContext, ScriptHost, ScriptOutcome, ScriptRuntime};
use crate::errors::{Result, RunnerError};

/// No filesystem, no `require`, no `process.env`
pub struct SafeRuntime {
    engine: Arc<QuickJsEngine>,
}

impl SafeRuntime {
    pub fn new(limits: ScriptLimits) -> Self {
        SafeRuntime {
            engine: Arc::new(QuickJsEngine::new(limits, Capabilities::Restricted)),
        }
    }
}

#[async_trait]
impl ScriptRuntime for SafeRuntime {
    fn mode(&self) -> SandboxMode {
        SandboxMode::Safe
    }

    async fn run_script(
        &self,
        script: &str,
        mut context: ScriptContext,
        host: Arc<dyn ScriptHost>,
    ) -> Result<ScriptOutcome> {
        context.process_env.clear();
        let engine = self.engine.clone();
        let script = script.to_string();
        tokio::task::spawn_blocking(move || engine.execute(&script, &context, host))
            .await
            .map_err(|e| RunnerError::Script(format!("Script task failed: {}", e)))?
    }
}
