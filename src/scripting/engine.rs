//! QuickJS execution shared by both sandbox runtimes

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rquickjs::{Context, Ctx, Function, Runtime};
use serde_json::{json, Value};

use super::{modules, ScriptContext, ScriptHost, ScriptOutcome, VarScope};
use crate::errors::{Result, RunnerError};

const PRELUDE: &str = include_str!("prelude.js");
const DEVELOPER_PRELUDE: &str = include_str!("developer.js");

/// Resource limits applied to every script execution
#[derive(Debug, Clone, Copy)]
pub struct ScriptLimits {
    pub memory_bytes: usize,
    pub stack_bytes: usize,
    pub timeout: Duration,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        ScriptLimits {
            memory_bytes: 64 * 1024 * 1024,
            stack_bytes: 1024 * 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

/// What a script may reach beyond the scripting API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Capabilities {
    Restricted,
    Full,
}

pub(crate) struct QuickJsEngine {
    limits: ScriptLimits,
    capabilities: Capabilities,
}

impl QuickJsEngine {
    pub(crate) fn new(limits: ScriptLimits, capabilities: Capabilities) -> Self {
        QuickJsEngine {
            limits,
            capabilities,
        }
    }

    /// Run one script to completion on the current (blocking) thread. A
    /// fresh runtime is created per call, so nothing leaks between scripts.
    pub(crate) fn execute(
        &self,
        script: &str,
        context: &ScriptContext,
        host: Arc<dyn ScriptHost>,
    ) -> Result<ScriptOutcome> {
        let runtime = Runtime::new()?;
        runtime.set_memory_limit(self.limits.memory_bytes);
        runtime.set_max_stack_size(self.limits.stack_bytes);

        let timed_out = Arc::new(AtomicBool::new(false));
        let deadline = Instant::now() + self.limits.timeout;
        {
            let timed_out = timed_out.clone();
            runtime.set_interrupt_handler(Some(Box::new(move || {
                if Instant::now() >= deadline {
                    timed_out.store(true, Ordering::SeqCst);
                    true
                } else {
                    false
                }
            })));
        }

        let js = Context::full(&runtime)?;
        let context_json = serde_json::to_string(context)?;
        let base_dir = PathBuf::from(&context.collection_path);
        let source = wrap_user_script(script);

        let started = js.with(|ctx| -> Result<()> {
            let globals = ctx.globals();
            globals.set("__contextJson", context_json)?;

            let dispatch_host = host.clone();
            let host_call = Function::new(ctx.clone(), move |op: String, args: String| -> String {
                dispatch(dispatch_host.as_ref(), &op, &args)
            })?;
            globals.set("__host_call", host_call)?;

            modules::encoding::register(&ctx)?;
            if self.capabilities == Capabilities::Full {
                modules::crypto::register(&ctx)?;
                modules::fs::register(&ctx, base_dir.clone())?;
            }

            eval(&ctx, PRELUDE)?;
            if self.capabilities == Capabilities::Full {
                eval(&ctx, DEVELOPER_PRELUDE)?;
            }
            eval(&ctx, &source)
        });

        if let Err(e) = started {
            if timed_out.load(Ordering::SeqCst) {
                return Err(self.timeout_error());
            }
            return Err(e);
        }

        while runtime.is_job_pending() {
            match runtime.execute_pending_job() {
                Ok(_) => {}
                Err(_) if timed_out.load(Ordering::SeqCst) => break,
                Err(_) => tracing::debug!("Script job raised an unhandled exception"),
            }
        }

        // Reading the outcome must not trip the deadline
        runtime.set_interrupt_handler(None);

        let raw: String = js.with(|ctx| {
            ctx.eval::<String, _>("JSON.stringify(globalThis.__outcome)")
                .map_err(|e| script_error(&ctx, e))
        })?;
        let mut outcome: ScriptOutcome = serde_json::from_str(&raw)?;

        if timed_out.load(Ordering::SeqCst) {
            outcome.error = Some(self.timeout_error().to_string());
        } else if !outcome.done && outcome.error.is_none() {
            outcome.error = Some("Script finished with an unresolved promise".to_string());
        }

        Ok(outcome)
    }

    fn timeout_error(&self) -> RunnerError {
        RunnerError::Script(format!(
            "Script execution timed out after {} ms",
            self.limits.timeout.as_millis()
        ))
    }
}

/// Wrap a user script so top-level `await` works and every completion,
/// including a thrown error, is recorded on the outcome
fn wrap_user_script(script: &str) -> String {
    format!(
        "(async () => {{\n{}\n}})().then(\n  () => __finish(null),\n  (e) => __finish(e)\n);",
        script
    )
}

fn eval(ctx: &Ctx<'_>, source: &str) -> Result<()> {
    ctx.eval::<rquickjs::Value, _>(source)
        .map(|_| ())
        .map_err(|e| script_error(ctx, e))
}

/// Turn a QuickJS error into a script error carrying the thrown message
fn script_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> RunnerError {
    if !matches!(err, rquickjs::Error::Exception) {
        return err.into();
    }

    let caught = ctx.catch();
    if let Some(exception) = caught.as_exception() {
        let message = exception.message().unwrap_or_else(|| "unknown exception".to_string());
        return match exception.stack() {
            Some(stack) if !stack.is_empty() => {
                RunnerError::Script(format!("{}\n{}", message, stack.trim_end()))
            }
            _ => RunnerError::Script(message),
        };
    }
    if let Some(text) = caught.as_string().and_then(|s| s.to_string().ok()) {
        return RunnerError::Script(text);
    }
    RunnerError::Script("Script threw a non-error value".to_string())
}

/// Handle one `__host_call(op, json)` from the prelude. The reply is a
/// JSON envelope: `{"ok": value}`, `{}` for undefined, or `{"error": msg}`.
fn dispatch(host: &dyn ScriptHost, op: &str, args: &str) -> String {
    let args: Value = serde_json::from_str(args).unwrap_or(Value::Null);
    let name = args.get("name").and_then(Value::as_str).unwrap_or_default();
    let value = args.get("value").cloned().unwrap_or(Value::Null);

    let reply: std::result::Result<Option<Value>, String> = match op {
        "getVar" => Ok(host.runtime_var(name)),
        "setVar" => {
            host.set_runtime_var(name, value);
            Ok(None)
        }
        "hasVar" => Ok(Some(Value::Bool(host.runtime_var(name).is_some()))),
        "deleteVar" => {
            host.delete_runtime_var(name);
            Ok(None)
        }
        "getEnvVar" => Ok(host.env_var(name)),
        "setEnvVar" => {
            host.set_env_var(name, value);
            Ok(None)
        }
        "getScopedVar" => match args.get("scope").cloned().map(serde_json::from_value::<VarScope>) {
            Some(Ok(scope)) => Ok(host.scoped_var(scope, name)),
            _ => Err("Unknown variable scope".to_string()),
        },
        "interpolate" => match args.get("template") {
            Some(Value::String(template)) => Ok(Some(Value::String(host.interpolate(template)))),
            Some(other) => Ok(Some(other.clone())),
            None => Ok(None),
        },
        "runRequest" => {
            let path = args.get("path").and_then(Value::as_str).unwrap_or_default();
            host.run_request(path)
                .map_err(|e| e.to_string())
                .and_then(|response| serde_json::to_value(response).map_err(|e| e.to_string()))
                .map(Some)
        }
        "sleep" => {
            let ms = args.get("ms").and_then(Value::as_u64).unwrap_or(0);
            std::thread::sleep(Duration::from_millis(ms));
            Ok(None)
        }
        other => Err(format!("Unknown host operation: {}", other)),
    };

    let envelope = match reply {
        Ok(Some(value)) => json!({ "ok": value }),
        Ok(None) => json!({}),
        Err(message) => json!({ "error": message }),
    };
    envelope.to_string()
}
