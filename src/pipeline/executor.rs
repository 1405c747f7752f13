//! Single-request pipeline
//!
//! A [`Session`] owns everything one run shares between requests: the
//! collection, the environment, runtime variables, the transport and the
//! script sandbox. [`Session::execute`] takes one request through resolve,
//! materialize, pre-request script, interpolation, transport, post-response
//! variables and script, assertions and tests.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, error};

use super::assertions::run_assertions;
use super::expr::{self, ExprContext};
use super::result::{Executed, FlowControl, RequestSnapshot, RunResult};
use crate::auth::CredentialStore;
use crate::client::{ResponseSnapshot, Transport};
use crate::collection::{Collection, RequestItem};
use crate::errors::{Result, RunnerError};
use crate::interpolate::scope::{self, string_layer};
use crate::interpolate::{interpolate_request, interpolate_str, ScopeLayers};
use crate::request::{materialize, WireBody, WireRequest};
use crate::resolve::{resolve, ResolvedRequest};
use crate::scripting::{
    forward_logs, NextRequest, RequestView, ScriptContext, ScriptHost, ScriptOutcome, ScriptPhase,
    ScriptRuntime, VarScope,
};

/// State shared by every request of one run
pub struct Session {
    collection: Arc<Collection>,
    transport: Arc<dyn Transport>,
    scripts: Arc<dyn ScriptRuntime>,
    credentials: Arc<CredentialStore>,
    env_name: Option<String>,
    env_vars: Mutex<IndexMap<String, Value>>,
    global_env: IndexMap<String, Value>,
    process_env: IndexMap<String, String>,
    runtime_vars: Mutex<IndexMap<String, Value>>,
    request_timeout_ms: Option<u64>,
}

impl Session {
    pub fn new(
        collection: Arc<Collection>,
        transport: Arc<dyn Transport>,
        scripts: Arc<dyn ScriptRuntime>,
    ) -> Self {
        Session {
            collection,
            transport,
            scripts,
            credentials: Arc::new(CredentialStore::new()),
            env_name: None,
            env_vars: Mutex::new(IndexMap::new()),
            global_env: IndexMap::new(),
            process_env: IndexMap::new(),
            runtime_vars: Mutex::new(IndexMap::new()),
            request_timeout_ms: None,
        }
    }

    /// Share a credential store with the transport
    pub fn with_credentials(mut self, credentials: Arc<CredentialStore>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_environment(mut self, name: Option<String>, vars: IndexMap<String, Value>) -> Self {
        self.env_name = name;
        self.env_vars = Mutex::new(vars);
        self
    }

    pub fn with_global_environment(mut self, vars: IndexMap<String, Value>) -> Self {
        self.global_env = vars;
        self
    }

    pub fn with_process_env(mut self, vars: IndexMap<String, String>) -> Self {
        self.process_env = vars;
        self
    }

    pub fn with_request_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn sandbox(&self) -> crate::scripting::SandboxMode {
        self.scripts.mode()
    }

    /// Snapshot of the runtime variables set so far
    pub fn runtime_vars(&self) -> IndexMap<String, Value> {
        self.runtime_vars.lock().map(|vars| vars.clone()).unwrap_or_default()
    }

    /// Snapshot of the environment, including script writes
    pub fn env_vars(&self) -> IndexMap<String, Value> {
        self.env_vars.lock().map(|vars| vars.clone()).unwrap_or_default()
    }

    fn set_runtime_var(&self, name: &str, value: Option<Value>) {
        if let Ok(mut vars) = self.runtime_vars.lock() {
            match value {
                Some(value) => {
                    vars.insert(name.to_string(), value);
                }
                None => {
                    vars.shift_remove(name);
                }
            }
        }
    }

    fn layers(&self, vars: &RequestVars) -> ScopeLayers {
        ScopeLayers {
            process_env: self.process_env.clone(),
            global_env: self.global_env.clone(),
            env: self.env_vars(),
            collection_vars: vars.collection.clone(),
            folder_vars: vars.folder.clone(),
            request_vars: vars.request.clone(),
            oauth2_vars: self.credentials.variables(),
            runtime_vars: self.runtime_vars(),
        }
    }

    fn scope(&self, vars: &RequestVars) -> Value {
        self.layers(vars).combined()
    }

    /// Run the request at `path` and return its response
    pub async fn run_by_path(self: &Arc<Self>, path: &str) -> Result<ResponseSnapshot> {
        let collection = self.collection.clone();
        let item = collection
            .find_request(path)
            .ok_or_else(|| RunnerError::Script(format!("invalid request path - {}", path)))?;

        let executed = self.execute(item).await?;
        match (executed.result.response, executed.result.error) {
            (Some(response), _) => Ok(response),
            (None, Some(error)) => Err(RunnerError::Script(error)),
            (None, None) => Err(RunnerError::Script(format!("request {} was skipped", path))),
        }
    }

    /// The request as it would go on the wire before any script runs
    pub fn preview(&self, item: &RequestItem) -> Result<WireRequest> {
        let resolved = resolve(&self.collection, item)?;
        let vars = RequestVars::from_resolved(&resolved);
        let mut wire = materialize(&resolved, &self.collection);
        if wire.timeout_ms.is_none() {
            wire.timeout_ms = self.request_timeout_ms;
        }
        interpolate_request(&mut wire, &self.scope(&vars))?;
        Ok(wire)
    }

    /// Take one request through the whole pipeline. Only configuration
    /// errors are returned as `Err`; everything else lands on the result.
    pub async fn execute(self: &Arc<Self>, item: &RequestItem) -> Result<Executed> {
        let started = Instant::now();
        let resolved = resolve(&self.collection, item)?;
        let vars = RequestVars::from_resolved(&resolved);
        debug!(request = %item.path, auth = resolved.auth.mode_name(), "Resolved request");

        let mut wire = materialize(&resolved, &self.collection);
        if wire.timeout_ms.is_none() {
            wire.timeout_ms = self.request_timeout_ms;
        }

        let mut result = RunResult::new(&item.name, &item.path);
        result.request = RequestSnapshot::from_wire(&wire);
        let mut hints = FlowHints::default();

        let pre = self
            .run_phase(
                ScriptPhase::PreRequest,
                &resolved.pre_request_script,
                item,
                &vars,
                request_view(&wire),
                None,
                &mut result,
                &mut hints,
            )
            .await;
        if let Some(outcome) = pre {
            result.pre_request_test_results = outcome.tests;
            if let Some(view) = outcome.request {
                apply_request_view(&mut wire, view);
                result.request = RequestSnapshot::from_wire(&wire);
            }
            if outcome.skip_request {
                debug!(request = %item.name, "Request skipped by pre-request script");
                result.skipped = true;
                return Ok(self.finish(result, hints, started));
            }
        }
        if result.error.is_some() {
            return Ok(self.finish(result, hints, started));
        }

        let scope = self.scope(&vars);
        if let Err(e) = interpolate_request(&mut wire, &scope) {
            result.error = Some(e.to_string());
            return Ok(self.finish(result, hints, started));
        }
        result.request = RequestSnapshot::from_wire(&wire);

        debug!(method = %wire.method, url = %wire.url, "Sending request");
        let response = match self.transport.send(&wire).await {
            Ok(response) => response,
            Err(e) => {
                error!(request = %item.name, "{}", e);
                result.error = Some(e.to_string());
                return Ok(self.finish(result, hints, started));
            }
        };
        result.response = Some(response.clone());

        let request_value = serde_json::to_value(request_view(&wire)).unwrap_or(Value::Null);
        self.apply_post_response_vars(&resolved, &vars, &response, &request_value);

        let post = self
            .run_phase(
                ScriptPhase::PostResponse,
                &resolved.post_response_script,
                item,
                &vars,
                request_view(&wire),
                Some(&response),
                &mut result,
                &mut hints,
            )
            .await;
        if let Some(outcome) = post {
            result.post_response_test_results = outcome.tests;
        }

        let scope = self.scope(&vars);
        let ctx = ExprContext {
            response: Some(&response),
            request: Some(&request_value),
            scope: &scope,
        };
        result.assertion_results = run_assertions(&resolved.assertions, &ctx);

        let tests = self
            .run_phase(
                ScriptPhase::Tests,
                &resolved.tests,
                item,
                &vars,
                request_view(&wire),
                Some(&response),
                &mut result,
                &mut hints,
            )
            .await;
        if let Some(outcome) = tests {
            result.test_results = outcome.tests;
        }

        Ok(self.finish(result, hints, started))
    }

    fn finish(&self, mut result: RunResult, hints: FlowHints, started: Instant) -> Executed {
        result.runtime = started.elapsed().as_secs_f64();
        result.settle();
        Executed {
            result,
            flow: hints.into_flow(),
        }
    }

    /// Evaluate `vars:post-response` into runtime variables
    fn apply_post_response_vars(
        &self,
        resolved: &ResolvedRequest,
        vars: &RequestVars,
        response: &ResponseSnapshot,
        request: &Value,
    ) {
        for (name, expression) in &resolved.post_response_vars {
            let scope = self.scope(vars);
            let expression = interpolate_str(expression, &scope);
            let ctx = ExprContext {
                response: Some(response),
                request: Some(request),
                scope: &scope,
            };
            match expr::evaluate(&expression, &ctx) {
                Ok(value) => self.set_runtime_var(name, value),
                Err(e) => error!(variable = %name, "Post-response variable failed: {}", e),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_phase(
        self: &Arc<Self>,
        phase: ScriptPhase,
        script: &str,
        item: &RequestItem,
        vars: &RequestVars,
        request: RequestView,
        response: Option<&ResponseSnapshot>,
        result: &mut RunResult,
        hints: &mut FlowHints,
    ) -> Option<ScriptOutcome> {
        if script.trim().is_empty() {
            return None;
        }

        let context = ScriptContext {
            phase,
            request,
            response: response.cloned(),
            request_name: item.name.clone(),
            request_path: item.path.clone(),
            collection_name: self.collection.name.clone(),
            collection_path: self.collection.base_dir.display().to_string(),
            env_name: self.env_name.clone(),
            process_env: self.process_env.clone(),
        };
        let host: Arc<dyn ScriptHost> = Arc::new(RequestHost {
            session: self.clone(),
            vars: vars.clone(),
        });

        match self.scripts.run_script(script, context, host).await {
            Ok(outcome) => {
                forward_logs(&item.name, &outcome.logs);
                result.logs.extend(outcome.logs.iter().cloned());
                hints.absorb(&outcome);
                if let Some(message) = &outcome.error {
                    error!(request = %item.name, phase = ?phase, "Script failed: {}", message);
                    result.error.get_or_insert_with(|| message.clone());
                }
                Some(outcome)
            }
            Err(e) => {
                error!(request = %item.name, phase = ?phase, "Script failed: {}", e);
                result.error.get_or_insert_with(|| e.to_string());
                None
            }
        }
    }
}

/// The three variable layers that belong to one request
#[derive(Debug, Clone, Default)]
struct RequestVars {
    collection: IndexMap<String, Value>,
    folder: IndexMap<String, Value>,
    request: IndexMap<String, Value>,
}

impl RequestVars {
    fn from_resolved(resolved: &ResolvedRequest) -> Self {
        RequestVars {
            collection: string_layer(&resolved.collection_vars),
            folder: string_layer(&resolved.folder_vars),
            request: string_layer(&resolved.request_vars),
        }
    }
}

/// Flow hints gathered across the scripts of one request. A later
/// `setNextRequest` replaces an earlier one.
#[derive(Debug, Default)]
struct FlowHints {
    next: Option<NextRequest>,
    stop: bool,
}

impl FlowHints {
    fn absorb(&mut self, outcome: &ScriptOutcome) {
        match outcome.next_request() {
            NextRequest::Unset => {}
            next => self.next = Some(next),
        }
        self.stop |= outcome.stop_execution;
    }

    fn into_flow(self) -> FlowControl {
        if self.stop {
            return FlowControl::Stop;
        }
        match self.next {
            Some(NextRequest::Halt) => FlowControl::Halt,
            Some(NextRequest::Name(name)) => FlowControl::JumpTo(name),
            _ => FlowControl::Continue,
        }
    }
}

/// Script view of a wire request
fn request_view(wire: &WireRequest) -> RequestView {
    let body = match &wire.body {
        WireBody::None | WireBody::Multipart(_) | WireBody::File(_) => Value::Null,
        WireBody::Json(text) => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
        }
        WireBody::Text(text) => Value::String(text.clone()),
        WireBody::Form(pairs) => Value::Object(
            pairs
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        ),
    };

    RequestView {
        method: wire.method.clone(),
        url: wire.url.clone(),
        headers: wire.headers.clone(),
        body,
        timeout: wire.timeout_ms,
    }
}

/// Write script changes back onto the wire request
fn apply_request_view(wire: &mut WireRequest, view: RequestView) {
    let before = request_view(wire);

    wire.method = view.method;
    wire.url = view.url;
    wire.headers = view.headers;
    wire.timeout_ms = view.timeout;

    if view.body != before.body {
        wire.body = body_from_value(&wire.body, view.body);
        if matches!(wire.body, WireBody::Json(_)) && !wire.has_header("content-type") {
            wire.set_header("content-type", "application/json");
        }
    }
}

fn body_from_value(previous: &WireBody, value: Value) -> WireBody {
    match (previous, value) {
        (_, Value::Null) => WireBody::None,
        (WireBody::Json(_), Value::String(text)) => WireBody::Json(text),
        (_, Value::String(text)) => WireBody::Text(text),
        (WireBody::Form(_), Value::Object(map)) if map.values().all(Value::is_string) => {
            WireBody::Form(
                map.into_iter()
                    .map(|(k, v)| (k, v.as_str().unwrap_or_default().to_string()))
                    .collect(),
            )
        }
        (_, other) => WireBody::Json(other.to_string()),
    }
}

/// [`ScriptHost`] for one request: session state plus the request's own
/// variable layers
struct RequestHost {
    session: Arc<Session>,
    vars: RequestVars,
}

impl ScriptHost for RequestHost {
    fn runtime_var(&self, name: &str) -> Option<Value> {
        self.session.runtime_vars.lock().ok()?.get(name).cloned()
    }

    fn set_runtime_var(&self, name: &str, value: Value) {
        self.session.set_runtime_var(name, Some(value));
    }

    fn delete_runtime_var(&self, name: &str) {
        self.session.set_runtime_var(name, None);
    }

    fn env_var(&self, name: &str) -> Option<Value> {
        let value = self.session.env_vars.lock().ok()?.get(name).cloned()?;
        let process = self.session.layers(&RequestVars::default()).process_scope();
        Some(match value {
            Value::String(text) => Value::String(interpolate_str(&text, &process)),
            other => other,
        })
    }

    fn set_env_var(&self, name: &str, value: Value) {
        if let Ok(mut vars) = self.session.env_vars.lock() {
            vars.insert(name.to_string(), value);
        }
    }

    fn scoped_var(&self, scope: VarScope, name: &str) -> Option<Value> {
        match scope {
            VarScope::Collection => self.vars.collection.get(name).cloned(),
            VarScope::Folder => self.vars.folder.get(name).cloned(),
            VarScope::Request => self.vars.request.get(name).cloned(),
            VarScope::GlobalEnv => self.session.global_env.get(name).cloned(),
            VarScope::Process => self
                .session
                .process_env
                .get(name)
                .map(|v| Value::String(v.clone())),
            VarScope::Oauth2 => {
                let oauth2 = Value::Object(self.session.credentials.variables().into_iter().collect());
                scope::lookup(&oauth2, name).cloned()
            }
        }
    }

    fn interpolate(&self, template: &str) -> String {
        interpolate_str(template, &self.session.scope(&self.vars))
    }

    fn run_request(&self, path: &str) -> Result<ResponseSnapshot> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| RunnerError::Script("bru.runRequest needs a running async runtime".to_string()))?;
        let session = self.session.clone();
        let path = path.to_string();
        handle.block_on(Box::pin(async move { session.run_by_path(&path).await }))
    }
}
