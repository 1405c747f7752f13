//! Collection execution pipeline
//!
//! [`prepare_runner`] turns a collection path and [`RunOptions`] into a ready
//! [`Runner`]; [`run_collection`] also runs it and writes the reports.

pub mod assertions;
pub mod executor;
pub mod expr;
pub mod html;
pub mod options;
pub mod report;
pub mod result;
pub mod runner;
pub mod summary;

pub use assertions::{AssertionResult, AssertionStatus, Operator};
pub use executor::Session;
pub use options::RunOptions;
pub use report::{write_reports, Redaction, ReportFormat, ReportTargets};
pub use result::{FlowControl, RequestSnapshot, RunResult, RunStatus};
pub use runner::{RunEnd, RunEvent, RunObserver, RunOutput, Runner, MAX_JUMPS};
pub use summary::RunSummary;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::auth::CredentialStore;
use crate::client::{ReqwestTransport, Transport, TransportOptions};
use crate::collection::load_collection;
use crate::context::{dotenv, load_global_environment, select_environment};
use crate::errors::Result;
use crate::scripting::create_runtime;

/// Load the collection, pick the environment and wire up the transport and
/// script sandbox
pub fn prepare_runner(collection_path: &Path, options: &RunOptions) -> Result<Runner> {
    let credentials = Arc::new(CredentialStore::new());
    let transport = ReqwestTransport::new(
        TransportOptions {
            insecure: options.insecure,
            timeout: options.request_timeout_ms.map(Duration::from_millis),
            ..TransportOptions::default()
        },
        credentials.clone(),
    )?;
    prepare_runner_with(collection_path, options, Arc::new(transport), credentials)
}

/// Same as [`prepare_runner`] with a caller-supplied transport
pub fn prepare_runner_with(
    collection_path: &Path,
    options: &RunOptions,
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialStore>,
) -> Result<Runner> {
    let collection = load_collection(collection_path)?;
    let environment = select_environment(
        &collection,
        options.env_name.as_deref(),
        options.env_file.as_deref(),
        &options.env_overrides,
    )?;
    let global_env = load_global_environment(options.global_env_file.as_deref())?;

    let mut process_env = dotenv::process_env();
    dotenv::merge_dotenv(&mut process_env, &collection.base_dir)?;
    debug!(
        collection = %collection.name,
        env = ?environment.name,
        "Prepared run context"
    );

    let scripts = create_runtime(options.sandbox, options.script_limits());
    let session = Session::new(Arc::new(collection), transport, scripts)
        .with_credentials(credentials)
        .with_global_environment(global_env)
        .with_environment(environment.name, environment.vars)
        .with_process_env(process_env)
        .with_request_timeout(options.request_timeout_ms);

    Ok(Runner::new(Arc::new(session), options.clone()))
}

/// Run a collection and write the configured reports
pub async fn run_collection(
    collection_path: &Path,
    options: &RunOptions,
    observer: Option<Arc<dyn RunObserver>>,
) -> Result<RunOutput> {
    let mut runner = prepare_runner(collection_path, options)?;
    if let Some(observer) = observer {
        runner = runner.with_observer(observer);
    }
    let output = runner.run().await?;
    write_reports(&options.reports, &output, &options.redaction)?;
    Ok(output)
}
