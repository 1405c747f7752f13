//! Post-processing argument logic
//!
//! Turns parsed run flags into [`RunOptions`], layered over the user
//! config so that explicit flags win.

use crate::cli::args::{CurlArgs, RunArgs};
use crate::config::Config;
use crate::errors::Result;
use crate::pipeline::{ReportFormat, RunOptions};

/// Build the options of a `run` invocation
pub fn run_options(args: &RunArgs, config: &Config) -> Result<RunOptions> {
    let mut options = RunOptions::default();
    config.apply_defaults(&mut options);

    options.call_stack_paths = args.paths.clone();
    options.recursive = args.recursive;
    options.bail |= args.bail;
    options.tests_only = args.tests_only;
    options.insecure |= args.insecure;

    if let Some(sandbox) = args.sandbox {
        options.sandbox = sandbox;
    }
    if args.delay.is_some() {
        options.delay_ms = args.delay;
    }
    if args.script_timeout.is_some() {
        options.script_timeout_secs = args.script_timeout;
    }
    if args.timeout.is_some() {
        options.request_timeout_ms = args.timeout;
    }

    options.env_name = args.env.clone();
    options.env_file = args.env_file.clone();
    options.env_overrides = args.env_vars.clone();
    options.global_env_file = args.global_env_file.clone();

    // An unknown format is rejected even without --output
    let format = ReportFormat::parse(&args.format)?;
    if let Some(output) = &args.output {
        options.reports.set(format, output.clone());
    }
    if let Some(path) = &args.reporter_json {
        options.reports.set(ReportFormat::Json, path.clone());
    }
    if let Some(path) = &args.reporter_junit {
        options.reports.set(ReportFormat::JUnit, path.clone());
    }
    if let Some(path) = &args.reporter_html {
        options.reports.set(ReportFormat::Html, path.clone());
    }

    options.redaction.skip_all |= args.reporter_skip_all_headers;
    for name in &args.reporter_skip_headers {
        if !options.redaction.skip_names.contains(name) {
            options.redaction.skip_names.push(name.clone());
        }
    }

    Ok(options)
}

/// Options for a `curl` preview: environment selection only
pub fn curl_options(args: &CurlArgs) -> RunOptions {
    RunOptions {
        env_name: args.env.clone(),
        env_file: args.env_file.clone(),
        env_overrides: args.env_vars.clone(),
        ..RunOptions::default()
    }
}
