use clap::Parser;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::{curl_options, run_options, Args, Command, CurlArgs, ListArgs, LogFormat, RunArgs};
use crate::config::Config;
use crate::errors::{Result, RunnerError};
use crate::pipeline::{self, prepare_runner, RunEvent, RunObserver, RunOptions, RunResult, RunStatus, RunSummary};
use crate::request::curl::to_curl;
use crate::status::ExitStatus;

/// Main entry point for the CLI.
///
/// Handles argument parsing, logging setup and configuration loading, then
/// dispatches to the subcommand on a multi-threaded runtime.
pub fn run(args: Vec<String>) -> ExitStatus {
    let parsed = match Args::try_parse_from(&args) {
        Ok(args) => args,
        Err(e) => {
            e.print().ok();
            return if e.kind() == clap::error::ErrorKind::DisplayHelp
                || e.kind() == clap::error::ErrorKind::DisplayVersion
            {
                ExitStatus::Success
            } else {
                ExitStatus::Generic
            };
        }
    };

    init_logging(&parsed);

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}", e);
            Config::default()
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => return handle_error(RunnerError::Io(e)),
    };

    match runtime.block_on(program(parsed, config)) {
        Ok(status) => status,
        Err(e) => handle_error(e),
    }
}

pub async fn program(args: Args, config: Config) -> Result<ExitStatus> {
    let show_progress = args.quiet < 2;
    match args.command {
        Command::Run(run) => run_command(&run, &config, show_progress).await,
        Command::List(list) => list_command(&list),
        Command::Curl(curl) => curl_command(&curl),
    }
}

async fn run_command(args: &RunArgs, config: &Config, show_progress: bool) -> Result<ExitStatus> {
    let options = run_options(args, config)?;
    let observer: Option<Arc<dyn RunObserver>> = if show_progress {
        Some(Arc::new(ProgressPrinter))
    } else {
        None
    };

    let output = pipeline::run_collection(&args.collection, &options, observer).await?;
    if show_progress {
        println!("\n{}", summary_table(&output.summary));
    }
    Ok(ExitStatus::from_summary(&output.summary))
}

fn list_command(args: &ListArgs) -> Result<ExitStatus> {
    let options = RunOptions {
        call_stack_paths: args.paths.clone(),
        recursive: args.recursive,
        tests_only: args.tests_only,
        ..RunOptions::default()
    };
    let collection = crate::collection::load_collection(&args.collection)?;
    for item in collection.call_stack(&options.call_stack_paths, options.recursive)? {
        if options.tests_only && !item.has_tests() {
            continue;
        }
        println!("{} {}", item.request.method, item.path);
    }
    Ok(ExitStatus::Success)
}

fn curl_command(args: &CurlArgs) -> Result<ExitStatus> {
    let options = curl_options(args);
    let runner = prepare_runner(Path::new(&args.collection), &options)?;
    let session = runner.session();
    let item = session
        .collection()
        .find_request(&args.path)
        .ok_or_else(|| RunnerError::PathNotFound(args.path.clone()))?;
    let request = session.preview(item)?;
    println!("{}", to_curl(&request));
    Ok(ExitStatus::Success)
}

/// One line per finished request, plus indented assertion and test lines
struct ProgressPrinter;

impl RunObserver for ProgressPrinter {
    fn on_event(&self, event: &RunEvent<'_>) {
        if let RunEvent::ItemFinished { result, .. } = event {
            println!("{}", format_result(result));
        }
    }
}

fn format_result(result: &RunResult) -> String {
    let mark = match result.status {
        RunStatus::Pass => "✓",
        RunStatus::Fail | RunStatus::Error => "✗",
        RunStatus::Skipped => "-",
    };
    let mut line = match (&result.response, &result.error) {
        (Some(response), _) => format!(
            "{} {} ({} {}) - {} ms",
            mark, result.path, response.status, response.status_text, response.response_time
        ),
        (None, Some(error)) => format!("{} {} - {}", mark, result.path, error),
        (None, None) => format!("{} {} (skipped)", mark, result.path),
    };

    for assertion in &result.assertion_results {
        let detail = match &assertion.error {
            Some(error) if !assertion.passed() => format!(": {}", error),
            _ => String::new(),
        };
        let mark = if assertion.passed() { "✓" } else { "✗" };
        line.push_str(&format!(
            "\n   {} assert: {} {}{}",
            mark, assertion.lhs_expr, assertion.rhs_expr, detail
        ));
    }

    let tests = result
        .pre_request_test_results
        .iter()
        .chain(&result.post_response_test_results)
        .chain(&result.test_results);
    for test in tests {
        let mark = if test.passed() { "✓" } else { "✗" };
        let detail = test.error.as_deref().map(|e| format!(": {}", e)).unwrap_or_default();
        line.push_str(&format!("\n   {} {}{}", mark, test.description, detail));
    }
    line
}

fn summary_table(summary: &RunSummary) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        ["", "Total", "Passed", "Failed", "Skipped", "Errors"]
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
    );
    table.add_row(vec![
        "Requests".to_string(),
        summary.total_requests.to_string(),
        summary.passed_requests.to_string(),
        summary.failed_requests.to_string(),
        summary.skipped_requests.to_string(),
        summary.error_requests.to_string(),
    ]);
    table.add_row(vec![
        "Assertions".to_string(),
        summary.total_assertions.to_string(),
        summary.passed_assertions.to_string(),
        summary.failed_assertions.to_string(),
        String::new(),
        String::new(),
    ]);
    table.add_row(vec![
        "Tests".to_string(),
        summary.total_tests.to_string(),
        summary.passed_tests.to_string(),
        summary.failed_tests.to_string(),
        String::new(),
        String::new(),
    ]);
    table.to_string()
}

/// `RUST_LOG` wins; otherwise `-v`/`-q` pick the level
fn init_logging(args: &Args) {
    let default_level = match (args.verbose, args.quiet) {
        (0, 0) => "warn",
        (_, q) if q > 0 => "error",
        (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match args.log_format.unwrap_or_default() {
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init(),
        LogFormat::Text => registry.with(fmt::layer().with_writer(std::io::stderr)).try_init(),
    };
    result.ok();
}

fn handle_error(error: RunnerError) -> ExitStatus {
    eprintln!("Error: {}", error);
    error.exit_status()
}
