//! CLI argument definitions using clap
//!
//! This module defines all command-line arguments for pulse-runner.

use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::scripting::SandboxMode;

/// pulse-runner - run API request collections from the command line
#[derive(Parser, Debug, Clone)]
#[command(name = "pulse-runner", version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose logging. Use -vv for trace output
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors. Use -qq to silence per-request lines as well
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Output format for structured logging: json (JSON Lines) or text (default)
    #[arg(long = "log-format", value_name = "FORMAT", value_enum, global = true)]
    pub log_format: Option<LogFormat>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run requests of a collection
    Run(RunArgs),

    /// Print the requests `run` would execute, in order
    List(ListArgs),

    /// Print a request as a curl command without sending it
    Curl(CurlArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Collection document (JSON or YAML)
    #[arg(value_name = "COLLECTION")]
    pub collection: PathBuf,

    /// Requests or folders to run, relative to the collection root
    #[arg(value_name = "PATHS")]
    pub paths: Vec<String>,

    /// Descend into subfolders of the given folders
    #[arg(short = 'r', long = "recursive", action = ArgAction::SetTrue)]
    pub recursive: bool,

    // =========================================================================
    // ENVIRONMENT
    // =========================================================================

    /// Named environment to use
    #[arg(long = "env", value_name = "NAME")]
    pub env: Option<String>,

    /// Environment file to use
    #[arg(long = "env-file", value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Override an environment variable (NAME=VALUE, repeatable)
    #[arg(long = "env-var", value_name = "NAME=VALUE", action = ArgAction::Append)]
    pub env_vars: Vec<String>,

    /// Global environment file, visible to every request beneath the
    /// selected environment
    #[arg(long = "global-env-file", value_name = "FILE")]
    pub global_env_file: Option<PathBuf>,

    // =========================================================================
    // EXECUTION
    // =========================================================================

    /// Script sandbox
    #[arg(long = "sandbox", value_name = "MODE", value_enum)]
    pub sandbox: Option<SandboxMode>,

    /// Stop at the first failing request
    #[arg(long = "bail", action = ArgAction::SetTrue)]
    pub bail: bool,

    /// Milliseconds to wait between requests
    #[arg(long = "delay", value_name = "MS", allow_negative_numbers = true)]
    pub delay: Option<f64>,

    /// Only run requests that have tests or assertions
    #[arg(long = "tests-only", action = ArgAction::SetTrue)]
    pub tests_only: bool,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long = "insecure", action = ArgAction::SetTrue)]
    pub insecure: bool,

    /// Seconds a single script may run
    #[arg(long = "script-timeout", value_name = "SECS")]
    pub script_timeout: Option<u64>,

    /// Milliseconds before a request times out
    #[arg(long = "timeout", value_name = "MS")]
    pub timeout: Option<u64>,

    // =========================================================================
    // REPORTS
    // =========================================================================

    /// Write results to this file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Format of --output: json, junit or html
    #[arg(short = 'f', long = "format", value_name = "FORMAT", default_value = "json")]
    pub format: String,

    /// Write a JSON report
    #[arg(long = "reporter-json", value_name = "FILE")]
    pub reporter_json: Option<PathBuf>,

    /// Write a JUnit XML report
    #[arg(long = "reporter-junit", value_name = "FILE")]
    pub reporter_junit: Option<PathBuf>,

    /// Write an HTML report
    #[arg(long = "reporter-html", value_name = "FILE")]
    pub reporter_html: Option<PathBuf>,

    /// Remove all headers from reports
    #[arg(long = "reporter-skip-all-headers", action = ArgAction::SetTrue)]
    pub reporter_skip_all_headers: bool,

    /// Remove a header from reports (repeatable)
    #[arg(long = "reporter-skip-headers", value_name = "NAME", action = ArgAction::Append)]
    pub reporter_skip_headers: Vec<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ListArgs {
    #[arg(value_name = "COLLECTION")]
    pub collection: PathBuf,

    #[arg(value_name = "PATHS")]
    pub paths: Vec<String>,

    #[arg(short = 'r', long = "recursive", action = ArgAction::SetTrue)]
    pub recursive: bool,

    /// Only list requests that have tests or assertions
    #[arg(long = "tests-only", action = ArgAction::SetTrue)]
    pub tests_only: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CurlArgs {
    #[arg(value_name = "COLLECTION")]
    pub collection: PathBuf,

    /// Request path, relative to the collection root
    #[arg(value_name = "PATH")]
    pub path: String,

    #[arg(long = "env", value_name = "NAME")]
    pub env: Option<String>,

    #[arg(long = "env-file", value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    #[arg(long = "env-var", value_name = "NAME=VALUE", action = ArgAction::Append)]
    pub env_vars: Vec<String>,
}

/// Log format for structured output (CI/CD)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Plain text output (default)
    #[default]
    Text,
    /// JSON Lines format for parsing
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let args = Args::try_parse_from([
            "pulse-runner",
            "run",
            "api.json",
            "users",
            "-r",
            "--env",
            "local",
            "--env-var",
            "host=http://localhost",
            "--env-var",
            "token=abc",
            "--sandbox",
            "safe",
            "--reporter-skip-headers",
            "Authorization",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.verbose, 1);
        let Command::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.collection, PathBuf::from("api.json"));
        assert_eq!(run.paths, vec!["users"]);
        assert!(run.recursive);
        assert_eq!(run.env.as_deref(), Some("local"));
        assert_eq!(run.env_vars.len(), 2);
        assert_eq!(run.sandbox, Some(SandboxMode::Safe));
        assert_eq!(run.reporter_skip_headers, vec!["Authorization"]);
        assert_eq!(run.format, "json");
    }

    #[test]
    fn test_negative_delay_parses() {
        let args = Args::try_parse_from(["pulse-runner", "run", "api.json", "--delay", "-5"]).unwrap();
        let Command::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.delay, Some(-5.0));
    }

    #[test]
    fn test_curl_requires_path() {
        assert!(Args::try_parse_from(["pulse-runner", "curl", "api.json"]).is_err());
    }
}
