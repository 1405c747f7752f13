//! pulse-runner library interface
//!
//! Runs collections of HTTP requests: resolves inherited configuration,
//! interpolates variables, executes user scripts in a sandbox, evaluates
//! assertions and writes reports.
//!
//! # Module Organization
//!
//! - [`collection`] - Collection documents and the call stack
//! - [`resolve`] - Inheritance from the collection root to a request
//! - [`request`] - Materialized wire requests
//! - [`interpolate`] - `{{variable}}` substitution
//! - [`scripting`] - Sandboxed JavaScript runtimes
//! - [`client`] - HTTP transport
//! - [`pipeline`] - Per-request execution, run loop and reports
//! - [`errors`] - Error types (RunnerError, Result)
//! - [`status`] - Exit status codes (ExitStatus)
//! - [`core`] - Main execution logic of the binary

pub mod auth;
pub mod cli;
pub mod client;
pub mod collection;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod interpolate;
pub mod pipeline;
pub mod request;
pub mod resolve;
pub mod scripting;
pub mod signals;
pub mod status;

pub use errors::{Result, RunnerError};
pub use pipeline::{run_collection, RunOptions, RunOutput, Runner, Session};
pub use status::ExitStatus;
