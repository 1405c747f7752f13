//! CLI argument parsing and processing

pub mod args;
pub mod process;

// Re-exports
pub use args::{Args, Command, CurlArgs, ListArgs, LogFormat, RunArgs};
pub use process::{curl_options, run_options};
