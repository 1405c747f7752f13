//! Exit status codes for the CLI
//!
//! Every run ends in one of these codes:
//! - 0: all requests, assertions and tests passed
//! - 1: at least one request, assertion or test failed
//! - 2..9: the run could not start or was aborted (see variants)
//! - 130: user interrupted (Ctrl+C)
//! - 255: any other error

use std::process::{ExitCode, Termination};

use crate::pipeline::summary::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    /// At least one request errored or an assertion/test failed
    FailedCollection = 1,
    /// A report target points into a directory that does not exist
    MissingOutputDir = 2,
    /// A requested path is not part of the collection
    FileNotFound = 4,
    /// The jump guard tripped
    InfiniteLoop = 5,
    EnvNotFound = 6,
    MalformedEnvOverride = 7,
    IncorrectEnvOverride = 8,
    IncorrectOutputFormat = 9,
    /// User interrupted (Ctrl+C) - standard SIGINT code
    Interrupted = 130,
    Generic = 255,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status as u8)
    }
}

impl Termination for ExitStatus {
    fn report(self) -> ExitCode {
        ExitCode::from(self as u8)
    }
}

impl ExitStatus {
    /// Exit status for a finished run
    pub fn from_summary(summary: &RunSummary) -> Self {
        if summary.has_failures() {
            ExitStatus::FailedCollection
        } else {
            ExitStatus::Success
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}
