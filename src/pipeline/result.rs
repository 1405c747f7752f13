//! Per-request run records and flow control

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::assertions::AssertionResult;
use crate::client::ResponseSnapshot;
use crate::request::WireRequest;
use crate::scripting::{ConsoleEntry, TestResult};

/// What was sent, as recorded in reports
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    pub headers: IndexMap<String, String>,
    pub body: Value,
}

impl RequestSnapshot {
    pub fn from_wire(request: &WireRequest) -> Self {
        RequestSnapshot {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.as_text().map(Value::String).unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pass,
    Fail,
    Error,
    Skipped,
}

/// Outcome of one executed (or skipped) request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub name: String,
    pub path: String,
    pub request: RequestSnapshot,
    pub response: Option<ResponseSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: RunStatus,
    pub skipped: bool,
    pub assertion_results: Vec<AssertionResult>,
    pub pre_request_test_results: Vec<TestResult>,
    pub post_response_test_results: Vec<TestResult>,
    pub test_results: Vec<TestResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<ConsoleEntry>,
    /// Wall time of the whole pipeline, in seconds
    pub runtime: f64,
}

impl RunResult {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        RunResult {
            name: name.into(),
            path: path.into(),
            request: RequestSnapshot::default(),
            response: None,
            error: None,
            status: RunStatus::Pass,
            skipped: false,
            assertion_results: Vec::new(),
            pre_request_test_results: Vec::new(),
            post_response_test_results: Vec::new(),
            test_results: Vec::new(),
            logs: Vec::new(),
            runtime: 0.0,
        }
    }

    /// A result recorded without sending anything
    pub fn skipped(name: impl Into<String>, path: impl Into<String>, request: RequestSnapshot) -> Self {
        let mut result = RunResult::new(name, path);
        result.request = request;
        result.skipped = true;
        result.status = RunStatus::Skipped;
        result
    }

    pub fn has_failed_assertions(&self) -> bool {
        self.assertion_results.iter().any(|a| !a.passed())
    }

    pub fn has_failed_tests(&self) -> bool {
        self.test_results
            .iter()
            .chain(&self.pre_request_test_results)
            .chain(&self.post_response_test_results)
            .any(|t| !t.passed())
    }

    /// Any failure that stops a run with `bail`
    pub fn is_failure(&self) -> bool {
        (self.error.is_some() && !self.skipped) || self.has_failed_assertions() || self.has_failed_tests()
    }

    /// Derive `status` from the recorded outcome
    pub(crate) fn settle(&mut self) {
        self.status = if self.skipped {
            RunStatus::Skipped
        } else if self.error.is_some() {
            RunStatus::Error
        } else if self.has_failed_assertions() || self.has_failed_tests() {
            RunStatus::Fail
        } else {
            RunStatus::Pass
        };
    }
}

/// How the run loop continues after a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowControl {
    Continue,
    JumpTo(String),
    /// `setNextRequest(null)`
    Halt,
    /// `bru.runner.stopExecution()`
    Stop,
    StopOnFailure,
}

/// A run record plus the flow hint the scripts left behind
#[derive(Debug, Clone)]
pub struct Executed {
    pub result: RunResult,
    pub flow: FlowControl,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::TestStatus;

    fn failing_test() -> TestResult {
        TestResult {
            description: "status is 200".into(),
            status: TestStatus::Fail,
            error: Some("expected 500 to equal 200".into()),
        }
    }

    #[test]
    fn test_settle_status() {
        let mut result = RunResult::new("a", "a");
        result.settle();
        assert_eq!(result.status, RunStatus::Pass);

        result.post_response_test_results.push(failing_test());
        result.settle();
        assert_eq!(result.status, RunStatus::Fail);
        assert!(result.is_failure());

        result.error = Some("connection refused".into());
        result.settle();
        assert_eq!(result.status, RunStatus::Error);
    }

    #[test]
    fn test_skipped_error_is_not_failure() {
        let mut result = RunResult::skipped("a", "a", RequestSnapshot::default());
        result.error = Some("skipped".into());
        assert!(!result.is_failure());
        result.settle();
        assert_eq!(result.status, RunStatus::Skipped);
    }
}
