//! Run summary aggregation

use serde::Serialize;

use super::result::{RunResult, RunStatus};
use crate::scripting::TestResult;

/// Aggregate counters over a list of run results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_requests: usize,
    pub passed_requests: usize,
    pub failed_requests: usize,
    pub skipped_requests: usize,
    pub error_requests: usize,

    pub total_assertions: usize,
    pub passed_assertions: usize,
    pub failed_assertions: usize,

    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,

    pub total_pre_request_tests: usize,
    pub passed_pre_request_tests: usize,
    pub failed_pre_request_tests: usize,

    pub total_post_response_tests: usize,
    pub passed_post_response_tests: usize,
    pub failed_post_response_tests: usize,
}

impl RunSummary {
    /// Recompute every counter from scratch
    pub fn from_results(results: &[RunResult]) -> Self {
        let mut summary = RunSummary {
            total_requests: results.len(),
            ..Default::default()
        };

        for result in results {
            match result.status {
                RunStatus::Skipped => summary.skipped_requests += 1,
                RunStatus::Error => summary.error_requests += 1,
                RunStatus::Fail => summary.failed_requests += 1,
                RunStatus::Pass => summary.passed_requests += 1,
            }

            for assertion in &result.assertion_results {
                summary.total_assertions += 1;
                if assertion.passed() {
                    summary.passed_assertions += 1;
                } else {
                    summary.failed_assertions += 1;
                }
            }

            let (total, passed) = tally(&result.test_results);
            summary.total_tests += total;
            summary.passed_tests += passed;

            let (total, passed) = tally(&result.pre_request_test_results);
            summary.total_pre_request_tests += total;
            summary.passed_pre_request_tests += passed;

            let (total, passed) = tally(&result.post_response_test_results);
            summary.total_post_response_tests += total;
            summary.passed_post_response_tests += passed;
        }

        summary.failed_tests = summary.total_tests - summary.passed_tests;
        summary.failed_pre_request_tests = summary.total_pre_request_tests - summary.passed_pre_request_tests;
        summary.failed_post_response_tests =
            summary.total_post_response_tests - summary.passed_post_response_tests;
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed_requests > 0
            || self.error_requests > 0
            || self.failed_assertions > 0
            || self.failed_tests > 0
            || self.failed_pre_request_tests > 0
            || self.failed_post_response_tests > 0
    }
}

fn tally(tests: &[TestResult]) -> (usize, usize) {
    (tests.len(), tests.iter().filter(|t| t.passed()).count())
}
