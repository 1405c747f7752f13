//! Report generation for run results
//!
//! Three formats are supported: the raw `{summary, results}` JSON, JUnit XML
//! for CI systems (one test suite per request) and a self-contained HTML
//! page. Headers can be redacted before anything is written.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use junit_report::{Duration, Report, TestCase, TestSuite};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use super::html;
use super::result::RunResult;
use super::runner::RunOutput;
use crate::errors::{Result, RunnerError};

/// Report format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    JUnit,
    Html,
}

impl ReportFormat {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "junit" => Ok(ReportFormat::JUnit),
            "html" => Ok(ReportFormat::Html),
            _ => Err(RunnerError::UnknownReportFormat(name.to_string())),
        }
    }
}

/// Output path per report format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportTargets {
    pub json: Option<PathBuf>,
    pub junit: Option<PathBuf>,
    pub html: Option<PathBuf>,
}

impl ReportTargets {
    pub fn is_empty(&self) -> bool {
        self.json.is_none() && self.junit.is_none() && self.html.is_none()
    }

    pub fn set(&mut self, format: ReportFormat, path: PathBuf) {
        match format {
            ReportFormat::Json => self.json = Some(path),
            ReportFormat::JUnit => self.junit = Some(path),
            ReportFormat::Html => self.html = Some(path),
        }
    }

    fn entries(&self) -> Vec<(ReportFormat, &Path)> {
        [
            (ReportFormat::Json, self.json.as_deref()),
            (ReportFormat::JUnit, self.junit.as_deref()),
            (ReportFormat::Html, self.html.as_deref()),
        ]
        .into_iter()
        .filter_map(|(format, path)| path.map(|p| (format, p)))
        .filter(|(_, path)| !path.as_os_str().is_empty())
        .collect()
    }
}

/// Headers removed from reports
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Redaction {
    pub skip_all: bool,
    pub skip_names: Vec<String>,
}

impl Redaction {
    pub fn is_noop(&self) -> bool {
        !self.skip_all && self.skip_names.is_empty()
    }

    /// Strip headers from every request and response, names compared
    /// case-insensitively
    pub fn apply(&self, results: &mut [RunResult]) {
        if self.is_noop() {
            return;
        }
        for result in results {
            let response_headers = result.response.as_mut().map(|r| &mut r.headers);
            if self.skip_all {
                result.request.headers.clear();
                if let Some(headers) = response_headers {
                    headers.clear();
                }
                continue;
            }

            let skipped = |name: &String| self.skip_names.iter().any(|n| n.eq_ignore_ascii_case(name));
            result.request.headers.retain(|name, _| !skipped(name));
            if let Some(headers) = response_headers {
                headers.retain(|name, _| !skipped(name));
            }
        }
    }
}

/// Write every configured report. All output directories are checked
/// before the first file is written.
pub fn write_reports(targets: &ReportTargets, output: &RunOutput, redaction: &Redaction) -> Result<()> {
    let entries = targets.entries();
    if entries.is_empty() {
        return Ok(());
    }

    for (_, path) in &entries {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        if !dir.is_dir() {
            return Err(RunnerError::MissingOutputDir(dir.display().to_string()));
        }
    }

    let mut redacted = output.clone();
    redaction.apply(&mut redacted.results);

    for (format, path) in entries {
        match format {
            ReportFormat::Json => write_json(&redacted, path)?,
            ReportFormat::JUnit => write_junit(&redacted, path)?,
            ReportFormat::Html => html::write_html(&redacted, path)?,
        }
        info!(format = ?format, path = %path.display(), "Wrote report");
    }
    Ok(())
}

fn write_json(output: &RunOutput, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(output)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn write_junit(output: &RunOutput, path: &Path) -> Result<()> {
    let report = junit_report(&output.results);
    let file = File::create(path)?;
    report
        .write_xml(file)
        .map_err(|e| RunnerError::Io(std::io::Error::other(format!("Failed to write JUnit XML: {}", e))))
}

/// One test suite per request; assertions and tests become test cases
pub fn junit_report(results: &[RunResult]) -> Report {
    let mut report = Report::new();

    for result in results {
        let mut suite = TestSuite::new(&result.path);
        suite.set_timestamp(OffsetDateTime::now_utc());
        let duration = Duration::seconds_f64(result.runtime);
        let classname = result.request.url.clone();

        if result.skipped {
            let mut tc = TestCase::skipped(&result.name);
            tc.set_classname(&classname);
            suite.add_testcase(tc);
            report.add_testsuite(suite);
            continue;
        }

        for assertion in &result.assertion_results {
            let name = format!("{} {}", assertion.lhs_expr, assertion.rhs_expr);
            let mut tc = match &assertion.error {
                Some(error) if !assertion.passed() => TestCase::failure(&name, duration, "failure", error),
                _ => TestCase::success(&name, duration),
            };
            tc.set_classname(&classname);
            suite.add_testcase(tc);
        }

        let tests = result
            .pre_request_test_results
            .iter()
            .chain(&result.post_response_test_results)
            .chain(&result.test_results);
        for test in tests {
            let mut tc = if test.passed() {
                TestCase::success(&test.description, duration)
            } else {
                TestCase::failure(
                    &test.description,
                    duration,
                    "failure",
                    test.error.as_deref().unwrap_or("test failed"),
                )
            };
            tc.set_classname(&classname);
            suite.add_testcase(tc);
        }

        if let Some(error) = &result.error {
            let mut tc = TestCase::error("Test suite has no errors", duration, "error", error);
            tc.set_classname(&classname);
            suite.add_testcase(tc);
        }

        suite.set_system_out(&system_out(result));
        report.add_testsuite(suite);
    }

    report
}

/// Request and response dump for a suite's system-out
fn system_out(result: &RunResult) -> String {
    let mut out = format!("{} {}\n", result.request.method, result.request.url);
    for (name, value) in &result.request.headers {
        out.push_str(&format!("{}: {}\n", name, value));
    }
    if !result.request.body.is_null() {
        out.push('\n');
        out.push_str(&render_body(&result.request.body));
        out.push('\n');
    }

    if let Some(response) = &result.response {
        out.push_str(&format!("\n{} {}\n", response.status, response.status_text));
        for (name, value) in &response.headers {
            out.push_str(&format!("{}: {}\n", name, value));
        }
        if !response.body.is_null() {
            out.push('\n');
            out.push_str(&render_body(&response.body));
            out.push('\n');
        }
    }
    out
}

fn render_body(body: &serde_json::Value) -> String {
    match body {
        serde_json::Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ResponseSnapshot;
    use crate::pipeline::result::RequestSnapshot;
    use crate::pipeline::runner::RunEnd;
    use crate::pipeline::summary::RunSummary;
    use crate::scripting::{TestResult, TestStatus};
    use indexmap::IndexMap;
    use serde_json::json;

    fn result_with_headers() -> RunResult {
        let mut result = RunResult::new("get user", "users/get user");
        result.request = RequestSnapshot {
            method: "GET".into(),
            url: "http://localhost/users/1".into(),
            headers: IndexMap::from([
                ("Authorization".to_string(), "Bearer secret".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ]),
            body: json!(null),
        };
        result.response = Some(ResponseSnapshot {
            status: 200,
            status_text: "OK".into(),
            headers: IndexMap::from([("set-cookie".to_string(), "sid=1".to_string())]),
            body: json!({"id": 1}),
            response_time: 5,
            size: 8,
        });
        result.test_results.push(TestResult {
            description: "has id".into(),
            status: TestStatus::Pass,
            error: None,
        });
        result.settle();
        result
    }

    fn output(results: Vec<RunResult>) -> RunOutput {
        RunOutput {
            summary: RunSummary::from_results(&results),
            results,
            end: RunEnd::Completed,
        }
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(ReportFormat::parse("JUnit").unwrap(), ReportFormat::JUnit);
        assert!(matches!(
            ReportFormat::parse("xml"),
            Err(RunnerError::UnknownReportFormat(name)) if name == "xml"
        ));
    }

    #[test]
    fn test_redact_named_headers() {
        let mut results = vec![result_with_headers()];
        let redaction = Redaction {
            skip_all: false,
            skip_names: vec!["authorization".into(), "Set-Cookie".into()],
        };
        redaction.apply(&mut results);
        assert!(!results[0].request.headers.contains_key("Authorization"));
        assert!(results[0].request.headers.contains_key("Accept"));
        assert!(results[0].response.as_ref().unwrap().headers.is_empty());
    }

    #[test]
    fn test_redact_all_headers() {
        let mut results = vec![result_with_headers()];
        Redaction {
            skip_all: true,
            skip_names: vec![],
        }
        .apply(&mut results);
        assert!(results[0].request.headers.is_empty());
    }

    #[test]
    fn test_missing_output_dir_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("out.json");
        let targets = ReportTargets {
            json: Some(json_path.clone()),
            junit: Some(dir.path().join("missing/out.xml")),
            html: None,
        };
        let err = write_reports(&targets, &output(vec![]), &Redaction::default()).unwrap_err();
        assert!(matches!(err, RunnerError::MissingOutputDir(_)));
        assert!(!json_path.exists());
    }

    #[test]
    fn test_reports_keep_original_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let targets = ReportTargets {
            json: Some(dir.path().join("out.json")),
            junit: Some(dir.path().join("out.xml")),
            html: Some(dir.path().join("out.html")),
        };
        let run = output(vec![result_with_headers()]);
        let redaction = Redaction {
            skip_all: false,
            skip_names: vec!["authorization".into()],
        };
        write_reports(&targets, &run, &redaction).unwrap();

        let json = std::fs::read_to_string(dir.path().join("out.json")).unwrap();
        assert!(json.contains("\"summary\""));
        assert!(!json.contains("Bearer secret"));
        assert!(run.results[0].request.headers.contains_key("Authorization"));

        let xml = std::fs::read_to_string(dir.path().join("out.xml")).unwrap();
        assert!(xml.contains("users/get user"));
        assert!(xml.contains("has id"));

        let html = std::fs::read_to_string(dir.path().join("out.html")).unwrap();
        assert!(html.contains("get user"));
    }

    #[test]
    fn test_junit_suite_per_request() {
        let mut failing = RunResult::new("create", "users/create");
        failing.error = Some("connect ECONNREFUSED".into());
        failing.settle();
        let skipped = RunResult::skipped("delete", "users/delete", RequestSnapshot::default());

        let report = junit_report(&[result_with_headers(), failing, skipped]);
        let mut xml = Vec::new();
        report.write_xml(&mut xml).unwrap();
        let xml = String::from_utf8(xml).unwrap();

        assert_eq!(xml.matches("<testsuite ").count(), 3);
        assert!(xml.contains("Test suite has no errors"));
        assert!(xml.contains("<skipped"));
    }
}
