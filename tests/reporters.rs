//! JSON, JUnit and HTML reports written from a real run
mod common;

use serde_json::{json, Value};

use common::{request, runner, write_collection, MockTransport};
use pulse_runner::pipeline::{write_reports, Redaction, ReportTargets, RunOptions};
use pulse_runner::scripting::SandboxMode;
use pulse_runner::RunnerError;

fn items() -> Vec<Value> {
    vec![
        request(
            "list users",
            "http://api.test/users",
            json!({
                "headers": [
                    {"name": "Authorization", "value": "Bearer secret-token"},
                    {"name": "Accept", "value": "application/json"}
                ],
                "assertions": [{"name": "res.status", "value": "eq 200"}],
                "tests": "test('lists users', () => expect(res.status).to.equal(200));"
            }),
        ),
        request(
            "broken",
            "http://api.test/broken",
            json!({"assertions": [{"name": "res.status", "value": "eq 201"}]}),
        ),
    ]
}

fn options() -> RunOptions {
    RunOptions {
        sandbox: SandboxMode::Safe,
        ..RunOptions::default()
    }
}

#[test]
fn test_all_reports_from_one_run() -> anyhow::Result<()> {
    let (_dir, path) = write_collection(items());
    let output = tokio_test::block_on(runner(&path, options(), MockTransport::new()).run())?;

    let out = tempfile::tempdir()?;
    let targets = ReportTargets {
        json: Some(out.path().join("results.json")),
        junit: Some(out.path().join("results.xml")),
        html: Some(out.path().join("results.html")),
    };
    let redaction = Redaction {
        skip_all: false,
        skip_names: vec!["authorization".into()],
    };
    write_reports(&targets, &output, &redaction)?;

    let json: Value = serde_json::from_str(&std::fs::read_to_string(out.path().join("results.json"))?)?;
    assert_eq!(json["summary"]["totalRequests"], 2);
    assert_eq!(json["summary"]["failedAssertions"], 1);
    assert_eq!(json["results"][0]["request"]["headers"]["Accept"], "application/json");
    assert!(json["results"][0]["request"]["headers"].get("Authorization").is_none());
    assert_eq!(json["results"][1]["assertionResults"][0]["error"], "expected 200 to equal 201");

    let xml = std::fs::read_to_string(out.path().join("results.xml"))?;
    assert_eq!(xml.matches("<testsuite ").count(), 2);
    assert!(xml.contains("lists users"));
    assert!(xml.contains("<failure"));
    assert!(!xml.contains("secret-token"));

    let html = std::fs::read_to_string(out.path().join("results.html"))?;
    assert!(html.contains("list users"));
    assert!(!html.contains("secret-token"));
    Ok(())
}

#[test]
fn test_skip_all_headers() -> anyhow::Result<()> {
    let (_dir, path) = write_collection(items());
    let output = tokio_test::block_on(runner(&path, options(), MockTransport::new()).run())?;

    let out = tempfile::tempdir()?;
    let targets = ReportTargets {
        json: Some(out.path().join("results.json")),
        ..ReportTargets::default()
    };
    let redaction = Redaction {
        skip_all: true,
        skip_names: vec![],
    };
    write_reports(&targets, &output, &redaction)?;

    let json: Value = serde_json::from_str(&std::fs::read_to_string(out.path().join("results.json"))?)?;
    assert_eq!(json["results"][0]["request"]["headers"], json!({}));
    assert_eq!(json["results"][0]["response"]["headers"], json!({}));
    Ok(())
}

#[test]
fn test_missing_output_directory() -> anyhow::Result<()> {
    let (_dir, path) = write_collection(items());
    let output = tokio_test::block_on(runner(&path, options(), MockTransport::new()).run())?;

    let out = tempfile::tempdir()?;
    let targets = ReportTargets {
        html: Some(out.path().join("nested/missing/report.html")),
        ..ReportTargets::default()
    };
    let err = write_reports(&targets, &output, &Redaction::default()).unwrap_err();
    assert!(matches!(err, RunnerError::MissingOutputDir(_)));
    assert_eq!(err.exit_status().code(), 2);
    Ok(())
}
