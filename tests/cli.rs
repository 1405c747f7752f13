//! Binary behavior: subcommands, progress output and exit codes
mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{folder, request, write_collection, write_collection_doc};

/// Nothing listens on the discard port
const UNREACHABLE: &str = "http://127.0.0.1:9";

fn pulse_runner(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pulse-runner").unwrap();
    cmd.env("PULSE_RUNNER_CONFIG_DIR", config_dir.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_list_prints_call_stack() {
    let config = tempfile::tempdir().unwrap();
    let (_dir, collection) = write_collection(vec![
        folder("users", vec![request("create", "{{host}}/users", json!({"method": "POST"}))]),
        request("health", "{{host}}/health", json!({})),
    ]);

    pulse_runner(&config)
        .args(["list", "-r"])
        .arg(&collection)
        .assert()
        .success()
        .stdout(predicate::str::contains("POST users/create"))
        .stdout(predicate::str::contains("GET health"));
}

#[test]
fn test_curl_preview_interpolates() {
    let config = tempfile::tempdir().unwrap();
    let (_dir, collection) = write_collection(vec![request(
        "health",
        "{{host}}/health",
        json!({"headers": [{"name": "X-Env", "value": "{{stage}}"}]}),
    )]);

    pulse_runner(&config)
        .arg("curl")
        .arg(&collection)
        .arg("health")
        .args(["--env-var", "host=http://api.test", "--env-var", "stage=dev"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("curl"))
        .stdout(predicate::str::contains("http://api.test/health"))
        .stdout(predicate::str::contains("X-Env: dev"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_successful_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let config = tempfile::tempdir().unwrap();
    let (dir, collection) = write_collection(vec![request(
        "health",
        "{{host}}/health",
        json!({
            "assertions": [{"name": "res.body.ok", "value": "isTruthy"}],
            "tests": "test('is ok', () => expect(res.status).to.equal(200));"
        }),
    )]);
    let report = dir.path().join("report.json");

    pulse_runner(&config)
        .arg("run")
        .arg(&collection)
        .args(["--env-var", &format!("host={}", server.uri()), "--sandbox", "safe"])
        .arg("--reporter-json")
        .arg(&report)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("✓ health (200 OK)"))
        .stdout(predicate::str::contains("Requests"));

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(written["summary"]["passedTests"], 1);
}

#[test]
fn test_failed_request_exits_one() {
    let config = tempfile::tempdir().unwrap();
    let (_dir, collection) = write_collection(vec![request("down", &format!("{}/down", UNREACHABLE), json!({}))]);

    pulse_runner(&config)
        .arg("run")
        .arg(&collection)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("✗ down"));
}

#[test]
fn test_unknown_path_exits_four() {
    let config = tempfile::tempdir().unwrap();
    let (_dir, collection) = write_collection(vec![request("a", UNREACHABLE, json!({}))]);

    pulse_runner(&config)
        .arg("run")
        .arg(&collection)
        .arg("missing")
        .assert()
        .code(4);
}

#[test]
fn test_environment_errors() {
    let config = tempfile::tempdir().unwrap();
    let (dir, collection) = write_collection_doc(json!({
        "name": "fixture",
        "environments": [{"name": "local", "variables": []}],
        "items": [request("a", UNREACHABLE, json!({}))]
    }));
    let env_file = dir.path().join("env.json");
    std::fs::write(&env_file, "{}").unwrap();

    pulse_runner(&config)
        .arg("run")
        .arg(&collection)
        .args(["--env", "prod"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("prod"));

    pulse_runner(&config)
        .arg("run")
        .arg(&collection)
        .args(["--env", "local", "--env-file"])
        .arg(&env_file)
        .assert()
        .code(7);

    pulse_runner(&config)
        .arg("run")
        .arg(&collection)
        .args(["--env-var", "no-equals-sign"])
        .assert()
        .code(8);
}

#[test]
fn test_report_errors() {
    let config = tempfile::tempdir().unwrap();
    let (dir, collection) = write_collection(vec![request("a", UNREACHABLE, json!({}))]);

    pulse_runner(&config)
        .arg("run")
        .arg(&collection)
        .args(["-o", "out.xml", "-f", "xml"])
        .assert()
        .code(9);

    pulse_runner(&config)
        .arg("run")
        .arg(&collection)
        .arg("--reporter-junit")
        .arg(dir.path().join("missing/out.xml"))
        .assert()
        .code(2);
}

#[test]
fn test_config_defaults_apply() {
    let config = tempfile::tempdir().unwrap();
    std::fs::write(config.path().join("config.toml"), "[defaults]\nsandbox = \"safe\"\n").unwrap();
    let (_dir, collection) = write_collection(vec![request(
        "a",
        UNREACHABLE,
        json!({"script": {"req": "require('fs');"}}),
    )]);

    pulse_runner(&config)
        .arg("run")
        .arg(&collection)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("not available in safe mode"));
}
