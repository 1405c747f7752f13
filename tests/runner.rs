//! Run loop behavior: ordering, bail, jumps, loop guard, delay and the
//! tests-only filter
mod common;

use std::time::{Duration, Instant};

use serde_json::json;

use common::{folder, numbered_requests, request, runner, sequenced, write_collection, write_collection_doc, MockTransport};
use pulse_runner::pipeline::{RunEnd, RunOptions, RunStatus};
use pulse_runner::scripting::SandboxMode;
use pulse_runner::RunnerError;

fn safe_options() -> RunOptions {
    RunOptions {
        sandbox: SandboxMode::Safe,
        ..RunOptions::default()
    }
}

fn with_script(mut items: Vec<serde_json::Value>, index: usize, slot: &str, script: &str) -> Vec<serde_json::Value> {
    items[index]["request"]["script"][slot] = json!(script);
    items
}

#[tokio::test]
async fn test_runs_in_sequence_order() {
    let items = vec![
        sequenced(request("second", "http://api.test/2", json!({})), 2),
        sequenced(request("first", "http://api.test/1", json!({})), 1),
        sequenced(request("third", "http://api.test/3", json!({})), 3),
    ];
    let (_dir, path) = write_collection(items);
    let transport = MockTransport::new();

    let output = runner(&path, safe_options(), transport.clone()).run().await.unwrap();

    assert_eq!(
        transport.sent_urls(),
        vec!["http://api.test/1", "http://api.test/2", "http://api.test/3"]
    );
    assert_eq!(output.end, RunEnd::Completed);
    assert_eq!(output.summary.total_requests, 3);
    assert_eq!(output.summary.passed_requests, 3);
}

#[tokio::test]
async fn test_bail_stops_after_failure() {
    let mut items = numbered_requests(3);
    items[1]["request"]["assertions"] = json!([{"name": "res.status", "value": "eq 200"}]);

    let (_dir, path) = write_collection(items.clone());
    let transport = MockTransport::new();
    transport.respond_with("/2", 500);
    let options = RunOptions {
        bail: true,
        ..safe_options()
    };
    let output = runner(&path, options, transport.clone()).run().await.unwrap();

    assert_eq!(transport.sent().len(), 2);
    assert_eq!(output.end, RunEnd::StoppedOnFailure);
    assert_eq!(output.results[1].status, RunStatus::Fail);
    assert_eq!(output.summary.failed_assertions, 1);

    let (_dir, path) = write_collection(items);
    let transport = MockTransport::new();
    transport.respond_with("/2", 500);
    let output = runner(&path, safe_options(), transport.clone()).run().await.unwrap();
    assert_eq!(transport.sent().len(), 3);
    assert_eq!(output.end, RunEnd::Completed);
}

#[tokio::test]
async fn test_jump_to_named_request() {
    let items = with_script(numbered_requests(3), 0, "res", "bru.setNextRequest('r3');");
    let (_dir, path) = write_collection(items);
    let transport = MockTransport::new();

    let output = runner(&path, safe_options(), transport.clone()).run().await.unwrap();

    assert_eq!(transport.sent_urls(), vec!["http://api.test/1", "http://api.test/3"]);
    assert_eq!(output.results.len(), 2);
}

#[tokio::test]
async fn test_jump_to_null_ends_run() {
    let items = with_script(numbered_requests(3), 0, "res", "bru.runner.setNextRequest(null);");
    let (_dir, path) = write_collection(items);
    let transport = MockTransport::new();

    let output = runner(&path, safe_options(), transport.clone()).run().await.unwrap();

    assert_eq!(transport.sent().len(), 1);
    assert_eq!(output.end, RunEnd::CompletedByJump);
}

#[tokio::test]
async fn test_unknown_jump_target_advances() {
    let items = with_script(numbered_requests(2), 0, "res", "bru.setNextRequest('nope');");
    let (_dir, path) = write_collection(items);
    let transport = MockTransport::new();

    let output = runner(&path, safe_options(), transport.clone()).run().await.unwrap();

    assert_eq!(transport.sent().len(), 2);
    assert_eq!(output.end, RunEnd::Completed);
}

#[tokio::test]
async fn test_stop_execution() {
    let items = with_script(numbered_requests(3), 1, "req", "bru.runner.stopExecution();");
    let (_dir, path) = write_collection(items);
    let transport = MockTransport::new();

    let output = runner(&path, safe_options(), transport.clone()).run().await.unwrap();

    assert_eq!(output.end, RunEnd::StoppedByScript);
    assert_eq!(output.results.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_self_jump_trips_loop_guard() {
    let items = with_script(numbered_requests(1), 0, "res", "bru.setNextRequest('r1');");
    let (_dir, path) = write_collection(items);
    let transport = MockTransport::new();

    let err = runner(&path, safe_options(), transport.clone()).run().await.unwrap_err();

    assert!(matches!(err, RunnerError::InfiniteLoop(_)));
    assert_eq!(err.exit_status().code(), 5);
}

#[tokio::test]
async fn test_delay_between_requests() {
    let (_dir, path) = write_collection(numbered_requests(3));
    let options = RunOptions {
        delay_ms: Some(60.0),
        ..safe_options()
    };

    let started = Instant::now();
    runner(&path, options, MockTransport::new()).run().await.unwrap();

    // Two pauses: none after the last request
    assert!(started.elapsed() >= Duration::from_millis(120));
}

#[tokio::test]
async fn test_invalid_delay_is_ignored() {
    let (_dir, path) = write_collection(numbered_requests(2));
    let options = RunOptions {
        delay_ms: Some(-10.0),
        ..safe_options()
    };
    let transport = MockTransport::new();

    let output = runner(&path, options, transport.clone()).run().await.unwrap();
    assert_eq!(transport.sent().len(), 2);
    assert_eq!(output.summary.passed_requests, 2);
}

#[tokio::test]
async fn test_tests_only_skips_untested_requests() {
    let mut items = numbered_requests(3);
    items[1]["request"]["tests"] = json!("test('ok', () => expect(res.status).to.equal(200));");
    let (_dir, path) = write_collection(items);
    let transport = MockTransport::new();
    let options = RunOptions {
        tests_only: true,
        ..safe_options()
    };

    let output = runner(&path, options, transport.clone()).run().await.unwrap();

    assert_eq!(transport.sent_urls(), vec!["http://api.test/2"]);
    let statuses: Vec<RunStatus> = output.results.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![RunStatus::Skipped, RunStatus::Skipped, RunStatus::Pass]);
    assert_eq!(output.summary.skipped_requests, 2);
    assert_eq!(output.summary.passed_tests, 1);
}

#[tokio::test]
async fn test_skip_request_from_script() {
    let items = with_script(numbered_requests(2), 0, "req", "bru.runner.skipRequest();");
    let (_dir, path) = write_collection(items);
    let transport = MockTransport::new();

    let output = runner(&path, safe_options(), transport.clone()).run().await.unwrap();

    assert_eq!(transport.sent_urls(), vec!["http://api.test/2"]);
    assert_eq!(output.results[0].status, RunStatus::Skipped);
    assert!(!output.summary.has_failures());
}

#[tokio::test]
async fn test_post_response_vars_feed_later_requests() {
    let mut items = numbered_requests(2);
    items[0]["request"]["vars"] = json!({"res": [{"name": "verb", "value": "res.body.method"}]});
    items[1]["request"]["url"] = json!("http://api.test/{{verb}}");
    let (_dir, path) = write_collection(items);
    let transport = MockTransport::new();

    runner(&path, safe_options(), transport.clone()).run().await.unwrap();

    assert_eq!(transport.sent_urls()[1], "http://api.test/GET");
}

#[tokio::test]
async fn test_script_errors_do_not_abort_the_run() {
    let items = with_script(numbered_requests(2), 0, "res", "throw new Error('boom');");
    let (_dir, path) = write_collection(items);
    let transport = MockTransport::new();

    let output = runner(&path, safe_options(), transport.clone()).run().await.unwrap();

    assert_eq!(transport.sent().len(), 2);
    assert_eq!(output.results[0].status, RunStatus::Error);
    assert!(output.results[0].error.as_deref().unwrap_or_default().contains("boom"));
    assert!(output.results[0].response.is_some());
    assert_eq!(output.results[1].status, RunStatus::Pass);
}

#[tokio::test]
async fn test_environment_and_overrides() {
    let doc = json!({
        "name": "fixture",
        "environments": [{
            "name": "local",
            "variables": [
                {"name": "host", "value": "http://local.test"},
                {"name": "version", "value": "v1"}
            ]
        }],
        "items": [request("get", "{{host}}/{{version}}/users", json!({}))]
    });
    let (_dir, path) = write_collection_doc(doc);
    let transport = MockTransport::new();
    let options = RunOptions {
        env_name: Some("local".into()),
        env_overrides: vec!["version=v2".into()],
        ..safe_options()
    };

    runner(&path, options, transport.clone()).run().await.unwrap();

    assert_eq!(transport.sent_urls(), vec!["http://local.test/v2/users"]);
}

#[tokio::test]
async fn test_global_environment_sits_below_selected_environment() {
    let doc = json!({
        "name": "fixture",
        "environments": [{
            "name": "local",
            "variables": [{"name": "host", "value": "http://local.test"}]
        }],
        "items": [request("get", "{{host}}/{{tenant}}", json!({}))]
    });
    let (dir, path) = write_collection_doc(doc);
    let global = dir.path().join("global.json");
    std::fs::write(&global, r#"{"host": "http://global.test", "tenant": "acme"}"#).unwrap();

    let transport = MockTransport::new();
    let options = RunOptions {
        env_name: Some("local".into()),
        global_env_file: Some(global),
        ..safe_options()
    };

    runner(&path, options, transport.clone()).run().await.unwrap();

    assert_eq!(transport.sent_urls(), vec!["http://local.test/acme"]);
}

#[tokio::test]
async fn test_call_stack_paths_select_folder() {
    let items = vec![
        folder("users", vec![request("list", "http://api.test/users", json!({}))]),
        request("health", "http://api.test/health", json!({})),
    ];
    let (_dir, path) = write_collection(items);
    let transport = MockTransport::new();
    let options = RunOptions {
        call_stack_paths: vec!["users".into()],
        ..safe_options()
    };

    let output = runner(&path, options, transport.clone()).run().await.unwrap();

    assert_eq!(transport.sent_urls(), vec!["http://api.test/users"]);
    assert_eq!(output.results[0].path, "users/list");
}

#[tokio::test]
async fn test_broken_folder_aborts_before_sending() {
    let mut broken = folder("b", vec![request("r2", "http://api.test/2", json!({}))]);
    broken["error"] = json!("unexpected token at line 3");
    let items = vec![
        folder("a", vec![request("r1", "http://api.test/1", json!({}))]),
        broken,
    ];
    let (_dir, path) = write_collection(items);
    let transport = MockTransport::new();
    let options = RunOptions {
        recursive: true,
        ..safe_options()
    };

    let err = runner(&path, options, transport.clone()).run().await.unwrap_err();

    assert!(matches!(err, RunnerError::Collection(message) if message.contains("unexpected token")));
    assert!(transport.sent_urls().is_empty());
}

#[tokio::test]
async fn test_unknown_path_is_fatal() {
    let (_dir, path) = write_collection(numbered_requests(1));
    let options = RunOptions {
        call_stack_paths: vec!["missing".into()],
        ..safe_options()
    };

    let err = runner(&path, options, MockTransport::new()).run().await.unwrap_err();
    assert!(matches!(err, RunnerError::PathNotFound(_)));
}
