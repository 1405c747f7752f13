//! Ctrl+C handling: the run loop stops before the next request
mod common;

use common::{numbered_requests, runner, write_collection, MockTransport};
use pulse_runner::pipeline::{RunEnd, RunOptions};
use pulse_runner::scripting::SandboxMode;
use pulse_runner::signals;

#[tokio::test]
async fn test_interrupted_run_ends_early() {
    let (_dir, path) = write_collection(numbered_requests(3));
    let transport = MockTransport::new();
    let options = RunOptions {
        sandbox: SandboxMode::Safe,
        ..RunOptions::default()
    };

    signals::set_interrupted();
    let output = runner(&path, options, transport.clone()).run().await.unwrap();
    signals::reset_interrupted();

    assert_eq!(output.end, RunEnd::Interrupted);
    assert!(output.results.is_empty());
    assert!(transport.sent().is_empty());
}
