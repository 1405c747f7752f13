//! Collection run loop
//!
//! Walks the call stack one request at a time. After each request the loop
//! applies the delay, then decides where to go next: bail on failure, stop
//! when a script asked for it, follow a `setNextRequest` jump, or advance.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::executor::Session;
use super::options::RunOptions;
use super::result::{FlowControl, RequestSnapshot, RunResult};
use super::summary::RunSummary;
use crate::collection::RequestItem;
use crate::errors::{Result, RunnerError};
use crate::resolve::resolve;
use crate::signals;

/// Jumps allowed in one run before it is treated as an infinite loop
pub const MAX_JUMPS: usize = 10_000;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunEnd {
    /// Every remaining request ran
    Completed,
    /// A script called `setNextRequest(null)`
    CompletedByJump,
    StoppedByScript,
    StoppedOnFailure,
    /// Ctrl+C arrived; the request in flight finished first
    Interrupted,
}

/// Results of a run, as handed to reporters
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub summary: RunSummary,
    pub results: Vec<RunResult>,
    #[serde(skip)]
    pub end: RunEnd,
}

/// Progress notifications
#[derive(Debug)]
pub enum RunEvent<'a> {
    Started {
        total: usize,
    },
    ItemFinished {
        index: usize,
        total: usize,
        result: &'a RunResult,
    },
    Finished {
        summary: &'a RunSummary,
        end: RunEnd,
    },
}

pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: &RunEvent<'_>);
}

pub struct Runner {
    session: Arc<Session>,
    options: RunOptions,
    observer: Option<Arc<dyn RunObserver>>,
}

impl Runner {
    pub fn new(session: Arc<Session>, options: RunOptions) -> Self {
        Runner {
            session,
            options,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn emit(&self, event: RunEvent<'_>) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }

    /// Requests this run would execute, in order
    pub fn call_stack(&self) -> Result<Vec<&RequestItem>> {
        self.session
            .collection()
            .call_stack(&self.options.call_stack_paths, self.options.recursive)
    }

    pub async fn run(&self) -> Result<RunOutput> {
        let stack = self.call_stack()?;
        let mut results = Vec::new();

        let items: Vec<&RequestItem> = if self.options.tests_only {
            let (with_tests, without): (Vec<&RequestItem>, Vec<&RequestItem>) =
                stack.into_iter().partition(|item| item.has_tests());
            results.extend(without.into_iter().map(skipped_result));
            with_tests
        } else {
            stack
        };

        // Configuration errors abort before anything is sent
        for item in &items {
            resolve(self.session.collection(), item)?;
        }

        info!(
            collection = %self.session.collection().name,
            requests = items.len(),
            sandbox = %self.session.sandbox(),
            "Starting run"
        );
        self.emit(RunEvent::Started { total: items.len() });

        let delay = self.options.delay();
        let mut index = 0;
        let mut jumps = 0;
        let mut end = RunEnd::Completed;

        while index < items.len() {
            if signals::was_interrupted() {
                warn!("Run interrupted, skipping remaining requests");
                end = RunEnd::Interrupted;
                break;
            }
            let item = items[index];
            let executed = self.session.execute(item).await?;

            let is_last = index + 1 == items.len();
            match delay {
                Ok(Some(pause)) if !is_last => {
                    info!("Waiting for {}ms before next request", pause.as_millis());
                    tokio::time::sleep(pause).await;
                }
                Err(()) if !is_last => warn!("Ignoring delay because it's not a valid number"),
                _ => {}
            }

            info!(
                request = %executed.result.path,
                status = ?executed.result.status,
                "Request finished"
            );
            let failed = executed.result.is_failure();
            results.push(executed.result);
            if let Some(result) = results.last() {
                self.emit(RunEvent::ItemFinished {
                    index,
                    total: items.len(),
                    result,
                });
            }

            let flow = if self.options.bail && failed {
                FlowControl::StopOnFailure
            } else {
                executed.flow
            };

            match flow {
                FlowControl::Continue => index += 1,
                FlowControl::StopOnFailure => {
                    end = RunEnd::StoppedOnFailure;
                    break;
                }
                FlowControl::Stop => {
                    end = RunEnd::StoppedByScript;
                    break;
                }
                FlowControl::Halt => {
                    count_jump(&mut jumps)?;
                    end = RunEnd::CompletedByJump;
                    break;
                }
                FlowControl::JumpTo(name) => {
                    count_jump(&mut jumps)?;
                    match items.iter().position(|candidate| candidate.name == name) {
                        Some(target) => index = target,
                        None => {
                            error!("Could not find request with name '{}'", name);
                            index += 1;
                        }
                    }
                }
            }
        }

        let summary = RunSummary::from_results(&results);
        info!(
            total = summary.total_requests,
            passed = summary.passed_requests,
            failed = summary.failed_requests,
            errors = summary.error_requests,
            end = ?end,
            "Run finished"
        );
        self.emit(RunEvent::Finished {
            summary: &summary,
            end,
        });

        Ok(RunOutput {
            summary,
            results,
            end,
        })
    }
}

fn count_jump(jumps: &mut usize) -> Result<()> {
    *jumps += 1;
    if *jumps > MAX_JUMPS {
        return Err(RunnerError::InfiniteLoop(*jumps));
    }
    Ok(())
}

fn skipped_result(item: &RequestItem) -> RunResult {
    let request = RequestSnapshot {
        method: item.request.method.clone(),
        url: item.request.url.clone(),
        headers: item
            .request
            .headers
            .iter()
            .filter(|h| h.enabled)
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect(),
        body: serde_json::Value::Null,
    };
    RunResult::skipped(&item.name, &item.path, request)
}
