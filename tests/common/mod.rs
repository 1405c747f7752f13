//! Shared fixtures for pulse-runner integration tests
//!
//! - `MockTransport`: an in-memory transport that records every request
//! - collection document builders written to a temp directory
//! - helpers that wire a `Runner` to the mock transport

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Value};
use tempfile::TempDir;

use pulse_runner::auth::CredentialStore;
use pulse_runner::client::{ResponseSnapshot, Transport};
use pulse_runner::pipeline::{prepare_runner_with, RunOptions, Runner};
use pulse_runner::request::WireRequest;
use pulse_runner::Result;

/// Answers every request with a canned response and keeps the requests
pub struct MockTransport {
    sent: Mutex<Vec<WireRequest>>,
    /// Status per URL suffix; anything else gets 200
    statuses: Mutex<Vec<(String, u16)>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(MockTransport {
            sent: Mutex::new(Vec::new()),
            statuses: Mutex::new(Vec::new()),
        })
    }

    pub fn respond_with(&self, url_suffix: &str, status: u16) {
        self.statuses.lock().unwrap().push((url_suffix.to_string(), status));
    }

    pub fn sent(&self) -> Vec<WireRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_urls(&self) -> Vec<String> {
        self.sent().into_iter().map(|r| r.url).collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &WireRequest) -> Result<ResponseSnapshot> {
        self.sent.lock().unwrap().push(request.clone());
        let status = self
            .statuses
            .lock()
            .unwrap()
            .iter()
            .find(|(suffix, _)| request.url.ends_with(suffix.as_str()))
            .map(|(_, status)| *status)
            .unwrap_or(200);

        Ok(ResponseSnapshot {
            status,
            status_text: if status == 200 { "OK".into() } else { "Error".into() },
            headers: IndexMap::from([("content-type".to_string(), "application/json".to_string())]),
            body: json!({"url": request.url, "method": request.method}),
            response_time: 1,
            size: 0,
        })
    }
}

/// A request node with the given extra `request` fields merged in
pub fn request(name: &str, url: &str, extra: Value) -> Value {
    let mut def = json!({"method": "GET", "url": url});
    if let (Some(def), Some(extra)) = (def.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            def.insert(key.clone(), value.clone());
        }
    }
    json!({"type": "request", "name": name, "request": def})
}

pub fn sequenced(mut item: Value, seq: i64) -> Value {
    item["seq"] = json!(seq);
    item
}

pub fn folder(name: &str, items: Vec<Value>) -> Value {
    json!({"type": "folder", "name": name, "items": items})
}

/// Write a collection document and return its directory and path
pub fn write_collection(items: Vec<Value>) -> (TempDir, PathBuf) {
    write_collection_doc(json!({"name": "fixture", "items": items}))
}

pub fn write_collection_doc(doc: Value) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("collection.json");
    std::fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();
    (dir, path)
}

/// Runner over a collection document, talking to `transport`
pub fn runner(path: &PathBuf, options: RunOptions, transport: Arc<MockTransport>) -> Runner {
    prepare_runner_with(path, &options, transport, Arc::new(CredentialStore::new())).unwrap()
}

/// Items numbered 1..=n, each hitting `/n`
pub fn numbered_requests(n: usize) -> Vec<Value> {
    (1..=n)
        .map(|i| sequenced(request(&format!("r{}", i), &format!("http://api.test/{}", i), json!({})), i as i64))
        .collect()
}
