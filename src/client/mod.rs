//! HTTP transport
//!
//! The run loop talks to the network only through the [`Transport`] trait.
//! [`ReqwestTransport`] is the production implementation; tests plug in
//! their own.

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Result;
use crate::request::WireRequest;

pub use http::{ReqwestTransport, USER_AGENT_STRING};

/// Performs one wire request
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &WireRequest) -> Result<ResponseSnapshot>;
}

/// What came back from the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSnapshot {
    pub status: u16,
    pub status_text: String,
    /// Lowercase names; repeated headers are joined with `, `
    pub headers: IndexMap<String, String>,
    /// Parsed JSON when the payload is JSON, the raw text otherwise
    pub body: Value,
    /// Milliseconds from dispatch to the last body byte
    pub response_time: u64,
    #[serde(default)]
    pub size: usize,
}

impl ResponseSnapshot {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Body value for a raw payload: JSON when it parses, text otherwise
pub fn parse_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Client-wide transport settings
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Skip TLS certificate verification
    pub insecure: bool,
    /// Used when a request carries no timeout of its own
    pub timeout: Option<Duration>,
    pub max_redirects: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        TransportOptions {
            insecure: false,
            timeout: None,
            max_redirects: 5,
        }
    }
}
