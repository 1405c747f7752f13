//! Wire requests
//!
//! A [`WireRequest`] is the transport-ready description of one request:
//! method, URL, ordered headers, body payload and the auth material the
//! transport still has to apply. [`builder`] produces it from a resolved
//! request; interpolation then fills in every placeholder.

mod builder;
pub mod curl;
pub mod json;

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use crate::collection::{AwsV4Auth, DigestAuth, NtlmAuth, OAuth1Auth, OAuth2Auth, ProxyConfig, WsseAuth};

pub use builder::{materialize, STREAM_THRESHOLD};

/// Transport-ready request descriptor
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest {
    pub method: String,
    pub url: String,
    pub headers: IndexMap<String, String>,
    pub body: WireBody,
    pub auth: WireAuth,
    /// Path parameters substituted into the URL after interpolation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path_params: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    #[serde(skip)]
    pub encode_url: bool,
}

impl WireRequest {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Set a header, replacing any existing one regardless of case
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.remove_header(name);
        self.headers.insert(name.to_string(), value.into());
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
    }
}

/// Body payload
#[derive(Debug, Clone, Default, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum WireBody {
    #[default]
    None,
    /// JSON document text; kept as text so placeholders survive until
    /// interpolation
    Json(String),
    Text(String),
    Form(Vec<(String, String)>),
    Multipart(Vec<WirePart>),
    File(FilePayload),
}

impl WireBody {
    /// Textual form of the payload, as far as one exists
    pub fn as_text(&self) -> Option<String> {
        match self {
            WireBody::None => None,
            WireBody::Json(text) | WireBody::Text(text) => Some(text.clone()),
            WireBody::Form(pairs) => Some(
                pairs
                    .iter()
                    .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&"),
            ),
            WireBody::Multipart(_) | WireBody::File(_) => None,
        }
    }
}

/// One part of a multipart body
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WirePart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        path: PathBuf,
        content_type: Option<String>,
    },
}

/// A file sent as the whole body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePayload {
    pub path: PathBuf,
    pub content_type: String,
    pub size: u64,
    /// Above the stream threshold the file is streamed instead of buffered
    pub streamed: bool,
}

/// Auth material applied by the transport
#[derive(Debug, Clone, Default, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum WireAuth {
    #[default]
    None,
    /// Converted into an `Authorization` header during interpolation
    Basic { username: String, password: String },
    /// Converted into an `X-WSSE` header during interpolation
    Wsse(WsseAuth),
    Awsv4(AwsV4Auth),
    Digest(DigestAuth),
    Ntlm(NtlmAuth),
    /// Signed by the transport once the final URL and body are known
    Oauth1(OAuth1Auth),
    Oauth2(OAuth2Auth),
}
