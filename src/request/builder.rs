//! Request materialization
//!
//! Turns a [`ResolvedRequest`] into a [`WireRequest`]: picks the body payload
//! for the body mode, defaults the content type, and maps the auth mode to
//! headers or to a config block for the transport. Nothing is sent and no
//! state is touched, so the same request can be materialized again for a
//! preview.

use std::fs;

use crate::auth;
use crate::collection::{Auth, BodyMode, Collection, MultipartKind, ParamKind, ApiKeyPlacement};
use crate::interpolate::has_placeholders;
use crate::resolve::ResolvedRequest;

use super::json::strip_comments;
use super::{FilePayload, WireAuth, WireBody, WirePart, WireRequest};

/// Files above this size (20 MiB) are streamed instead of buffered
pub const STREAM_THRESHOLD: u64 = 20 * 1024 * 1024;

const CONTENT_TYPE: &str = "content-type";

/// Build the wire request for a resolved request
pub fn materialize(resolved: &ResolvedRequest, collection: &Collection) -> WireRequest {
    let mut wire = WireRequest {
        method: if resolved.method.is_empty() {
            "GET".to_string()
        } else {
            resolved.method.clone()
        },
        url: resolved.url.trim().to_string(),
        headers: resolved.headers.clone(),
        body: WireBody::None,
        auth: WireAuth::None,
        path_params: resolved
            .params
            .iter()
            .filter(|p| p.enabled && p.kind == ParamKind::Path)
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect(),
        timeout_ms: resolved.timeout_ms,
        proxy: collection.proxy.clone().filter(|p| p.enabled),
        encode_url: resolved.settings.encode_url,
    };

    let (body, content_type) = build_body(resolved, collection);
    wire.body = body;
    if let Some(content_type) = content_type {
        if !wire.has_header(CONTENT_TYPE) {
            wire.headers.insert(CONTENT_TYPE.to_string(), content_type);
        }
    }

    apply_auth(&mut wire, &resolved.auth);
    wire
}

fn build_body(resolved: &ResolvedRequest, collection: &Collection) -> (WireBody, Option<String>) {
    let body = &resolved.body;
    let text = |value: &Option<String>| value.clone().unwrap_or_default();

    match body.mode {
        BodyMode::None => (WireBody::None, None),
        BodyMode::Json => (
            WireBody::Json(strip_comments(&text(&body.json))),
            Some("application/json".to_string()),
        ),
        BodyMode::Text => (WireBody::Text(text(&body.text)), Some("text/plain".to_string())),
        BodyMode::Xml => (WireBody::Text(text(&body.xml)), Some("application/xml".to_string())),
        BodyMode::Sparql => (
            WireBody::Text(text(&body.sparql)),
            Some("application/sparql-query".to_string()),
        ),
        BodyMode::FormUrlEncoded => (
            WireBody::Form(
                body.form_url_encoded
                    .iter()
                    .filter(|kv| kv.enabled)
                    .map(|kv| (kv.name.clone(), kv.value.clone()))
                    .collect(),
            ),
            Some("application/x-www-form-urlencoded".to_string()),
        ),
        BodyMode::MultipartForm => (
            WireBody::Multipart(
                body.multipart_form
                    .iter()
                    .filter(|f| f.enabled)
                    .map(|f| match f.kind {
                        MultipartKind::Text => WirePart::Text {
                            name: f.name.clone(),
                            value: f.value.clone(),
                        },
                        MultipartKind::File => WirePart::File {
                            name: f.name.clone(),
                            path: collection.base_dir.join(&f.value),
                            content_type: f.content_type.clone(),
                        },
                    })
                    .collect(),
            ),
            Some("multipart/form-data".to_string()),
        ),
        BodyMode::Graphql => {
            let graphql = body.graphql.clone().unwrap_or_default();
            let variables = strip_comments(&graphql.variables);
            let variables = if variables.trim().is_empty() {
                "{}".to_string()
            } else {
                variables
            };
            let query = serde_json::Value::String(graphql.query).to_string();
            (
                WireBody::Json(format!("{{\"query\":{},\"variables\":{}}}", query, variables.trim())),
                Some("application/json".to_string()),
            )
        }
        BodyMode::File => match body.file.iter().find(|f| f.selected) {
            None => (WireBody::None, None),
            Some(file) => {
                let path = collection.base_dir.join(&file.file_path);
                let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                let content_type = file
                    .content_type
                    .clone()
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                (
                    WireBody::File(FilePayload {
                        path,
                        content_type: content_type.clone(),
                        size,
                        streamed: size > STREAM_THRESHOLD,
                    }),
                    Some(content_type),
                )
            }
        },
    }
}

fn apply_auth(wire: &mut WireRequest, auth: &Auth) {
    wire.auth = match auth {
        Auth::None | Auth::Inherit => WireAuth::None,
        Auth::Basic(basic) => WireAuth::Basic {
            username: basic.username.clone(),
            password: basic.password.clone(),
        },
        Auth::Bearer(bearer) => {
            wire.set_header("Authorization", format!("Bearer {}", bearer.token));
            WireAuth::None
        }
        Auth::ApiKey(key) => {
            if !key.key.is_empty() {
                match key.placement {
                    ApiKeyPlacement::Header => wire.set_header(&key.key, key.value.clone()),
                    ApiKeyPlacement::QueryParams => {
                        let separator = if wire.url.contains('?') { '&' } else { '?' };
                        wire.url = format!("{}{}{}={}", wire.url, separator, key.key, key.value);
                    }
                }
            }
            WireAuth::None
        }
        Auth::Wsse(wsse) => {
            if has_placeholders(&wsse.username) || has_placeholders(&wsse.password) {
                WireAuth::Wsse(wsse.clone())
            } else {
                wire.set_header("X-WSSE", auth::wsse_header(&wsse.username, &wsse.password));
                WireAuth::None
            }
        }
        Auth::Awsv4(aws) => WireAuth::Awsv4(aws.clone()),
        Auth::Digest(digest) => WireAuth::Digest(digest.clone()),
        Auth::Ntlm(ntlm) => WireAuth::Ntlm(ntlm.clone()),
        Auth::Oauth1(oauth1) => WireAuth::Oauth1(oauth1.clone()),
        Auth::Oauth2(oauth2) => WireAuth::Oauth2(oauth2.clone()),
    };
}
