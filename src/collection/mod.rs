//! Collection tree model
//!
//! A collection is a rooted tree of folders and requests. Folders carry an
//! optional root block (headers, auth, variables, scripts) that their
//! descendants inherit; requests carry the full request definition.
//!
//! The model is plain serde data so it can be read from JSON, YAML or TOML
//! documents (see [`loader`]) and handed to the engine as-is.

pub mod loader;
pub mod tree;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use loader::{load_collection, load_environment_file};

fn enabled_default() -> bool {
    true
}

fn default_method() -> String {
    "GET".to_string()
}

/// A whole collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub name: String,

    /// Collection-level configuration, inherited by every request
    #[serde(default)]
    pub root: FolderRoot,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,

    /// Named environments stored alongside the collection
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<Environment>,

    /// Script concatenation order across inherited scopes
    #[serde(default)]
    pub script_flow: ScriptFlow,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,

    /// Directory the collection was loaded from; file bodies and developer
    /// scripts resolve relative paths against it
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Ordering of inherited scripts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptFlow {
    /// Pre-request scripts run root first, post-response scripts and tests
    /// run leaf first
    #[default]
    Sandwich,
    /// Everything runs root first
    Sequential,
}

/// A node of the collection tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Item {
    Folder(Folder),
    Request(RequestItem),
}

impl Item {
    pub fn name(&self) -> &str {
        match self {
            Item::Folder(f) => &f.name,
            Item::Request(r) => &r.name,
        }
    }

    pub fn seq(&self) -> Option<i64> {
        match self {
            Item::Folder(f) => f.seq.or_else(|| f.root.as_ref().and_then(|r| r.seq)),
            Item::Request(r) => r.seq,
        }
    }

    /// Absolute path of the node inside the tree, e.g. `users/get user`
    pub fn path(&self) -> &str {
        match self {
            Item::Folder(f) => &f.path,
            Item::Request(r) => &r.path,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Item::Folder(_))
    }

    pub fn as_request(&self) -> Option<&RequestItem> {
        match self {
            Item::Request(r) => Some(r),
            Item::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Item::Folder(f) => Some(f),
            Item::Request(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,

    /// Folder-level configuration inherited by descendants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<FolderRoot>,

    #[serde(default)]
    pub items: Vec<Item>,

    /// Load error recorded by the storage layer for this node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip)]
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestItem {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,

    #[serde(default)]
    pub request: RequestDef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip)]
    pub path: String,
}

impl RequestItem {
    /// True when the request has a test script or an enabled assertion
    pub fn has_tests(&self) -> bool {
        !self.request.tests.trim().is_empty()
            || self.request.assertions.iter().any(|a| a.enabled)
    }
}

/// Inheritable configuration of a folder or of the collection itself
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRoot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,

    #[serde(default)]
    pub request: RootRequest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<KeyValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,

    #[serde(default)]
    pub vars: Vars,

    #[serde(default)]
    pub script: Scripts,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tests: String,
}

/// A saved request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDef {
    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub url: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<KeyValue>,

    #[serde(default)]
    pub auth: Auth,

    #[serde(default)]
    pub body: Body,

    #[serde(default)]
    pub vars: Vars,

    #[serde(default)]
    pub script: Scripts,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tests: String,

    /// Declarative assertions: `name` holds the expression, `value` the
    /// operator and operand (e.g. `res.status` / `eq 200`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<KeyValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub settings: RequestSettings,
}

impl Default for RequestDef {
    fn default() -> Self {
        Self {
            method: default_method(),
            url: String::new(),
            params: Vec::new(),
            headers: Vec::new(),
            auth: Auth::default(),
            body: Body::default(),
            vars: Vars::default(),
            script: Scripts::default(),
            tests: String::new(),
            assertions: Vec::new(),
            timeout_ms: None,
            settings: RequestSettings::default(),
        }
    }
}

impl RequestDef {
    /// Enabled path parameters in declaration order
    pub fn path_params(&self) -> impl Iterator<Item = &Param> {
        self.params
            .iter()
            .filter(|p| p.enabled && p.kind == ParamKind::Path)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSettings {
    /// Percent-encode the URL after interpolation
    #[serde(default)]
    pub encode_url: bool,
}

/// Name/value pair with an enabled flag (headers, variables, form fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

impl KeyValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    #[default]
    Query,
    Path,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "type", default)]
    pub kind: ParamKind,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

/// Pre-request (`req`) and post-response (`res`) variable assignments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vars {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub req: Vec<KeyValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub res: Vec<KeyValue>,
}

/// Pre-request (`req`) and post-response (`res`) scripts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scripts {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub req: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub res: String,
}

// ============================================================================
// Auth
// ============================================================================

/// Auth block of a request, folder or collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Auth {
    None,
    /// Take the auth of the closest ancestor that defines one
    #[default]
    Inherit,
    Basic(BasicAuth),
    Bearer(BearerAuth),
    #[serde(rename = "apikey")]
    ApiKey(ApiKeyAuth),
    Digest(DigestAuth),
    Ntlm(NtlmAuth),
    Wsse(WsseAuth),
    Awsv4(AwsV4Auth),
    Oauth1(OAuth1Auth),
    Oauth2(OAuth2Auth),
}

impl Auth {
    /// A concrete mode is anything other than `none` and `inherit`
    pub fn is_concrete(&self) -> bool {
        !matches!(self, Auth::None | Auth::Inherit)
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            Auth::None => "none",
            Auth::Inherit => "inherit",
            Auth::Basic(_) => "basic",
            Auth::Bearer(_) => "bearer",
            Auth::ApiKey(_) => "apikey",
            Auth::Digest(_) => "digest",
            Auth::Ntlm(_) => "ntlm",
            Auth::Wsse(_) => "wsse",
            Auth::Awsv4(_) => "awsv4",
            Auth::Oauth1(_) => "oauth1",
            Auth::Oauth2(_) => "oauth2",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicAuth {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BearerAuth {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyPlacement {
    #[default]
    Header,
    #[serde(rename = "queryparams")]
    QueryParams,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyAuth {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub placement: ApiKeyPlacement,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigestAuth {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NtlmAuth {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub domain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WsseAuth {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsV4Auth {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub profile_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OAuth1SignatureMethod {
    #[default]
    #[serde(rename = "HMAC-SHA1")]
    HmacSha1,
    #[serde(rename = "HMAC-SHA256")]
    HmacSha256,
    #[serde(rename = "HMAC-SHA512")]
    HmacSha512,
    #[serde(rename = "RSA-SHA1")]
    RsaSha1,
    #[serde(rename = "RSA-SHA256")]
    RsaSha256,
    #[serde(rename = "RSA-SHA512")]
    RsaSha512,
    #[serde(rename = "PLAINTEXT")]
    Plaintext,
}

impl OAuth1SignatureMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuth1SignatureMethod::HmacSha1 => "HMAC-SHA1",
            OAuth1SignatureMethod::HmacSha256 => "HMAC-SHA256",
            OAuth1SignatureMethod::HmacSha512 => "HMAC-SHA512",
            OAuth1SignatureMethod::RsaSha1 => "RSA-SHA1",
            OAuth1SignatureMethod::RsaSha256 => "RSA-SHA256",
            OAuth1SignatureMethod::RsaSha512 => "RSA-SHA512",
            OAuth1SignatureMethod::Plaintext => "PLAINTEXT",
        }
    }
}

/// Where the signed `oauth_*` parameters go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuth1Placement {
    #[default]
    AuthorizationHeader,
    QueryParam,
    /// Only for `POST` with a url-encoded form body
    RequestBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth1Auth {
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,
    /// Falls back to the credential store when empty
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub access_token_secret: String,
    #[serde(default)]
    pub signature_method: OAuth1SignatureMethod,
    #[serde(default)]
    pub parameter_transmission_method: OAuth1Placement,
    #[serde(default)]
    pub callback_url: String,
    #[serde(default)]
    pub verifier: String,
    #[serde(default)]
    pub realm: String,
    /// Fixed nonce and timestamp, generated per request when empty
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default = "default_credentials_id")]
    pub credentials_id: String,
}

impl Default for OAuth1Auth {
    fn default() -> Self {
        Self {
            consumer_key: String::new(),
            consumer_secret: String::new(),
            access_token: String::new(),
            access_token_secret: String::new(),
            signature_method: OAuth1SignatureMethod::default(),
            parameter_transmission_method: OAuth1Placement::default(),
            callback_url: String::new(),
            verifier: String::new(),
            realm: String::new(),
            nonce: String::new(),
            timestamp: String::new(),
            credentials_id: default_credentials_id(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuth2GrantType {
    #[default]
    ClientCredentials,
    Password,
    AuthorizationCode,
    Implicit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPlacement {
    #[default]
    Header,
    Url,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Auth {
    #[serde(default)]
    pub grant_type: OAuth2GrantType,
    #[serde(default)]
    pub access_token_url: String,
    #[serde(default)]
    pub authorization_url: String,
    #[serde(default)]
    pub callback_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub state: String,
    /// Key into the credential store
    #[serde(default = "default_credentials_id")]
    pub credentials_id: String,
    #[serde(default)]
    pub token_placement: TokenPlacement,
    #[serde(default = "default_token_header_prefix")]
    pub token_header_prefix: String,
    #[serde(default = "default_token_query_key")]
    pub token_query_key: String,
    #[serde(default = "enabled_default")]
    pub auto_fetch_token: bool,
}

fn default_credentials_id() -> String {
    "credentials".to_string()
}

fn default_token_header_prefix() -> String {
    "Bearer".to_string()
}

fn default_token_query_key() -> String {
    "access_token".to_string()
}

impl Default for OAuth2Auth {
    fn default() -> Self {
        Self {
            grant_type: OAuth2GrantType::default(),
            access_token_url: String::new(),
            authorization_url: String::new(),
            callback_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            username: String::new(),
            password: String::new(),
            scope: String::new(),
            state: String::new(),
            credentials_id: default_credentials_id(),
            token_placement: TokenPlacement::default(),
            token_header_prefix: default_token_header_prefix(),
            token_query_key: default_token_query_key(),
            auto_fetch_token: true,
        }
    }
}

// ============================================================================
// Body
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyMode {
    #[default]
    None,
    Json,
    Text,
    Xml,
    Sparql,
    FormUrlEncoded,
    MultipartForm,
    Graphql,
    File,
}

/// Request body: a mode tag plus the payload of every mode
///
/// Only the payload matching `mode` is sent; the others are kept so that
/// switching modes does not lose data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[serde(default)]
    pub mode: BodyMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xml: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparql: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub form_url_encoded: Vec<KeyValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub multipart_form: Vec<MultipartField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphql: Option<GraphqlBody>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file: Vec<FileBody>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphqlBody {
    #[serde(default)]
    pub query: String,
    /// JSON text; may contain placeholders
    #[serde(default)]
    pub variables: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultipartKind {
    #[default]
    Text,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartField {
    pub name: String,
    /// Text value, or a file path for `file` parts
    #[serde(default)]
    pub value: String,
    #[serde(rename = "type", default)]
    pub kind: MultipartKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileBody {
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub selected: bool,
}

// ============================================================================
// Environments and proxy
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    #[serde(default)]
    pub variables: Vec<EnvVariable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVariable {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub secret: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_proxy_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub hostname: String,
    /// Kept as text so it can hold a placeholder
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub auth: ProxyAuth,
    /// Comma separated host list
    #[serde(default)]
    pub bypass_proxy: String,
}

fn default_proxy_protocol() -> String {
    "http".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyAuth {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_modes_deserialize() {
        let auth: Auth = serde_json::from_value(json!({"mode": "bearer", "token": "t"})).unwrap();
        assert_eq!(auth, Auth::Bearer(BearerAuth { token: "t".into() }));

        let auth: Auth = serde_json::from_value(json!({
            "mode": "apikey", "key": "X-Key", "value": "v", "placement": "queryparams"
        }))
        .unwrap();
        match auth {
            Auth::ApiKey(k) => assert_eq!(k.placement, ApiKeyPlacement::QueryParams),
            other => panic!("unexpected auth {:?}", other),
        }

        let auth: Auth = serde_json::from_value(json!({"mode": "inherit"})).unwrap();
        assert!(!auth.is_concrete());
    }

    #[test]
    fn test_request_defaults() {
        let item: Item = serde_json::from_value(json!({
            "type": "request",
            "name": "ping",
            "request": {"url": "http://localhost/ping"}
        }))
        .unwrap();
        let req = item.as_request().unwrap();
        assert_eq!(req.request.method, "GET");
        assert_eq!(req.request.auth, Auth::Inherit);
        assert_eq!(req.request.body.mode, BodyMode::None);
        assert!(!req.has_tests());
    }

    #[test]
    fn test_has_tests_ignores_disabled_assertions() {
        let mut item = RequestItem::default();
        item.request.assertions.push(KeyValue {
            name: "res.status".into(),
            value: "eq 200".into(),
            enabled: false,
        });
        assert!(!item.has_tests());
        item.request.assertions[0].enabled = true;
        assert!(item.has_tests());
    }

    #[test]
    fn test_body_mode_names() {
        let body: Body = serde_json::from_value(json!({
            "mode": "formUrlEncoded",
            "formUrlEncoded": [{"name": "a", "value": "1"}]
        }))
        .unwrap();
        assert_eq!(body.mode, BodyMode::FormUrlEncoded);
        assert!(body.form_url_encoded[0].enabled);
    }
}
