//! Reqwest-backed transport
//!
//! Applies the auth material the materializer left for the transport:
//! OAuth2 tokens from the credential store, OAuth1 and AWS SigV4
//! signatures and a Digest challenge-response retry on 401.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::multipart::{Form, Part};
use reqwest::cookie::Jar;
use reqwest::{header, Client, Method, StatusCode};
use tokio_util::io::ReaderStream;

use super::{parse_body, ResponseSnapshot, Transport, TransportOptions};
use crate::auth::aws::{self, AwsSigV4Config};
use crate::auth::credentials::{token_application, CredentialStore, TokenApplication};
use crate::auth::digest::{DigestChallenge, DigestSigner};
use crate::auth::{oauth1, AuthError};
use crate::collection::{OAuth1Auth, OAuth1Placement, ProxyConfig};
use crate::errors::{Result, RunnerError};
use crate::request::{WireAuth, WireBody, WirePart, WireRequest};

pub const USER_AGENT_STRING: &str = concat!("pulse-runner/", env!("CARGO_PKG_VERSION"));

pub struct ReqwestTransport {
    client: Client,
    /// One client per distinct proxy configuration seen this run
    proxied: Mutex<Vec<(ProxyConfig, Client)>>,
    /// Shared by every client so cookies follow the run across proxies
    cookies: Arc<Jar>,
    options: TransportOptions,
    credentials: Arc<CredentialStore>,
}

impl ReqwestTransport {
    pub fn new(options: TransportOptions, credentials: Arc<CredentialStore>) -> Result<Self> {
        let cookies = Arc::new(Jar::default());
        let client = build_client(&options, cookies.clone(), None)?;
        Ok(ReqwestTransport {
            client,
            proxied: Mutex::new(Vec::new()),
            cookies,
            options,
            credentials,
        })
    }

    /// Requests with an enabled proxy get a dedicated client, built once
    /// per proxy configuration
    fn client_for(&self, request: &WireRequest) -> Result<Client> {
        let proxy = match &request.proxy {
            Some(proxy) if proxy.enabled => proxy,
            _ => return Ok(self.client.clone()),
        };

        let mut proxied = self
            .proxied
            .lock()
            .map_err(|_| RunnerError::Transport("Proxy client cache poisoned".to_string()))?;
        if let Some((_, client)) = proxied.iter().find(|(config, _)| config == proxy) {
            return Ok(client.clone());
        }

        let client = build_client(&self.options, self.cookies.clone(), Some(proxy))?;
        proxied.push((proxy.clone(), client.clone()));
        Ok(client)
    }

    async fn dispatch(
        &self,
        client: &Client,
        method: &Method,
        request: &WireRequest,
        authorization: Option<String>,
    ) -> Result<reqwest::Response> {
        let mut builder = client.request(method.clone(), request.url.as_str());

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(authorization) = authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        if let Some(timeout) = request
            .timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .or(self.options.timeout)
        {
            builder = builder.timeout(timeout);
        }

        builder = match &request.body {
            WireBody::None => builder,
            WireBody::Json(text) | WireBody::Text(text) => builder.body(text.clone()),
            WireBody::Form(pairs) => builder.body(encode_form(pairs)),
            WireBody::Multipart(parts) => builder.multipart(build_form(parts).await?),
            WireBody::File(file) if file.streamed => {
                let handle = tokio::fs::File::open(&file.path).await?;
                builder.body(reqwest::Body::wrap_stream(ReaderStream::new(handle)))
            }
            WireBody::File(file) => builder.body(tokio::fs::read(&file.path).await?),
        };

        builder.send().await.map_err(map_send_error)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &WireRequest) -> Result<ResponseSnapshot> {
        let mut request = request.clone();
        let client = self.client_for(&request)?;

        if let WireAuth::Oauth2(oauth2) = &request.auth {
            if let Some(credentials) = self.credentials.ensure_token(&client, oauth2).await? {
                match token_application(oauth2, &credentials) {
                    TokenApplication::Header { name, value } => request.set_header(&name, value),
                    TokenApplication::Query { key, value } => {
                        request.url = append_query(&request.url, &key, &value)?;
                    }
                }
            }
        }

        if let WireAuth::Oauth1(oauth1) = request.auth.clone() {
            apply_oauth1(&mut request, &oauth1, &self.credentials)?;
        }

        // reqwest only adds the boundary when it sets the content type itself
        if matches!(request.body, WireBody::Multipart(_)) {
            let has_boundary = request
                .header("content-type")
                .map(|ct| ct.to_ascii_lowercase().contains("boundary="));
            if has_boundary == Some(false) {
                request.remove_header("content-type");
            }
        }

        match &request.auth {
            WireAuth::Awsv4(aws_auth) => {
                let config = AwsSigV4Config::from_auth(aws_auth)?;
                let payload = signable_payload(&request.body).await?;
                let headers: Vec<(String, String)> = request
                    .headers
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let signed = aws::sign_request(
                    &config,
                    &request.method,
                    &request.url,
                    &headers,
                    payload.as_deref(),
                )?;
                for (name, value) in signed {
                    request.set_header(&name, value);
                }
            }
            WireAuth::Ntlm(_) => {
                tracing::warn!(url = %request.url, "NTLM authentication is not supported, sending unsigned");
            }
            _ => {}
        }

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| RunnerError::Transport(format!("Invalid HTTP method: {}", request.method)))?;

        tracing::debug!(method = %method, url = %request.url, "Sending request");
        let started = Instant::now();
        let mut response = self.dispatch(&client, &method, &request, None).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if let WireAuth::Digest(digest) = &request.auth {
                if let Some(challenge) = digest_challenge(&response) {
                    let uri = request_uri(&request.url)?;
                    let signer = DigestSigner::new(&digest.username, &digest.password);
                    let authorization = signer.respond_to_challenge(&challenge, method.as_str(), &uri);
                    response = self
                        .dispatch(&client, &method, &request, Some(authorization))
                        .await?;
                }
            }
        }

        snapshot(response, started).await
    }
}

/// Sign with the block's access token, or the stored one when it has none,
/// and place the `oauth_*` parameters
fn apply_oauth1(request: &mut WireRequest, auth: &OAuth1Auth, credentials: &CredentialStore) -> Result<()> {
    let (token, token_secret) = if auth.access_token.is_empty() {
        credentials
            .get_oauth1(&auth.credentials_id)
            .map(|stored| (stored.access_token, stored.access_token_secret))
            .unwrap_or_default()
    } else {
        (auth.access_token.clone(), auth.access_token_secret.clone())
    };

    let is_post = request.method.eq_ignore_ascii_case("POST");
    let form = match &request.body {
        WireBody::Form(pairs) if is_post => pairs.clone(),
        _ => Vec::new(),
    };
    let params = oauth1::sign(auth, &token, &token_secret, &request.method, &request.url, &form)?;

    match auth.parameter_transmission_method {
        OAuth1Placement::AuthorizationHeader => {
            request.set_header("Authorization", oauth1::authorization_header(&params, &auth.realm));
        }
        OAuth1Placement::QueryParam => {
            for (key, value) in &params {
                request.url = append_query(&request.url, key, value)?;
            }
        }
        OAuth1Placement::RequestBody => match &mut request.body {
            WireBody::Form(pairs) if is_post => pairs.extend(params),
            _ => {
                return Err(AuthError::Signing(
                    "request body placement needs a POST with a url-encoded form body".to_string(),
                )
                .into())
            }
        },
    }
    Ok(())
}

fn build_client(options: &TransportOptions, cookies: Arc<Jar>, proxy: Option<&ProxyConfig>) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT_STRING)
        .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
        .referer(false)
        // Cookies set by one response are sent with the rest of the run
        .cookie_provider(cookies);

    if options.insecure {
        builder = builder.danger_accept_invalid_certs(true);
    }
    if let Some(proxy) = proxy {
        builder = builder.proxy(build_proxy(proxy)?);
    }

    builder.build().map_err(RunnerError::Request)
}

fn build_proxy(config: &ProxyConfig) -> Result<reqwest::Proxy> {
    let protocol = if config.protocol.is_empty() {
        "http"
    } else {
        config.protocol.as_str()
    };
    let address = if config.port.is_empty() {
        format!("{}://{}", protocol, config.hostname)
    } else {
        format!("{}://{}:{}", protocol, config.hostname, config.port)
    };

    let mut proxy = reqwest::Proxy::all(&address)
        .map_err(|e| RunnerError::Transport(format!("Invalid proxy {}: {}", address, e)))?;
    if config.auth.enabled {
        proxy = proxy.basic_auth(&config.auth.username, &config.auth.password);
    }
    if !config.bypass_proxy.trim().is_empty() {
        proxy = proxy.no_proxy(reqwest::NoProxy::from_string(&config.bypass_proxy));
    }
    Ok(proxy)
}

fn map_send_error(e: reqwest::Error) -> RunnerError {
    if e.is_timeout() {
        return RunnerError::Transport(format!("Request timed out: {}", e));
    }
    if e.is_connect() {
        return RunnerError::Transport(format!("Connection failed: {}", e));
    }
    RunnerError::Request(e)
}

fn encode_form(pairs: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

async fn build_form(parts: &[WirePart]) -> Result<Form> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            WirePart::Text { name, value } => form.text(name.clone(), value.clone()),
            WirePart::File {
                name,
                path,
                content_type,
            } => {
                let contents = tokio::fs::read(path).await?;
                let filename = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("file")
                    .to_string();
                let mut file_part = Part::bytes(contents).file_name(filename);
                if let Some(ct) = content_type.as_deref().filter(|ct| !ct.is_empty()) {
                    file_part = file_part
                        .mime_str(ct)
                        .map_err(|e| RunnerError::Transport(format!("Invalid MIME type {}: {}", ct, e)))?;
                }
                form.part(name.clone(), file_part)
            }
        };
    }
    Ok(form)
}

/// Body bytes covered by a SigV4 signature; multipart and streamed bodies
/// are signed as empty
async fn signable_payload(body: &WireBody) -> Result<Option<Vec<u8>>> {
    Ok(match body {
        WireBody::None | WireBody::Multipart(_) => None,
        WireBody::Json(text) | WireBody::Text(text) => Some(text.clone().into_bytes()),
        WireBody::Form(pairs) => Some(encode_form(pairs).into_bytes()),
        WireBody::File(file) if file.streamed => None,
        WireBody::File(file) => Some(tokio::fs::read(&file.path).await?),
    })
}

fn append_query(url: &str, key: &str, value: &str) -> Result<String> {
    let mut parsed = url::Url::parse(url).map_err(|_| RunnerError::InvalidUrl(url.to_string()))?;
    parsed.query_pairs_mut().append_pair(key, value);
    Ok(parsed.to_string())
}

fn request_uri(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).map_err(|_| RunnerError::InvalidUrl(url.to_string()))?;
    Ok(match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    })
}

fn digest_challenge(response: &reqwest::Response) -> Option<DigestChallenge> {
    let value = response.headers().get(header::WWW_AUTHENTICATE)?.to_str().ok()?;
    if !DigestChallenge::is_digest(value) {
        return None;
    }
    DigestChallenge::parse(value).ok()
}

async fn snapshot(response: reqwest::Response, started: Instant) -> Result<ResponseSnapshot> {
    let status = response.status();

    let mut headers: IndexMap<String, String> = IndexMap::new();
    for (name, value) in response.headers() {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match headers.get_mut(name.as_str()) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => {
                headers.insert(name.as_str().to_string(), value);
            }
        }
    }

    let bytes = response.bytes().await.map_err(map_send_error)?;
    let response_time = started.elapsed().as_millis() as u64;

    Ok(ResponseSnapshot {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        body: parse_body(&bytes),
        response_time,
        size: bytes.len(),
    })
}
