//! OAuth 1.0a request signing
//!
//! Builds the `oauth_*` protocol parameters for one request and signs them
//! over the normalized method, base URL and parameter set. HMAC and
//! PLAINTEXT signatures are supported; RSA methods are rejected.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use rand::distr::Alphanumeric;
use rand::Rng;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use url::Url;

use crate::collection::{OAuth1Auth, OAuth1SignatureMethod};

use super::AuthError;

const OAUTH_VERSION: &str = "1.0";
const NONCE_LEN: usize = 32;

/// Signed protocol parameters, `oauth_signature` included, sorted by name
pub type OAuth1Params = Vec<(String, String)>;

/// Sign a request. `form` holds the decoded pairs of a url-encoded body
/// that takes part in the signature.
pub fn sign(
    auth: &OAuth1Auth,
    token: &str,
    token_secret: &str,
    method: &str,
    url: &str,
    form: &[(String, String)],
) -> Result<OAuth1Params, AuthError> {
    let parsed = Url::parse(url).map_err(|e| AuthError::Signing(format!("invalid URL {}: {}", url, e)))?;

    let nonce = if auth.nonce.is_empty() {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect()
    } else {
        auth.nonce.clone()
    };
    let timestamp = if auth.timestamp.is_empty() {
        chrono::Utc::now().timestamp().to_string()
    } else {
        auth.timestamp.clone()
    };

    let mut params: OAuth1Params = vec![
        ("oauth_consumer_key".into(), auth.consumer_key.clone()),
        ("oauth_nonce".into(), nonce),
        ("oauth_signature_method".into(), auth.signature_method.as_str().into()),
        ("oauth_timestamp".into(), timestamp),
        ("oauth_version".into(), OAUTH_VERSION.into()),
    ];
    if !token.is_empty() {
        params.push(("oauth_token".into(), token.to_string()));
    }
    if !auth.callback_url.is_empty() {
        params.push(("oauth_callback".into(), auth.callback_url.clone()));
    }
    if !auth.verifier.is_empty() {
        params.push(("oauth_verifier".into(), auth.verifier.clone()));
    }

    let base = signature_base_string(method, &parsed, &params, form);
    let key = format!("{}&{}", encode(&auth.consumer_secret), encode(token_secret));
    let signature = compute_signature(auth.signature_method, &key, &base)?;

    params.push(("oauth_signature".into(), signature));
    params.sort();
    Ok(params)
}

/// `OAuth realm="...", oauth_consumer_key="...", ...`
pub fn authorization_header(params: &OAuth1Params, realm: &str) -> String {
    let mut fields = Vec::with_capacity(params.len() + 1);
    if !realm.is_empty() {
        fields.push(format!("realm=\"{}\"", encode(realm)));
    }
    fields.extend(params.iter().map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v))));
    format!("OAuth {}", fields.join(", "))
}

fn signature_base_string(method: &str, url: &Url, oauth: &OAuth1Params, form: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .chain(oauth.iter().map(|(k, v)| (encode(k), encode(v))))
        .chain(form.iter().map(|(k, v)| (encode(k), encode(v))))
        .collect();
    pairs.sort();

    let normalized = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(&base_url(url)),
        encode(&normalized)
    )
}

/// Scheme, host, non-default port and path; no query or fragment
fn base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

fn compute_signature(method: OAuth1SignatureMethod, key: &str, base: &str) -> Result<String, AuthError> {
    fn hmac_base64<M: Mac + KeyInit>(key: &str, base: &str) -> Result<String, AuthError> {
        let mut mac = <M as Mac>::new_from_slice(key.as_bytes())
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        mac.update(base.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    match method {
        OAuth1SignatureMethod::HmacSha1 => hmac_base64::<Hmac<Sha1>>(key, base),
        OAuth1SignatureMethod::HmacSha256 => hmac_base64::<Hmac<Sha256>>(key, base),
        OAuth1SignatureMethod::HmacSha512 => hmac_base64::<Hmac<Sha512>>(key, base),
        OAuth1SignatureMethod::Plaintext => Ok(key.to_string()),
        OAuth1SignatureMethod::RsaSha1 | OAuth1SignatureMethod::RsaSha256 | OAuth1SignatureMethod::RsaSha512 => {
            Err(AuthError::Signing(format!("{} signatures are not supported", method.as_str())))
        }
    }
}

/// RFC 3986 percent-encoding; only unreserved characters stay literal
fn encode(text: &str) -> String {
    urlencoding::encode(text).into_owned()
}
