//! Authentication helpers
//!
//! Basic and WSSE headers are computed here. AWS SigV4 and Digest signing
//! live in their own modules and are applied by the transport, as is the
//! OAuth1 signature. OAuth tokens come from the per-run
//! [`credentials::CredentialStore`].

pub mod aws;
pub mod credentials;
pub mod digest;
pub mod oauth1;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::errors::RunnerError;

pub use credentials::{CredentialStore, OAuth1Credentials, OAuth2Credentials};

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("missing credentials")]
    MissingCredentials,

    #[error("invalid authentication challenge: {0}")]
    InvalidChallenge(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("token request failed: {0}")]
    TokenRequest(String),
}

impl From<AuthError> for RunnerError {
    fn from(err: AuthError) -> Self {
        RunnerError::Auth(err.to_string())
    }
}

/// `Basic base64(username:password)`
pub fn basic_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

/// Build the `X-WSSE` UsernameToken header value
pub fn wsse_header(username: &str, password: &str) -> String {
    let nonce: [u8; 16] = rand::rng().random();
    let nonce = hex::encode(nonce);
    let created = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    wsse_header_with(username, password, &nonce, &created)
}

fn wsse_header_with(username: &str, password: &str, nonce: &str, created: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce.as_bytes());
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    let digest = STANDARD.encode(hex::encode(hasher.finalize()));

    format!(
        "UsernameToken Username=\"{}\", PasswordDigest=\"{}\", Nonce=\"{}\", Created=\"{}\"",
        username, digest, nonce, created
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_header() {
        assert_eq!(basic_header("user", "pass"), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_wsse_fields_present() {
        let header = wsse_header("u", "p");
        assert!(header.starts_with("UsernameToken Username=\"u\""));
        for field in ["PasswordDigest=\"", "Nonce=\"", "Created=\""] {
            let start = header.find(field).unwrap() + field.len();
            let end = header[start..].find('"').unwrap();
            assert!(end > 0, "{} is empty", field);
        }
    }

    #[test]
    fn test_wsse_digest_is_deterministic_for_fixed_inputs() {
        let a = wsse_header_with("u", "p", "abcd", "2024-01-01T00:00:00.000Z");
        let b = wsse_header_with("u", "p", "abcd", "2024-01-01T00:00:00.000Z");
        assert_eq!(a, b);
        let c = wsse_header_with("u", "other", "abcd", "2024-01-01T00:00:00.000Z");
        assert_ne!(a, c);
    }
}
