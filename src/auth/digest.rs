//! HTTP Digest Authentication (RFC 7616)
//!
//! The first request goes out without credentials. When the server answers
//! 401 with a `WWW-Authenticate: Digest` challenge, the transport builds an
//! `Authorization` header from it and retries once.

use std::sync::atomic::{AtomicU32, Ordering};

use super::AuthError;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
    Sha512_256,
}

impl DigestAlgorithm {
    /// Parse algorithm from string (case-insensitive), MD5 when unknown
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "SHA-256" | "SHA256" => DigestAlgorithm::Sha256,
            "SHA-512-256" | "SHA512-256" => DigestAlgorithm::Sha512_256,
            _ => DigestAlgorithm::Md5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha512_256 => "SHA-512-256",
        }
    }
}

/// Parsed `WWW-Authenticate: Digest` challenge
#[derive(Debug, Clone)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub algorithm: DigestAlgorithm,
    pub qop: Option<String>,
    pub opaque: Option<String>,
}

impl DigestChallenge {
    /// True when a `WWW-Authenticate` value announces the Digest scheme
    pub fn is_digest(header: &str) -> bool {
        header.trim_start().to_lowercase().starts_with("digest ")
    }

    pub fn parse(header: &str) -> Result<Self, AuthError> {
        let trimmed = header.trim_start();
        let params = if Self::is_digest(trimmed) {
            &trimmed[7..]
        } else {
            trimmed
        };

        let mut realm = None;
        let mut nonce = None;
        let mut algorithm = DigestAlgorithm::Md5;
        let mut qop = None;
        let mut opaque = None;

        for part in split_params(params) {
            if let Some((key, value)) = parse_param(&part) {
                match key.to_lowercase().as_str() {
                    "realm" => realm = Some(value),
                    "nonce" => nonce = Some(value),
                    "algorithm" => algorithm = DigestAlgorithm::parse(&value),
                    "qop" => qop = Some(value),
                    "opaque" => opaque = Some(value),
                    _ => {}
                }
            }
        }

        Ok(DigestChallenge {
            realm: realm.ok_or_else(|| {
                AuthError::InvalidChallenge("Missing realm in Digest challenge".to_string())
            })?,
            nonce: nonce.ok_or_else(|| {
                AuthError::InvalidChallenge("Missing nonce in Digest challenge".to_string())
            })?,
            algorithm,
            qop,
            opaque,
        })
    }
}

/// Digest credentials with their nonce counter
#[derive(Debug)]
pub struct DigestSigner {
    username: String,
    password: String,
    nc: AtomicU32,
}

impl DigestSigner {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            nc: AtomicU32::new(0),
        }
    }

    /// Authorization header value answering a challenge
    pub fn respond_to_challenge(&self, challenge: &DigestChallenge, method: &str, uri: &str) -> String {
        let nc = self.nc.fetch_add(1, Ordering::SeqCst) + 1;
        let cnonce = generate_cnonce();
        let qop = challenge
            .qop
            .as_deref()
            .map(|q| q.split(',').next().unwrap_or("auth").trim().to_string());

        let ha1 = hash(
            challenge.algorithm,
            &format!("{}:{}:{}", self.username, challenge.realm, self.password),
        );
        let ha2 = hash(challenge.algorithm, &format!("{}:{}", method, uri));

        let response = match &qop {
            Some(qop) => hash(
                challenge.algorithm,
                &format!("{}:{}:{:08x}:{}:{}:{}", ha1, challenge.nonce, nc, cnonce, qop, ha2),
            ),
            None => hash(challenge.algorithm, &format!("{}:{}:{}", ha1, challenge.nonce, ha2)),
        };

        let mut value = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\", algorithm={}",
            self.username,
            challenge.realm,
            challenge.nonce,
            uri,
            response,
            challenge.algorithm.as_str()
        );
        if let Some(qop) = qop {
            value.push_str(&format!(", qop={}, nc={:08x}, cnonce=\"{}\"", qop, nc, cnonce));
        }
        if let Some(opaque) = &challenge.opaque {
            value.push_str(&format!(", opaque=\"{}\"", opaque));
        }
        value
    }
}

fn hash(algorithm: DigestAlgorithm, data: &str) -> String {
    use sha2::Digest;

    match algorithm {
        DigestAlgorithm::Md5 => hex::encode(md5_digest::Md5::digest(data.as_bytes())),
        DigestAlgorithm::Sha256 => hex::encode(sha2::Sha256::digest(data.as_bytes())),
        DigestAlgorithm::Sha512_256 => hex::encode(sha2::Sha512_256::digest(data.as_bytes())),
    }
}

fn generate_cnonce() -> String {
    use rand::Rng;
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

/// Split on commas outside quoted values
fn split_params(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                if !current.trim().is_empty() {
                    parts.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

fn parse_param(s: &str) -> Option<(String, String)> {
    let (key, value) = s.split_once('=')?;
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    Some((key.trim().to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_challenge() {
        let header = r#"Digest realm="test@example.com", nonce="abc123", qop="auth", algorithm=MD5"#;
        let challenge = DigestChallenge::parse(header).unwrap();
        assert_eq!(challenge.realm, "test@example.com");
        assert_eq!(challenge.nonce, "abc123");
        assert_eq!(challenge.algorithm, DigestAlgorithm::Md5);
        assert_eq!(challenge.qop.as_deref(), Some("auth"));
        assert!(DigestChallenge::is_digest(header));
        assert!(!DigestChallenge::is_digest("Basic realm=\"x\""));
    }

    #[test]
    fn test_missing_nonce() {
        assert!(DigestChallenge::parse(r#"Digest realm="r""#).is_err());
    }

    #[test]
    fn test_response_and_counter() {
        let signer = DigestSigner::new("user", "password");
        let challenge = DigestChallenge {
            realm: "testrealm@host.com".into(),
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".into(),
            algorithm: DigestAlgorithm::Sha256,
            qop: Some("auth,auth-int".into()),
            opaque: Some("5ccc069c".into()),
        };

        let first = signer.respond_to_challenge(&challenge, "GET", "/dir/index.html");
        assert!(first.starts_with("Digest username=\"user\""));
        assert!(first.contains("algorithm=SHA-256"));
        assert!(first.contains("qop=auth,"));
        assert!(first.contains("nc=00000001"));
        assert!(first.contains("opaque=\"5ccc069c\""));

        let second = signer.respond_to_challenge(&challenge, "GET", "/dir/index.html");
        assert!(second.contains("nc=00000002"));
    }

    #[test]
    fn test_hashes() {
        assert_eq!(hash(DigestAlgorithm::Md5, "test"), "098f6bcd4621d373cade4e832627b4f6");
        assert_eq!(
            hash(DigestAlgorithm::Sha256, "test"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }
}
