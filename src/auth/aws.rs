//! AWS Signature Version 4 signing
//!
//! Credentials come from the request's `awsv4` auth block. Empty access
//! keys fall back to the standard `AWS_*` environment variables.

use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4;

use crate::collection::AwsV4Auth;

use super::AuthError;

/// Resolved SigV4 signing material
#[derive(Debug, Clone)]
pub struct AwsSigV4Config {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
    pub service: String,
}

impl AwsSigV4Config {
    /// Build from an interpolated auth block
    pub fn from_auth(auth: &AwsV4Auth) -> Result<Self, AuthError> {
        let from_env = |names: &[&str]| names.iter().find_map(|n| std::env::var(n).ok());

        let access_key_id = non_empty(&auth.access_key_id)
            .or_else(|| from_env(&["AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY"]))
            .ok_or(AuthError::MissingCredentials)?;
        let secret_access_key = non_empty(&auth.secret_access_key)
            .or_else(|| from_env(&["AWS_SECRET_ACCESS_KEY", "AWS_SECRET_KEY"]))
            .ok_or(AuthError::MissingCredentials)?;
        let session_token =
            non_empty(&auth.session_token).or_else(|| from_env(&["AWS_SESSION_TOKEN"]));
        let region = non_empty(&auth.region)
            .or_else(|| from_env(&["AWS_REGION", "AWS_DEFAULT_REGION"]))
            .unwrap_or_else(|| "us-east-1".to_string());

        if auth.service.is_empty() {
            return Err(AuthError::Signing("AWS service name is required".to_string()));
        }

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
            region,
            service: auth.service.clone(),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.trim().is_empty()).then(|| value.to_string())
}

/// Sign a request and return the headers to add (authorization, date,
/// security token and the host used for signing)
pub fn sign_request(
    config: &AwsSigV4Config,
    method: &str,
    url: &str,
    headers: &[(String, String)],
    body: Option<&[u8]>,
) -> Result<Vec<(String, String)>, AuthError> {
    let parsed = url::Url::parse(url).map_err(|e| AuthError::Signing(format!("Invalid URL: {}", e)))?;

    let uri = match parsed.query() {
        Some(q) => format!("{}?{}", parsed.path(), q),
        None => parsed.path().to_string(),
    };

    let identity = Credentials::new(
        &config.access_key_id,
        &config.secret_access_key,
        config.session_token.clone(),
        None,
        "pulse-runner",
    )
    .into();

    let signing_params = v4::SigningParams::builder()
        .identity(&identity)
        .region(&config.region)
        .name(&config.service)
        .time(SystemTime::now())
        .settings(SigningSettings::default())
        .build()
        .map_err(|e| AuthError::Signing(format!("Failed to build signing params: {}", e)))?;

    let signable_body = match body {
        Some(bytes) if !bytes.is_empty() => SignableBody::Bytes(bytes),
        _ => SignableBody::empty(),
    };

    let host = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    };

    let mut header_map = http::HeaderMap::new();
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::try_from(name.as_str()),
            http::header::HeaderValue::from_str(value),
        ) {
            header_map.insert(name, value);
        }
    }
    if !header_map.contains_key(http::header::HOST) && !host.is_empty() {
        if let Ok(value) = http::header::HeaderValue::from_str(&host) {
            header_map.insert(http::header::HOST, value);
        }
    }

    let signable_request = SignableRequest::new(
        method,
        &uri,
        header_map
            .iter()
            .map(|(k, v)| (k.as_str(), v.to_str().unwrap_or(""))),
        signable_body,
    )
    .map_err(|e| AuthError::Signing(format!("Failed to create signable request: {}", e)))?;

    let output = sign(signable_request, &signing_params.into())
        .map_err(|e| AuthError::Signing(format!("Failed to sign request: {}", e)))?;

    let (instructions, _signature) = output.into_parts();
    let mut signed: Vec<(String, String)> = instructions
        .headers()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    if !host.is_empty() && !signed.iter().any(|(k, _)| k.eq_ignore_ascii_case("host")) {
        signed.push(("host".to_string(), host));
    }

    Ok(signed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AwsSigV4Config {
        AwsSigV4Config::from_auth(&AwsV4Auth {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into(),
            session_token: "token".into(),
            service: "execute-api".into(),
            region: "eu-west-1".into(),
            profile_name: String::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_from_auth() {
        let config = config();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.session_token.as_deref(), Some("token"));
    }

    #[test]
    fn test_service_required() {
        let err = AwsSigV4Config::from_auth(&AwsV4Auth {
            access_key_id: "a".into(),
            secret_access_key: "b".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("service"));
    }

    #[test]
    fn test_sign_adds_authorization() {
        let signed = sign_request(
            &config(),
            "POST",
            "https://api.example.com:8443/items?x=1",
            &[("content-type".into(), "application/json".into())],
            Some(b"{}"),
        )
        .unwrap();

        let auth = signed
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("authorization"))
            .map(|(_, v)| v.as_str())
            .unwrap();
        assert!(auth.starts_with("AWS4-HMAC-SHA256"));
        assert!(auth.contains("eu-west-1/execute-api"));
        assert!(signed.iter().any(|(k, v)| k == "host" && v == "api.example.com:8443"));
        assert!(signed.iter().any(|(k, _)| k.eq_ignore_ascii_case("x-amz-security-token")));
    }
}
