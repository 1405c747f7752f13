//! OAuth credential store
//!
//! One store lives for one run. Tokens are keyed by the auth block's
//! `credentialsId`. OAuth2 tokens are exposed to interpolation as
//! `$oauth2.<id>.<field>` and applied to outgoing requests by the
//! transport. OAuth1 access tokens fill in for auth blocks that carry none.

use std::sync::Mutex;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::collection::{OAuth2Auth, OAuth2GrantType, TokenPlacement};

use super::AuthError;

/// Token material for one credential id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OAuth2Credentials {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// OAuth1 access token and its secret for one credential id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OAuth1Credentials {
    pub access_token: String,
    pub access_token_secret: String,
}

/// Error body of a token endpoint
#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    error_description: Option<String>,
}

#[derive(Debug, Default)]
pub struct CredentialStore {
    tokens: Mutex<IndexMap<String, OAuth2Credentials>>,
    oauth1: Mutex<IndexMap<String, OAuth1Credentials>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<String>, credentials: OAuth2Credentials) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(id.into(), credentials);
        }
    }

    pub fn get(&self, id: &str) -> Option<OAuth2Credentials> {
        self.tokens.lock().ok()?.get(id).cloned()
    }

    pub fn insert_oauth1(&self, id: impl Into<String>, credentials: OAuth1Credentials) {
        if let Ok(mut oauth1) = self.oauth1.lock() {
            oauth1.insert(id.into(), credentials);
        }
    }

    pub fn get_oauth1(&self, id: &str) -> Option<OAuth1Credentials> {
        self.oauth1.lock().ok()?.get(id).cloned()
    }

    /// `{ "$oauth2": { "<id>": { "access_token": ..., ... } } }`, empty when
    /// no token is stored
    pub fn variables(&self) -> IndexMap<String, Value> {
        let Ok(tokens) = self.tokens.lock() else {
            return IndexMap::new();
        };
        if tokens.is_empty() {
            return IndexMap::new();
        }

        let by_id: Map<String, Value> = tokens
            .iter()
            .filter_map(|(id, creds)| Some((id.clone(), serde_json::to_value(creds).ok()?)))
            .collect();

        let mut vars = IndexMap::new();
        vars.insert("$oauth2".to_string(), Value::Object(by_id));
        vars
    }

    /// Return the stored token for the auth block, fetching one first when
    /// the block allows it and the grant type needs no user interaction
    pub async fn ensure_token(
        &self,
        client: &reqwest::Client,
        auth: &OAuth2Auth,
    ) -> Result<Option<OAuth2Credentials>, AuthError> {
        if let Some(existing) = self.get(&auth.credentials_id) {
            return Ok(Some(existing));
        }
        if !auth.auto_fetch_token || auth.access_token_url.is_empty() {
            return Ok(None);
        }

        let grant = match auth.grant_type {
            OAuth2GrantType::ClientCredentials => "client_credentials",
            OAuth2GrantType::Password => "password",
            OAuth2GrantType::AuthorizationCode | OAuth2GrantType::Implicit => {
                tracing::warn!(
                    credentials_id = %auth.credentials_id,
                    "Interactive OAuth2 grant cannot be fetched automatically"
                );
                return Ok(None);
            }
        };

        let credentials = fetch_token(client, auth, grant).await?;
        self.insert(auth.credentials_id.clone(), credentials.clone());
        Ok(Some(credentials))
    }
}

async fn fetch_token(
    client: &reqwest::Client,
    auth: &OAuth2Auth,
    grant: &str,
) -> Result<OAuth2Credentials, AuthError> {
    let mut form = vec![("grant_type", grant.to_string())];
    if !auth.scope.is_empty() {
        form.push(("scope", auth.scope.clone()));
    }
    if grant == "password" {
        form.push(("username", auth.username.clone()));
        form.push(("password", auth.password.clone()));
    }

    tracing::debug!(url = %auth.access_token_url, grant, "Fetching OAuth2 token");

    let response = client
        .post(&auth.access_token_url)
        .basic_auth(&auth.client_id, Some(&auth.client_secret))
        .header("Accept", "application/json")
        .form(&form)
        .send()
        .await
        .map_err(|e| AuthError::TokenRequest(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::TokenRequest(e.to_string()))?;

    if !status.is_success() {
        if let Ok(error) = serde_json::from_str::<TokenError>(&body) {
            let msg = match error.error_description {
                Some(desc) => format!("{}: {}", error.error, desc),
                None => error.error,
            };
            return Err(AuthError::TokenRequest(msg));
        }
        return Err(AuthError::TokenRequest(format!("status {}: {}", status, body)));
    }

    serde_json::from_str(&body)
        .map_err(|e| AuthError::TokenRequest(format!("Failed to parse token response: {}", e)))
}

/// Where a token goes on the outgoing request
#[derive(Debug, Clone, PartialEq)]
pub enum TokenApplication {
    Header { name: String, value: String },
    Query { key: String, value: String },
}

/// Place a token according to the auth block
pub fn token_application(auth: &OAuth2Auth, credentials: &OAuth2Credentials) -> TokenApplication {
    match auth.token_placement {
        TokenPlacement::Header => {
            let value = if auth.token_header_prefix.is_empty() {
                credentials.access_token.clone()
            } else {
                format!("{} {}", auth.token_header_prefix, credentials.access_token)
            };
            TokenApplication::Header {
                name: "Authorization".to_string(),
                value,
            }
        }
        TokenPlacement::Url => TokenApplication::Query {
            key: auth.token_query_key.clone(),
            value: credentials.access_token.clone(),
        },
    }
}
