//! Service-account authentication.
//!
//! Reads a Google service-account key file, signs an RS256 assertion and
//! exchanges it for a bearer token at the key's `token_uri`. Every failure is
//! reported as [`SyncError::Auth`]; the CLI treats it as fatal.

use bucket_search_core::{Result, SyncError};
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{error, info};

pub const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.full_control";
pub const SEARCH_SCOPE: &str = "https://www.googleapis.com/auth/cloud_search";

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields of a service-account JSON key this tool needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            error!(error = ?e, path = %path.display(), "Failed to read service account file");
            SyncError::Auth(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| SyncError::Auth(format!("invalid service account key: {e}")))
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Bearer token returned by the token endpoint.
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl AccessToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in: None,
            token_type: None,
        }
    }

    pub fn secret(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Sign the JWT assertion for `scopes`, issued at `now`.
pub fn sign_assertion(
    key: &ServiceAccountKey,
    scopes: &[&str],
    now: DateTime<Utc>,
) -> Result<String> {
    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: key.client_email.clone(),
        scope: scopes.join(" "),
        aud: key.token_uri.clone(),
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };
    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| SyncError::Auth(format!("invalid private key: {e}")))?;
    encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
        .map_err(|e| SyncError::Auth(format!("cannot sign assertion: {e}")))
}

/// Exchange a signed assertion for an access token.
pub async fn fetch_token(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
    scopes: &[&str],
) -> Result<AccessToken> {
    let assertion = sign_assertion(key, scopes, Utc::now())?;
    let response = http
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| SyncError::Auth(format!("token request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(%status, body = %body, "Token endpoint rejected the assertion");
        return Err(SyncError::Auth(format!("HTTP {status}: {body}")));
    }

    let token: AccessToken = response
        .json()
        .await
        .map_err(|e| SyncError::Auth(format!("invalid token response: {e}")))?;
    info!(
        client_email = %key.client_email,
        scopes = %scopes.join(" "),
        expires_in = ?token.expires_in,
        "Obtained access token"
    );
    Ok(token)
}

/// Load credentials from `credentials_path` and obtain a token for `scopes`.
pub async fn authenticate(credentials_path: &Path, scopes: &[&str]) -> Result<AccessToken> {
    let key = ServiceAccountKey::from_file(credentials_path)?;
    fetch_token(&reqwest::Client::new(), &key, scopes).await
}
