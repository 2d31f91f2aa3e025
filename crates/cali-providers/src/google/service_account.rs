//! Service account authentication (RFC 7523 JWT bearer grant).

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::token_source::{AuthKind, BoxFuture, TokenSource};

use super::config::CALENDAR_SCOPE;
use super::credentials::{CredentialType, detect_credential_type};
use super::oauth::TokenResponse;
use super::tokens::EXPIRY_BUFFER_SECS;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields of a service account key file that the grant needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "unable to read service account key {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> ProviderResult<Self> {
        match detect_credential_type(json)? {
            CredentialType::ServiceAccount => {}
            other => {
                return Err(ProviderError::configuration(format!(
                    "expected service account credentials, got {other}"
                )));
            }
        }
        let key: Self = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("unable to parse service account key: {e}"))
        })?;
        if key.client_email.is_empty() {
            return Err(ProviderError::configuration(
                "service account key has no client_email",
            ));
        }
        Ok(key)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Token source minting access tokens from a service account key.
pub struct ServiceAccountSource {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scopes: String,
    http_client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountSource {
    pub fn new(key: ServiceAccountKey, timeout: Duration) -> ProviderResult<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            ProviderError::configuration(format!("invalid service account private key: {e}"))
        })?;
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::internal(format!("unable to build HTTP client: {e}")))?;

        Ok(Self {
            key,
            encoding_key,
            scopes: CALENDAR_SCOPE.to_string(),
            http_client,
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Signs the assertion presented to the token endpoint.
    fn assertion(&self, now: DateTime<Utc>) -> ProviderResult<String> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scopes,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(|e| {
            ProviderError::configuration(format!("unable to sign service account assertion: {e}"))
        })
    }

    async fn fetch_token(&self) -> ProviderResult<CachedToken> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;
        let operation = "unable to obtain service account token";

        let response = self
            .http_client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("token request failed: {e}")).with_operation(operation)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read token response: {e}"))
                .with_operation(operation)
        })?;
        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "token endpoint returned {status}: {body}"
            ))
            .with_operation(operation));
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {e}"))
                .with_operation(operation)
        })?;
        let lifetime = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        debug!(client_email = %self.key.client_email, lifetime, "obtained service account token");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + chrono::Duration::seconds(lifetime - EXPIRY_BUFFER_SECS),
        })
    }

    async fn current_token(&self) -> ProviderResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && Utc::now() < token.expires_at
        {
            return Ok(token.access_token.clone());
        }
        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }
}

impl TokenSource for ServiceAccountSource {
    fn access_token(&self) -> BoxFuture<'_, ProviderResult<String>> {
        Box::pin(self.current_token())
    }

    fn kind(&self) -> AuthKind {
        AuthKind::ServiceAccount
    }
}
