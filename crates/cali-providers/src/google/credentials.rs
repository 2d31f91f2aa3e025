//! Credential file detection and token source selection.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::error::{ProviderError, ProviderResult};
use crate::token_source::{StaticToken, TokenSource};

use super::config::{OAuthConfig, OAuthCredentials};
use super::service_account::{ServiceAccountKey, ServiceAccountSource};
use super::session::OAuthSession;

/// Kind of Google credential document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialType {
    OAuthClient,
    ServiceAccount,
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OAuthClient => "OAuth Client",
            Self::ServiceAccount => "Service Account",
        })
    }
}

/// Classifies a credential JSON document.
///
/// `"type": "service_account"` marks a service account key; a top-level
/// `installed` or `web` section marks an OAuth client.
pub fn detect_credential_type(json: &str) -> ProviderResult<CredentialType> {
    let value: Value = serde_json::from_str(json).map_err(|e| {
        ProviderError::configuration(format!("failed to parse credential file: {e}"))
    })?;

    if value.get("type").and_then(Value::as_str) == Some("service_account") {
        return Ok(CredentialType::ServiceAccount);
    }
    if value.get("installed").is_some() || value.get("web").is_some() {
        return Ok(CredentialType::OAuthClient);
    }
    Err(ProviderError::configuration("unknown credential type"))
}

/// OAuth client settings as resolved from configuration.
#[derive(Debug, Clone, Default)]
pub struct OAuthSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Client-secrets JSON; explicit id/secret win over it.
    pub credentials_file: Option<PathBuf>,
    pub token_path: Option<PathBuf>,
}

impl OAuthSettings {
    pub fn is_configured(&self) -> bool {
        self.client_id.as_deref().is_some_and(|id| !id.is_empty())
            || self.credentials_file.is_some()
    }

    pub fn credentials(&self) -> ProviderResult<OAuthCredentials> {
        match (&self.client_id, &self.client_secret, &self.credentials_file) {
            (Some(id), Some(secret), _) if !id.is_empty() => {
                Ok(OAuthCredentials::new(id.clone(), secret.clone()))
            }
            (_, _, Some(path)) => OAuthCredentials::from_file(path),
            (Some(_), None, None) => Err(ProviderError::configuration(
                "OAuth client_id is set but client_secret is missing",
            )),
            _ => Err(ProviderError::configuration("no OAuth client configured")),
        }
    }

    pub fn oauth_config(&self, timeout: Duration) -> ProviderResult<OAuthConfig> {
        let mut config = OAuthConfig::new(self.credentials()?).with_timeout(timeout);
        if let Some(path) = &self.token_path {
            config = config.with_token_path(path);
        }
        Ok(config)
    }
}

/// Everything needed to pick a token source.
#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub service_account_key: Option<PathBuf>,
    pub oauth: OAuthSettings,
    /// Fixed bearer token, e.g. for a local mock endpoint.
    pub static_token: Option<String>,
    pub timeout: Option<Duration>,
}

impl AuthSettings {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(Self::DEFAULT_TIMEOUT)
    }

    /// Builds the token source: a static token, else a service account,
    /// else the OAuth user session.
    pub fn token_source(&self) -> ProviderResult<Arc<dyn TokenSource>> {
        if let Some(token) = self.static_token.as_deref().filter(|t| !t.is_empty()) {
            info!("using static bearer token");
            return Ok(Arc::new(StaticToken::new(token)));
        }

        if let Some(path) = &self.service_account_key {
            let key = ServiceAccountKey::from_file(path)?;
            info!(client_email = %key.client_email, "using service account");
            return Ok(Arc::new(ServiceAccountSource::new(key, self.timeout())?));
        }

        if self.oauth.is_configured() {
            let session = OAuthSession::new(self.oauth.oauth_config(self.timeout())?)?;
            info!("using OAuth user credentials");
            return Ok(Arc::new(session));
        }

        Err(ProviderError::configuration(
            "no credentials configured: run 'cali auth service-account --key-file <path>' \
             or 'cali auth google' to set up an OAuth client",
        ))
    }
}
