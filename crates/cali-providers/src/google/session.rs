//! OAuth user session: persisted tokens plus refresh.

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::token_source::{AuthKind, BoxFuture, TokenSource};

use super::config::OAuthConfig;
use super::oauth::OAuthClient;
use super::tokens::{TokenInfo, TokenStorage};

/// Token source backed by the OAuth user flow.
///
/// Tokens are loaded from disk on first use, refreshed when they enter the
/// expiry buffer, and written back after every refresh.
pub struct OAuthSession {
    config: OAuthConfig,
    client: OAuthClient,
    storage: TokenStorage,
    tokens: Mutex<Option<TokenInfo>>,
}

/// Summary of the stored OAuth tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No token file.
    Missing,
    /// Access token valid.
    Valid,
    /// Access token expired but a refresh token is available.
    Refreshable,
    /// Expired without refresh token, or granted for other scopes.
    NeedsReauth,
}

impl OAuthSession {
    pub fn new(config: OAuthConfig) -> ProviderResult<Self> {
        config.validate()?;
        let client = OAuthClient::from_config(&config)?;
        Ok(Self::with_client(config, client))
    }

    /// Builds a session around an existing OAuth client (e.g. one with a
    /// custom token endpoint).
    pub fn with_client(config: OAuthConfig, client: OAuthClient) -> Self {
        let storage = TokenStorage::new(&config.token_path);
        Self {
            config,
            client,
            storage,
            tokens: Mutex::new(None),
        }
    }

    pub fn storage(&self) -> &TokenStorage {
        &self.storage
    }

    /// Inspects the stored tokens without refreshing them.
    pub fn state(&self) -> ProviderResult<SessionState> {
        let Some(tokens) = self.storage.load()? else {
            return Ok(SessionState::Missing);
        };
        Ok(classify(&tokens, &self.config.scopes))
    }

    /// Whether the interactive flow must run before API calls can succeed.
    pub fn needs_authorization(&self) -> ProviderResult<bool> {
        Ok(matches!(
            self.state()?,
            SessionState::Missing | SessionState::NeedsReauth
        ))
    }

    /// Runs the browser flow and persists the result.
    pub async fn authorize(&self) -> ProviderResult<()> {
        let tokens = self
            .client
            .authorize(&self.config.scopes, self.config.loopback_port_range)
            .await?;
        self.storage.save(&tokens)?;
        *self.tokens.lock().await = Some(tokens);
        info!(path = %self.storage.path().display(), "saved OAuth tokens");
        Ok(())
    }

    async fn current_token(&self) -> ProviderResult<String> {
        let mut guard = self.tokens.lock().await;
        if guard.is_none() {
            *guard = self.storage.load()?;
        }
        let tokens = guard.as_mut().ok_or_else(|| {
            ProviderError::authentication("not authenticated, run 'cali auth google'")
        })?;

        if !tokens.is_expired() {
            return Ok(tokens.access_token.clone());
        }

        let refresh_token = tokens.refresh_token.clone().ok_or_else(|| {
            ProviderError::authentication(
                "access token expired and no refresh token, run 'cali auth google --force'",
            )
        })?;

        debug!("access token expired, refreshing");
        let response = self.client.refresh(&refresh_token).await?;
        tokens.refreshed(
            response.access_token,
            response.refresh_token,
            response.expires_in,
        );
        self.storage.save(tokens)?;
        Ok(tokens.access_token.clone())
    }
}

impl TokenSource for OAuthSession {
    fn access_token(&self) -> BoxFuture<'_, ProviderResult<String>> {
        Box::pin(self.current_token())
    }

    fn kind(&self) -> AuthKind {
        AuthKind::OAuth
    }
}

fn classify(tokens: &TokenInfo, scopes: &[String]) -> SessionState {
    if !tokens.has_scopes(scopes) {
        SessionState::NeedsReauth
    } else if !tokens.is_expired() {
        SessionState::Valid
    } else if tokens.refresh_token.is_some() {
        SessionState::Refreshable
    } else {
        SessionState::NeedsReauth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::config::{CALENDAR_SCOPE, OAuthCredentials};

    fn session(dir: &tempfile::TempDir) -> OAuthSession {
        let config = OAuthConfig::new(OAuthCredentials::new(
            "test-client.apps.googleusercontent.com",
            "test-secret",
        ))
        .with_token_path(dir.path().join("token.json"));
        OAuthSession::new(config).unwrap()
    }

    fn scoped(access: &str, refresh: Option<&str>, expires_in: Option<i64>) -> TokenInfo {
        TokenInfo::new(
            access,
            refresh.map(str::to_string),
            expires_in,
            vec![CALENDAR_SCOPE.to_string()],
        )
    }

    #[test]
    fn rejects_invalid_credentials() {
        let config = OAuthConfig::new(OAuthCredentials::new("nope", "secret"));
        assert!(OAuthSession::new(config).is_err());
    }

    #[tokio::test]
    async fn missing_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        assert_eq!(session.state().unwrap(), SessionState::Missing);
        assert!(session.needs_authorization().unwrap());

        let err = session.access_token().await.unwrap_err();
        assert!(err.message().contains("cali auth google"));
        assert_eq!(session.kind(), AuthKind::OAuth);
    }

    #[tokio::test]
    async fn valid_tokens_are_served_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        session
            .storage()
            .save(&scoped("cached", Some("refresh"), Some(3600)))
            .unwrap();

        assert_eq!(session.state().unwrap(), SessionState::Valid);
        assert!(!session.needs_authorization().unwrap());
        assert_eq!(session.access_token().await.unwrap(), "cached");
    }

    #[tokio::test]
    async fn expired_without_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        session.storage().save(&scoped("old", None, Some(0))).unwrap();

        assert_eq!(session.state().unwrap(), SessionState::NeedsReauth);
        let err = session.access_token().await.unwrap_err();
        assert!(err.message().contains("--force"));
    }

    #[test]
    fn classification() {
        let scopes = [CALENDAR_SCOPE.to_string()];
        assert_eq!(
            classify(&scoped("a", Some("r"), Some(0)), &scopes),
            SessionState::Refreshable
        );
        let wrong_scope = TokenInfo::new("a", None, None, vec!["other".into()]);
        assert_eq!(classify(&wrong_scope, &scopes), SessionState::NeedsReauth);
    }
}
