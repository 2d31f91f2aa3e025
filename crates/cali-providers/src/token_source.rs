//! Bearer token sources.
//!
//! The calendar client asks a [`TokenSource`] for an access token before each
//! request. Implementations own caching and refresh.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::ProviderResult;

/// A boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How a token source authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthKind {
    ServiceAccount,
    OAuth,
    /// Fixed token, no refresh.
    Static,
}

impl AuthKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceAccount => "service_account",
            Self::OAuth => "oauth",
            Self::Static => "static",
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supplies bearer tokens for calendar API requests.
pub trait TokenSource: Send + Sync {
    /// Returns a currently valid access token, refreshing it if needed.
    fn access_token(&self) -> BoxFuture<'_, ProviderResult<String>>;

    fn kind(&self) -> AuthKind;
}

/// A token that never changes.
///
/// Used against the mock calendar server and for tokens minted elsewhere.
#[derive(Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticToken").field("token", &"<redacted>").finish()
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> BoxFuture<'_, ProviderResult<String>> {
        let token = self.token.clone();
        Box::pin(async move { Ok(token) })
    }

    fn kind(&self) -> AuthKind {
        AuthKind::Static
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_is_returned_as_is() {
        let source = StaticToken::new("test-token");
        assert_eq!(source.access_token().await.unwrap(), "test-token");
        assert_eq!(source.kind(), AuthKind::Static);
    }

    #[test]
    fn debug_hides_token() {
        let source = StaticToken::new("secret");
        assert!(!format!("{source:?}").contains("secret"));
    }

    #[test]
    fn kind_names() {
        assert_eq!(AuthKind::ServiceAccount.to_string(), "service_account");
        assert_eq!(AuthKind::OAuth.as_str(), "oauth");
    }
}
