//! Persisted OAuth token set.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Tokens are treated as expired this long before their real expiry.
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// An OAuth token set as returned by the token endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry, already shortened by [`EXPIRY_BUFFER_SECS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub last_refresh: DateTime<Utc>,
}

impl std::fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenInfo")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl TokenInfo {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(|secs| buffered_expiry(now, secs)),
            scopes,
            last_refresh: now,
        }
    }

    /// True when the access token is expired or inside the refresh buffer.
    /// Tokens without an expiry never expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Installs a refreshed access token. The refresh token is kept unless
    /// the endpoint rotated it.
    pub fn refreshed(
        &mut self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) {
        let now = Utc::now();
        self.access_token = access_token.into();
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.expires_at = expires_in_secs.map(|secs| buffered_expiry(now, secs));
        self.last_refresh = now;
    }
}

fn buffered_expiry(now: DateTime<Utc>, expires_in_secs: i64) -> DateTime<Utc> {
    now + Duration::seconds(expires_in_secs) - Duration::seconds(EXPIRY_BUFFER_SECS)
}

/// JSON file holding a [`TokenInfo`].
///
/// Writes go to a temporary sibling first and are renamed into place; the
/// file is created with mode 0600 on Unix.
#[derive(Debug, Clone)]
pub struct TokenStorage {
    path: PathBuf,
}

impl TokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored tokens; `Ok(None)` when no file exists.
    pub fn load(&self) -> ProviderResult<Option<TokenInfo>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no token file");
                return Ok(None);
            }
            Err(e) => {
                return Err(ProviderError::configuration(format!(
                    "unable to read token file {}: {e}",
                    self.path.display()
                )));
            }
        };

        let tokens = serde_json::from_str(&content).map_err(|e| {
            ProviderError::configuration(format!(
                "unable to decode token file {}: {e}",
                self.path.display()
            ))
        })?;
        debug!(path = %self.path.display(), "loaded tokens");
        Ok(Some(tokens))
    }

    pub fn save(&self, tokens: &TokenInfo) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::configuration(format!("unable to create token directory: {e}"))
            })?;
        }

        let content = serde_json::to_vec_pretty(tokens)
            .map_err(|e| ProviderError::internal(format!("unable to encode token: {e}")))?;

        let temp_path = self.path.with_extension("json.tmp");
        write_private(&temp_path, &content).map_err(|e| {
            ProviderError::configuration(format!("unable to create token file: {e}"))
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::configuration(format!("unable to replace token file: {e}"))
        })?;

        debug!(path = %self.path.display(), "saved tokens");
        Ok(())
    }

    /// Removes the token file. Missing files are not an error.
    pub fn clear(&self) -> ProviderResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProviderError::configuration(format!(
                "unable to remove token file: {e}"
            ))),
        }
    }
}

fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tokens_are_fresh() {
        let token = TokenInfo::new("access", Some("refresh".into()), Some(3600), vec![]);
        assert!(!token.is_expired());
        let expires_at = token.expires_at.unwrap();
        assert!(expires_at < Utc::now() + Duration::seconds(3600 - EXPIRY_BUFFER_SECS + 5));
    }

    #[test]
    fn short_lived_token_is_already_expired() {
        let token = TokenInfo::new("access", None, Some(30), vec![]);
        assert!(token.is_expired());
        let forever = TokenInfo::new("access", None, None, vec![]);
        assert!(!forever.is_expired());
    }

    #[test]
    fn refresh_keeps_refresh_token() {
        let mut token = TokenInfo::new("old", Some("refresh".into()), Some(10), vec![]);
        token.refreshed("new", None, Some(3600));
        assert_eq!(token.access_token, "new");
        assert_eq!(token.refresh_token.as_deref(), Some("refresh"));
        assert!(!token.is_expired());

        token.refreshed("newer", Some("rotated".into()), Some(3600));
        assert_eq!(token.refresh_token.as_deref(), Some("rotated"));
    }

    #[test]
    fn scope_check() {
        let token = TokenInfo::new("a", None, None, vec!["s1".into(), "s2".into()]);
        assert!(token.has_scopes(&["s1".into()]));
        assert!(!token.has_scopes(&["s3".into()]));
    }

    #[test]
    fn debug_redacts_access_token() {
        let token = TokenInfo::new("super-secret", None, None, vec![]);
        assert!(!format!("{token:?}").contains("super-secret"));
    }

    #[test]
    fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path().join("nested").join("token.json"));
        assert!(storage.load().unwrap().is_none());

        let token = TokenInfo::new("access", Some("refresh".into()), Some(3600), vec!["s".into()]);
        storage.save(&token).unwrap();

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "access");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh"));
        assert!(!storage.path().with_extension("json.tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(storage.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        storage.clear().unwrap();
        assert!(storage.load().unwrap().is_none());
        storage.clear().unwrap();
    }

    #[test]
    fn corrupt_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{").unwrap();
        let err = TokenStorage::new(&path).load().unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Configuration);
    }
}
