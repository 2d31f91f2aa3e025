//! Client configuration.
//!
//! All settings live in a single `config.toml`, by default
//! `~/.config/cali/config.toml`:
//!
//! ```toml
//! api_endpoint = "https://www.googleapis.com/calendar/v3"
//! calendar_id = "primary"
//! format = "yaml"
//!
//! [auth.oauth]
//! client_id = "xxx.apps.googleusercontent.com"
//! client_secret = "pass::google/cali"
//!
//! [auth.service_account]
//! key_file = "/etc/cali/key.json"
//!
//! [server]
//! max_connections = 16
//! request_timeout_secs = 30
//! ```
//!
//! `client_id`, `client_secret` and `static_token` accept secret references
//! (`pass::…`, `env::…`, see [`crate::secret`]).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use cali_core::OutputFormat;
use cali_providers::{AuthSettings, CalendarClient, OAuthSettings};
use cali_server::ServerConfig;

use crate::error::{ClientError, ClientResult};
use crate::secret;

/// Overrides `api_endpoint`.
pub const ENDPOINT_ENV: &str = "CALI_API_ENDPOINT";

/// Configuration for the `cali` CLI and daemon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Calendar API base URL; unset means Google.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,

    /// Calendar used when a command has no `--calendar`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,

    pub auth: AuthConfig,

    pub server: ServerSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub oauth: OAuthSection,

    pub service_account: ServiceAccountSection,

    /// Fixed bearer token, for test endpoints such as the mock server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Client-secrets JSON from Google Cloud Console.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceAccountSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
}

/// Daemon settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,

    pub max_connections: usize,

    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        Self {
            socket_path: None,
            max_connections: defaults.max_connections,
            request_timeout_secs: defaults.request_timeout.as_secs(),
        }
    }
}

impl ClientConfig {
    /// Loads `path`, or the default file when `path` is `None`.
    ///
    /// A missing file yields the defaults. Environment overrides are applied.
    pub fn load(path: Option<&Path>) -> ClientResult<Self> {
        let default_path = Self::default_path();
        let path = path.unwrap_or(&default_path);

        let config = match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).map_err(|e| {
                ClientError::config(format!("failed to parse {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(ClientError::config(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Ok(config.with_endpoint_override(std::env::var(ENDPOINT_ENV).ok()))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn with_endpoint_override(mut self, endpoint: Option<String>) -> Self {
        if let Some(endpoint) = endpoint.filter(|e| !e.is_empty()) {
            self.api_endpoint = Some(endpoint);
        }
        self
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cali")
    }

    pub fn output_format(&self, cli: Option<OutputFormat>) -> OutputFormat {
        cli.or(self.format).unwrap_or_default()
    }

    /// Credential settings with secret references resolved.
    pub fn auth_settings(&self) -> ClientResult<AuthSettings> {
        let oauth = &self.auth.oauth;
        Ok(AuthSettings {
            service_account_key: self.auth.service_account.key_file.clone(),
            oauth: OAuthSettings {
                client_id: secret::resolve_opt(oauth.client_id.as_deref())?,
                client_secret: secret::resolve_opt(oauth.client_secret.as_deref())?,
                credentials_file: oauth.credentials_file.clone(),
                token_path: oauth.token_path.clone(),
            },
            static_token: secret::resolve_opt(self.auth.static_token.as_deref())?,
            timeout: None,
        })
    }

    /// Builds a calendar client from the configured credentials and endpoint.
    pub fn calendar_client(&self) -> ClientResult<CalendarClient> {
        let tokens = self.auth_settings()?.token_source()?;
        let client = CalendarClient::new(tokens)?;
        Ok(match &self.api_endpoint {
            Some(endpoint) => client.with_endpoint(endpoint.as_str()),
            None => client,
        })
    }

    /// Daemon socket: the CLI value, then `[server] socket_path`, then the default.
    pub fn socket_path(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.server.socket_path.clone())
            .unwrap_or_else(cali_server::default_socket_path)
    }

    pub fn server_config(&self, socket: Option<&Path>) -> ServerConfig {
        ServerConfig::new(self.socket_path(socket))
            .with_max_connections(self.server.max_connections)
            .with_request_timeout(Duration::from_secs(self.server.request_timeout_secs.max(1)))
    }
}

/// Creates the configuration directory, private to the user.
pub fn ensure_config_dir(dir: &Path) -> ClientResult<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)?;
    Ok(())
}

/// Sets string keys in one table of the config file, keeping everything else
/// (comments and formatting included) as it is.
///
/// `table` is a dotted path such as `["auth", "oauth"]`.
pub fn write_values(path: &Path, table: &[&str], values: &[(&str, String)]) -> ClientResult<()> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let mut doc = content.parse::<toml_edit::DocumentMut>().map_err(|e| {
        ClientError::config(format!("could not parse {} for writing: {}", path.display(), e))
    })?;

    let mut current = doc.as_table_mut();
    for name in table {
        let entry = current.entry(name).or_insert_with(|| {
            let mut t = toml_edit::Table::new();
            t.set_implicit(true);
            toml_edit::Item::Table(t)
        });
        current = entry.as_table_mut().ok_or_else(|| {
            ClientError::config(format!("`{}` in {} is not a table", name, path.display()))
        })?;
    }
    for (key, value) in values {
        current[*key] = toml_edit::value(value.as_str());
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_config_dir(parent)?;
    }
    fs::write(path, doc.to_string())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    debug!(path = %path.display(), table = %table.join("."), "updated config file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
api_endpoint = "http://127.0.0.1:8080/calendar/v3"
calendar_id = "team@example.com"
format = "ical"

[auth]
static_token = "env::_CALI_CONFIG_TEST_TOKEN"

[auth.oauth]
client_id = "id.apps.googleusercontent.com"
client_secret = "env::_CALI_CONFIG_TEST_SECRET"
token_path = "/tmp/cali-token.json"

[auth.service_account]
key_file = "/etc/cali/key.json"

[server]
socket_path = "/tmp/cali-test.sock"
max_connections = 4
request_timeout_secs = 10
"#;

    #[test]
    fn parse_full_file() {
        let config = ClientConfig::parse(FULL).unwrap();
        assert_eq!(config.calendar_id.as_deref(), Some("team@example.com"));
        assert_eq!(config.format, Some(OutputFormat::Ical));
        assert_eq!(
            config.auth.service_account.key_file,
            Some(PathBuf::from("/etc/cali/key.json"))
        );
        assert_eq!(config.server.max_connections, 4);

        let server = config.server_config(None);
        assert_eq!(server.socket_path, PathBuf::from("/tmp/cali-test.sock"));
        assert_eq!(server.request_timeout, Duration::from_secs(10));
        assert_eq!(server.max_connections, 4);

        let cli_socket = config.server_config(Some(Path::new("/tmp/other.sock")));
        assert_eq!(cli_socket.socket_path, PathBuf::from("/tmp/other.sock"));
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = ClientConfig::parse("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.output_format(None), OutputFormat::Json);
        assert_eq!(config.server.max_connections, 32);
        assert_eq!(config.server.request_timeout_secs, 60);
    }

    #[test]
    fn cli_format_beats_config() {
        let config = ClientConfig::parse("format = \"yaml\"").unwrap();
        assert_eq!(config.output_format(None), OutputFormat::Yaml);
        assert_eq!(config.output_format(Some(OutputFormat::Json)), OutputFormat::Json);
    }

    #[test]
    fn endpoint_override() {
        let config = ClientConfig::parse(FULL).unwrap();
        let overridden = config
            .clone()
            .with_endpoint_override(Some("http://localhost:1/calendar/v3".into()));
        assert_eq!(
            overridden.api_endpoint.as_deref(),
            Some("http://localhost:1/calendar/v3")
        );
        let untouched = config.clone().with_endpoint_override(Some(String::new()));
        assert_eq!(untouched.api_endpoint, config.api_endpoint);
    }

    #[test]
    fn auth_settings_resolve_references() {
        unsafe {
            std::env::set_var("_CALI_CONFIG_TEST_SECRET", "resolved-secret");
            std::env::set_var("_CALI_CONFIG_TEST_TOKEN", "resolved-token");
        }
        let config = ClientConfig::parse(FULL).unwrap();
        let auth = config.auth_settings().unwrap();
        assert_eq!(auth.oauth.client_secret.as_deref(), Some("resolved-secret"));
        assert_eq!(auth.static_token.as_deref(), Some("resolved-token"));
        assert_eq!(
            auth.oauth.token_path,
            Some(PathBuf::from("/tmp/cali-token.json"))
        );
        unsafe {
            std::env::remove_var("_CALI_CONFIG_TEST_SECRET");
            std::env::remove_var("_CALI_CONFIG_TEST_TOKEN");
        }
    }

    #[test]
    fn unresolvable_reference_is_an_error() {
        let config = ClientConfig::parse(
            "[auth.oauth]\nclient_id = \"x\"\nclient_secret = \"env::_CALI_NOPE_4711\"\n",
        )
        .unwrap();
        assert!(matches!(
            config.auth_settings(),
            Err(ClientError::Secret { .. })
        ));
    }

    #[test]
    fn load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(config.auth, AuthConfig::default());
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "format = [").unwrap();
        let err = ClientConfig::load(Some(path.as_path())).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn write_values_preserves_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        ensure_config_dir(path.parent().unwrap()).unwrap();
        fs::write(&path, "# my calendar\ncalendar_id = \"work\"\n").unwrap();

        write_values(
            &path,
            &["auth", "oauth"],
            &[
                ("client_id", "cli.apps.googleusercontent.com".to_string()),
                ("client_secret", "pass::google/cali".to_string()),
            ],
        )
        .unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# my calendar\n"));
        let config = ClientConfig::parse(&written).unwrap();
        assert_eq!(config.calendar_id.as_deref(), Some("work"));
        assert_eq!(
            config.auth.oauth.client_id.as_deref(),
            Some("cli.apps.googleusercontent.com")
        );
        assert_eq!(
            config.auth.oauth.client_secret.as_deref(),
            Some("pass::google/cali")
        );
    }

    #[cfg(unix)]
    #[test]
    fn written_files_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("cali");
        let path = config_dir.join("config.toml");
        write_values(
            &path,
            &["auth", "service_account"],
            &[("key_file", "/k.json".to_string())],
        )
        .unwrap();

        let dir_mode = fs::metadata(&config_dir).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
        let file_mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
    }

    #[test]
    fn write_values_rejects_non_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "auth = \"oops\"\n").unwrap();
        assert!(write_values(&path, &["auth", "oauth"], &[]).is_err());
    }
}
