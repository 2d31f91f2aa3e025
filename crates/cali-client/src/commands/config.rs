//! Configuration commands.

use std::io::Write;
use std::path::Path;

use cali_providers::google::ServiceAccountKey;

use crate::commands::Context;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::secret;

const REDACTED: &str = "<redacted>";

/// Dump the current configuration; inline secrets are masked.
pub fn dump(ctx: &Context, out: &mut impl Write) -> ClientResult<()> {
    let redacted = redact(&ctx.config);
    let toml_str = toml::to_string_pretty(&redacted)
        .map_err(|e| ClientError::config(format!("failed to serialize config: {}", e)))?;
    writeln!(out, "# config.toml ({})", ctx.config_path.display())?;
    write!(out, "{}", toml_str)?;
    Ok(())
}

fn redact(config: &ClientConfig) -> ClientConfig {
    let mask = |value: &Option<String>| {
        value.as_ref().map(|v| {
            if secret::is_reference(v) {
                v.clone()
            } else {
                REDACTED.to_string()
            }
        })
    };
    let mut redacted = config.clone();
    redacted.auth.oauth.client_secret = mask(&config.auth.oauth.client_secret);
    redacted.auth.static_token = mask(&config.auth.static_token);
    redacted
}

/// Validate the configuration: secret references resolve, credential files
/// parse, and the endpoint is an HTTP URL.
pub fn validate(ctx: &Context, out: &mut impl Write) -> ClientResult<()> {
    let config = &ctx.config;

    if let Some(endpoint) = &config.api_endpoint
        && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
    {
        return Err(ClientError::config(format!(
            "api_endpoint must be an http(s) URL, got '{}'",
            endpoint
        )));
    }

    let auth = config.auth_settings()?;

    if let Some(path) = &auth.service_account_key {
        let key = ServiceAccountKey::from_file(path)?;
        writeln!(out, "Service account key is valid ({}).", key.client_email)?;
    }

    if auth.oauth.is_configured() {
        auth.oauth.credentials()?.validate()?;
        writeln!(out, "Google OAuth credentials are valid.")?;
    }

    if auth.service_account_key.is_none()
        && !auth.oauth.is_configured()
        && auth.static_token.is_none()
    {
        writeln!(
            out,
            "Warning: no credentials configured; run `cali auth google` or `cali auth service-account`."
        )?;
    }

    writeln!(out, "Configuration is valid.")?;
    Ok(())
}

/// Show the configuration file path.
pub fn path(config_path: &Path, out: &mut impl Write) -> ClientResult<()> {
    writeln!(out, "config: {}", config_path.display())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn context(config_toml: &str) -> (tempfile::TempDir, Context) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, config_toml).unwrap();
        let cli =
            Cli::try_parse_from(["cali", "--config", path.to_str().unwrap(), "config", "dump"])
                .unwrap();
        let ctx = Context::from_cli(&cli).unwrap();
        (dir, ctx)
    }

    fn run(f: impl FnOnce(&mut Vec<u8>) -> ClientResult<()>) -> ClientResult<String> {
        let mut out = Vec::new();
        f(&mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn dump_masks_inline_secrets_only() {
        let (_dir, ctx) = context(
            "[auth]\nstatic_token = \"plain-token\"\n\n[auth.oauth]\nclient_id = \"id.apps.googleusercontent.com\"\nclient_secret = \"pass::google/cali\"\n",
        );
        let text = run(|out| dump(&ctx, out)).unwrap();
        assert!(text.starts_with("# config.toml ("));
        assert!(!text.contains("plain-token"));
        assert!(text.contains(REDACTED));
        assert!(text.contains("pass::google/cali"));
        assert!(text.contains("id.apps.googleusercontent.com"));
    }

    #[test]
    fn validate_accepts_oauth_client() {
        let (_dir, ctx) = context(
            "[auth.oauth]\nclient_id = \"id.apps.googleusercontent.com\"\nclient_secret = \"s\"\n",
        );
        let text = run(|out| validate(&ctx, out)).unwrap();
        assert!(text.contains("OAuth credentials are valid"));
        assert!(text.ends_with("Configuration is valid.\n"));
    }

    #[test]
    fn validate_rejects_bad_client_id() {
        let (_dir, ctx) =
            context("[auth.oauth]\nclient_id = \"not-google\"\nclient_secret = \"s\"\n");
        let err = run(|out| validate(&ctx, out)).unwrap_err();
        assert!(err.to_string().contains("apps.googleusercontent.com"));
    }

    #[test]
    fn validate_rejects_bad_endpoint() {
        let (_dir, ctx) = context("api_endpoint = \"localhost:8080\"\n");
        let err = run(|out| validate(&ctx, out)).unwrap_err();
        assert!(err.to_string().contains("api_endpoint"));
    }

    #[test]
    fn validate_reports_missing_key_file() {
        let (_dir, ctx) = context("[auth.service_account]\nkey_file = \"/nonexistent/key.json\"\n");
        assert!(run(|out| validate(&ctx, out)).is_err());
    }

    #[test]
    fn validate_warns_without_credentials() {
        let (_dir, ctx) = context("");
        let text = run(|out| validate(&ctx, out)).unwrap();
        assert!(text.contains("no credentials configured"));
    }

    #[test]
    fn path_prints_location() {
        let text = run(|out| path(Path::new("/etc/cali.toml"), out)).unwrap();
        assert_eq!(text, "config: /etc/cali.toml\n");
    }
}
