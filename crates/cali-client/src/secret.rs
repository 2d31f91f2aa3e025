//! Secret references in config values.
//!
//! - `pass::path/in/store` runs `pass show path/in/store` and uses the first line
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - anything else is used as-is

use std::process::Command;

use crate::error::{ClientError, ClientResult};

const PASS_PREFIX: &str = "pass::";
const ENV_PREFIX: &str = "env::";

/// Whether `value` points somewhere else rather than holding the secret itself.
pub fn is_reference(value: &str) -> bool {
    value.starts_with(PASS_PREFIX) || value.starts_with(ENV_PREFIX)
}

/// Resolves a value that may be a secret reference.
pub fn resolve(value: &str) -> ClientResult<String> {
    if let Some(path) = value.strip_prefix(PASS_PREFIX) {
        from_pass(path).map_err(|reason| secret_error(value, reason))
    } else if let Some(var) = value.strip_prefix(ENV_PREFIX) {
        std::env::var(var)
            .map_err(|_| secret_error(value, format!("environment variable `{var}` is not set")))
    } else {
        Ok(value.to_string())
    }
}

/// [`resolve`] lifted over an optional config value.
pub fn resolve_opt(value: Option<&str>) -> ClientResult<Option<String>> {
    value.map(resolve).transpose()
}

fn secret_error(reference: &str, reason: String) -> ClientError {
    ClientError::Secret {
        reference: reference.to_string(),
        reason,
    }
}

fn from_pass(path: &str) -> Result<String, String> {
    let output = Command::new("pass")
        .args(["show", path])
        .output()
        .map_err(|e| format!("failed to run `pass show {path}`: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "`pass show {path}` failed ({}): {}",
            output.status,
            stderr.trim()
        ));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| format!("`pass show {path}` produced no output"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(resolve("hello").unwrap(), "hello");
        assert_eq!(resolve("").unwrap(), "");
        assert!(!is_reference("id.apps.googleusercontent.com"));
    }

    #[test]
    fn env_reference() {
        unsafe {
            std::env::set_var("_CALI_TEST_SECRET", "s3cret");
        }
        assert!(is_reference("env::_CALI_TEST_SECRET"));
        assert_eq!(resolve("env::_CALI_TEST_SECRET").unwrap(), "s3cret");
        assert_eq!(
            resolve_opt(Some("env::_CALI_TEST_SECRET")).unwrap().as_deref(),
            Some("s3cret")
        );
        unsafe {
            std::env::remove_var("_CALI_TEST_SECRET");
        }
    }

    #[test]
    fn missing_env_var() {
        let err = resolve("env::_CALI_DOES_NOT_EXIST_4711").unwrap_err();
        assert!(err.to_string().contains("is not set"));
        assert!(matches!(err, ClientError::Secret { .. }));
    }

    #[test]
    fn missing_pass_entry() {
        // Fails whether or not `pass` is installed.
        assert!(resolve("pass::cali/does/not/exist/4711").is_err());
    }

    #[test]
    fn none_stays_none() {
        assert_eq!(resolve_opt(None).unwrap(), None);
    }
}
