//! Error types for calendar operations.
//!
//! Every failure carries a [`ProviderErrorCode`]. Codes fold into the coarse
//! [`ErrorCategory`] callers act on: not found, invalid input, upstream
//! failure, cancellation, or missing configuration. Errors raised by the
//! calendar client are tagged with the operation that failed
//! (`unable to get event`), which prefixes the rendered message.

use std::fmt;
use thiserror::Error;

/// Fine-grained error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Calendar or event does not exist (404).
    NotFound,
    /// Malformed request, rejected body or bad timestamp (400).
    InvalidInput,
    /// The caller cancelled the operation.
    Cancelled,
    /// Credentials are invalid or expired (401).
    AuthenticationFailed,
    /// Credentials lack permission (403).
    AuthorizationFailed,
    /// Connection failed, timed out or DNS did not resolve.
    NetworkError,
    /// Too many requests (429).
    RateLimited,
    /// Any other non-success status.
    ServerError,
    /// The response body could not be decoded.
    InvalidResponse,
    /// Missing or unusable configuration or credentials.
    ConfigurationError,
    /// Unexpected local failure.
    InternalError,
}

/// Coarse classification of a [`ProviderErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    InvalidInput,
    UpstreamFailure,
    Cancelled,
    Configuration,
}

impl ProviderErrorCode {
    /// Whether a retry could succeed. The client itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError
        )
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound => ErrorCategory::NotFound,
            Self::InvalidInput => ErrorCategory::InvalidInput,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::ConfigurationError => ErrorCategory::Configuration,
            Self::AuthenticationFailed
            | Self::AuthorizationFailed
            | Self::NetworkError
            | Self::RateLimited
            | Self::ServerError
            | Self::InvalidResponse
            | Self::InternalError => ErrorCategory::UpstreamFailure,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidInput => "invalid_input",
            Self::Cancelled => "cancelled",
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised while talking to the calendar API or handling credentials.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// Operation context, e.g. "unable to create event".
    operation: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            operation: None,
            source: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidInput, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ProviderErrorCode::Cancelled, "operation cancelled")
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthorizationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Tags the error with the operation that failed.
    ///
    /// The first tag wins so that inner helpers cannot overwrite the caller's context.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        if self.operation.is_none() {
            self.operation = Some(operation.into());
        }
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ProviderErrorCode::NotFound
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == ProviderErrorCode::Cancelled
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(operation) = &self.operation {
            write!(f, "{operation}: ")?;
        }
        write!(f, "{} ({})", self.message, self.code)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
