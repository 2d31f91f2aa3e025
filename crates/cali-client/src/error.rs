//! Client error types.

use std::fmt;

use cali_core::{FormatError, TimestampError};
use cali_protocol::{ErrorResponse, ProtocolError};
use cali_providers::ProviderError;
use cali_server::ServerError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// A `pass::` or `env::` reference could not be resolved.
    Secret { reference: String, reason: String },
    /// Calendar API or credential error.
    Provider(ProviderError),
    /// The daemon answered with an error frame.
    Daemon(ErrorResponse),
    /// Connection to the daemon failed.
    Connection(String),
    /// Protocol/framing error.
    Protocol(ProtocolError),
    /// The daemon could not be started.
    Server(ServerError),
    /// A timestamp argument is not RFC3339.
    Timestamp(TimestampError),
    /// Rendering the result failed.
    Format(FormatError),
    /// IO error.
    Io(std::io::Error),
}

impl ClientError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Secret { reference, reason } => {
                write!(f, "failed to resolve secret '{}': {}", reference, reason)
            }
            Self::Provider(err) => write!(f, "{}", err),
            Self::Daemon(err) => write!(f, "{}", err.message),
            Self::Connection(msg) => write!(f, "connection error: {}", msg),
            Self::Protocol(err) => write!(f, "protocol error: {}", err),
            Self::Server(err) => write!(f, "server error: {}", err),
            Self::Timestamp(err) => write!(f, "{}", err),
            Self::Format(err) => write!(f, "{}", err),
            Self::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Provider(err) => Some(err),
            Self::Protocol(err) => Some(err),
            Self::Server(err) => Some(err),
            Self::Timestamp(err) => Some(err),
            Self::Format(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err)
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<ServerError> for ClientError {
    fn from(err: ServerError) -> Self {
        Self::Server(err)
    }
}

impl From<TimestampError> for ClientError {
    fn from(err: TimestampError) -> Self {
        Self::Timestamp(err)
    }
}

impl From<FormatError> for ClientError {
    fn from(err: FormatError) -> Self {
        Self::Format(err)
    }
}

impl From<ErrorResponse> for ClientError {
    fn from(err: ErrorResponse) -> Self {
        Self::Daemon(err)
    }
}
