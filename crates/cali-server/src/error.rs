//! Server error types.

use std::io;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] cali_protocol::ProtocolError),

    #[error("socket path already in use: {path}")]
    SocketInUse { path: String },

    #[error("socket path parent directory does not exist: {path}")]
    SocketPathInvalid { path: String },

    #[error("daemon is already running (PID file exists: {path})")]
    AlreadyRunning { path: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    /// A client asked the daemon to stop.
    #[error("server shutdown requested")]
    Shutdown,
}

impl ServerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn socket_in_use(path: impl Into<String>) -> Self {
        Self::SocketInUse { path: path.into() }
    }

    pub fn socket_path_invalid(path: impl Into<String>) -> Self {
        Self::SocketPathInvalid { path: path.into() }
    }

    pub fn already_running(path: impl Into<String>) -> Self {
        Self::AlreadyRunning { path: path.into() }
    }

    /// Whether the peer went away; such errors end a connection quietly.
    pub fn is_disconnect(&self) -> bool {
        let io = match self {
            Self::Io(e) => e,
            Self::Protocol(cali_protocol::ProtocolError::Io(e)) => e,
            _ => return false,
        };
        matches!(
            io.kind(),
            io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::UnexpectedEof
        )
    }
}
