//! Daemon configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Socket server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub socket_path: PathBuf,

    /// Limit on each frame read or write, and on each calendar call.
    pub request_timeout: Duration,

    pub max_connections: usize,

    /// Remove a leftover socket file nobody is listening on.
    pub cleanup_stale_socket: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            request_timeout: Duration::from_secs(60),
            max_connections: 32,
            cleanup_stale_socket: true,
        }
    }
}

impl ServerConfig {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Default::default()
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn with_cleanup_stale_socket(mut self, cleanup: bool) -> Self {
        self.cleanup_stale_socket = cleanup;
        self
    }
}

fn current_uid() -> u32 {
    #[cfg(unix)]
    {
        // SAFETY: getuid has no preconditions and cannot fail.
        unsafe { libc::getuid() }
    }
    #[cfg(not(unix))]
    {
        0
    }
}

fn runtime_path(file_name: &str, fallback_ext: &str) -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join(file_name),
        _ => PathBuf::from(format!("/tmp/cali-{}.{fallback_ext}", current_uid())),
    }
}

/// `$XDG_RUNTIME_DIR/cali.sock`, or `/tmp/cali-$UID.sock`.
pub fn default_socket_path() -> PathBuf {
    runtime_path("cali.sock", "sock")
}

/// `$XDG_RUNTIME_DIR/cali.pid`, or `/tmp/cali-$UID.pid`.
pub fn default_pid_path() -> PathBuf {
    runtime_path("cali.pid", "pid")
}
