//! Unix socket listener for IPC.
//!
//! Frames are read and written with the shared `cali_protocol` framing; each
//! accepted connection holds a permit from the connection semaphore until it
//! is dropped.

use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::Interest;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use cali_protocol::{Envelope, PROTOCOL_VERSION, Request, Response, read_frame, write_frame};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Socket file permissions: owner read/write only.
const SOCKET_MODE: u32 = 0o600;

pub struct SocketServer {
    config: ServerConfig,
    listener: UnixListener,
    connection_semaphore: Arc<Semaphore>,
}

impl SocketServer {
    /// Binds the configured socket path.
    ///
    /// A socket file that refuses connections is treated as stale and removed
    /// when `cleanup_stale_socket` is set; a live one is an error.
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        let socket_path = &config.socket_path;

        if let Some(parent) = socket_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            return Err(ServerError::socket_path_invalid(
                parent.to_string_lossy().to_string(),
            ));
        }

        if socket_path.exists() {
            if !config.cleanup_stale_socket {
                return Err(ServerError::socket_in_use(
                    socket_path.to_string_lossy().to_string(),
                ));
            }
            if UnixStream::connect(socket_path).await.is_ok() {
                return Err(ServerError::socket_in_use(
                    socket_path.to_string_lossy().to_string(),
                ));
            }
            info!(path = %socket_path.display(), "removing stale socket");
            std::fs::remove_file(socket_path)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(SOCKET_MODE))?;
        info!(path = %socket_path.display(), "socket server listening");

        let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));
        Ok(Self {
            config,
            listener,
            connection_semaphore,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Waits for a free connection slot, then for a client.
    pub async fn accept(&self) -> ServerResult<Connection> {
        let permit = self
            .connection_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ServerError::Shutdown)?;

        let (stream, _addr) = self.listener.accept().await?;
        debug!("accepted connection");

        Ok(Connection {
            stream,
            timeout: self.config.request_timeout,
            _permit: permit,
        })
    }

    /// Accept loop; every connection runs on its own task.
    pub async fn run<F, Fut>(&self, handler: F) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        loop {
            match self.accept().await {
                Ok(connection) => {
                    tokio::spawn(handler(connection));
                }
                Err(ServerError::Shutdown) => return Ok(()),
                Err(e) => error!(error = %e, "failed to accept connection"),
            }
        }
    }

    /// Runs the accept loop until `shutdown` completes.
    pub async fn run_until_shutdown<F, Fut, S>(&self, handler: F, shutdown: S) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
        S: Future<Output = ()> + Send,
    {
        tokio::select! {
            result = self.run(handler) => result,
            _ = shutdown => {
                info!("shutdown signal received");
                Ok(())
            }
        }
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        let path = &self.config.socket_path;
        if !path.exists() {
            return;
        }
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed socket file"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove socket file"),
        }
    }
}

/// One client connection.
pub struct Connection {
    stream: UnixStream,
    timeout: Duration,
    _permit: OwnedSemaphorePermit,
}

impl Connection {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reads the next request. `Ok(None)` means the client closed the connection.
    pub async fn read_request(&mut self) -> ServerResult<Option<Envelope<Request>>> {
        let Some(envelope): Option<Envelope<Request>> =
            read_frame(&mut self.stream, Some(self.timeout)).await?
        else {
            return Ok(None);
        };

        if !envelope.is_compatible() {
            warn!(
                version = %envelope.protocol_version,
                expected = PROTOCOL_VERSION,
                "incompatible protocol version"
            );
        }
        Ok(Some(envelope))
    }

    pub async fn write_response(&mut self, envelope: &Envelope<Response>) -> ServerResult<()> {
        write_frame(&mut self.stream, envelope, Some(self.timeout)).await?;
        Ok(())
    }

    pub async fn respond(&mut self, request_id: &str, response: Response) -> ServerResult<()> {
        self.write_response(&Envelope::response(request_id, response))
            .await
    }

    /// Completes once the peer has closed its end of the connection.
    ///
    /// Nothing is consumed: bytes already sent by the peer stay queued for the
    /// next [`read_request`](Self::read_request), and while any are pending the
    /// peer counts as connected.
    pub async fn closed(&self) {
        loop {
            if self.stream.readable().await.is_err() {
                return;
            }
            match self
                .stream
                .try_io(Interest::READABLE, || peek_byte(&self.stream))
            {
                Ok(0) => return,
                Ok(_) => return std::future::pending().await,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(_) => return,
            }
        }
    }
}

/// Peeks at the next byte without removing it from the socket buffer.
fn peek_byte(stream: &UnixStream) -> io::Result<usize> {
    let mut byte = 0u8;
    // SAFETY: the fd is owned by `stream` for the duration of the call and the
    // buffer is a valid one-byte local.
    let n = unsafe {
        libc::recv(
            stream.as_raw_fd(),
            (&mut byte as *mut u8).cast(),
            1,
            libc::MSG_PEEK | libc::MSG_DONTWAIT,
        )
    };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}
