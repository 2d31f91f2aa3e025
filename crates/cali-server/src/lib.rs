//! The `cali` daemon.
//!
//! Listens on a Unix socket and serves calendar requests through a single,
//! lazily built [`CalendarClient`](cali_providers::CalendarClient):
//! - length-prefixed JSON IPC (see `cali_protocol`)
//! - streamed `list_events` replies
//! - PID file and signal-driven graceful shutdown
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cali_server::{ServerConfig, ServerState, SignalHandler, SocketServer, make_connection_handler};
//!
//! # async fn run(factory: cali_server::ClientFactory) -> Result<(), Box<dyn std::error::Error>> {
//! let signals = SignalHandler::new();
//! signals.spawn_listener()?;
//! let state = ServerState::new(factory, Duration::from_secs(60), signals.shutdown_handle()).into_shared();
//! let server = SocketServer::new(ServerConfig::default()).await?;
//! server.run_until_shutdown(make_connection_handler(state), signals.shutdown().wait()).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod handler;
mod pidfile;
mod signals;
mod socket;

pub use config::{ServerConfig, default_pid_path, default_socket_path};
pub use error::{ServerError, ServerResult};
pub use handler::{
    ClientFactory, Reply, RequestHandler, ServerState, SharedState, error_code,
    make_connection_handler,
};
pub use pidfile::PidFile;
pub use signals::{ShutdownHandle, ShutdownSignal, SignalHandler};
pub use socket::{Connection, SocketServer};
