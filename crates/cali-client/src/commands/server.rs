//! Server command: runs the daemon in the foreground.
//!
//! Wires the daemon pieces together:
//! - PID file (one daemon per socket)
//! - signal handler (SIGTERM/SIGINT shut down, SIGHUP is logged)
//! - lazily built calendar client from the config file
//! - socket server

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use cali_providers::ProviderError;
use cali_server::{
    ClientFactory, PidFile, ServerState, SignalHandler, SocketServer, default_pid_path,
    default_socket_path, make_connection_handler,
};

use crate::commands::Context;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Starts the daemon and blocks until it is shut down.
pub async fn run(ctx: &Context) -> ClientResult<()> {
    let config = Arc::new(ctx.config.clone());
    if let Err(e) = config.calendar_client() {
        warn!(error = %e, "calendar requests will fail until credentials are configured");
    }

    let server_config = config.server_config(Some(ctx.socket_path.as_path()));
    let _pid_file = PidFile::create(pid_path_for(&server_config.socket_path))?;

    let signals = SignalHandler::new();
    signals.spawn_listener()?;

    let state = ServerState::new(
        client_factory(config.clone()),
        server_config.request_timeout,
        signals.shutdown_handle(),
    )
    .into_shared();

    let socket_path = server_config.socket_path.clone();
    let server = SocketServer::new(server_config).await?;
    info!(
        path = %socket_path.display(),
        endpoint = config.api_endpoint.as_deref().unwrap_or("google"),
        "daemon listening"
    );

    server
        .run_until_shutdown(make_connection_handler(state), signals.shutdown().wait())
        .await?;

    info!("daemon stopped");
    Ok(())
}

/// Builds the calendar client on first use, from the config loaded at startup.
pub fn client_factory(config: Arc<ClientConfig>) -> ClientFactory {
    Arc::new(move || {
        config.calendar_client().map_err(|e| match e {
            ClientError::Provider(err) => err,
            other => ProviderError::configuration(other.to_string()),
        })
    })
}

/// The default socket keeps the default PID file; any other socket gets a
/// PID file next to it so several daemons can coexist.
fn pid_path_for(socket_path: &Path) -> PathBuf {
    if socket_path == default_socket_path() {
        default_pid_path()
    } else {
        let pid_path = socket_path.with_extension("pid");
        if pid_path == socket_path {
            warn!(path = %socket_path.display(), "socket path ends in .pid");
        }
        pid_path
    }
}
