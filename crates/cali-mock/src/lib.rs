//! In-memory stand-in for the Google Calendar events API.
//!
//! Serves insert, list, get, update and delete over HTTP on a loopback port so
//! the calendar client can be exercised without network access:
//!
//! ```ignore
//! let server = MockCalendarServer::start().await?;
//! let client = CalendarClient::new(Arc::new(StaticToken::new("test")))?
//!     .with_endpoint(server.url());
//! // ... drive the client, then inspect server.store().events("primary").await
//! ```
//!
//! State lives in an [`EventStore`] owned by the server; tests can seed and
//! inspect it directly.

mod error;
mod routes;
mod store;

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use error::{MockError, MockResult};
pub use routes::{API_PREFIX, router};
pub use store::{EventStore, ListQuery};

/// A running mock server. Stops serving when dropped.
pub struct MockCalendarServer {
    addr: SocketAddr,
    store: EventStore,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MockCalendarServer {
    /// Binds `127.0.0.1:0` and serves a fresh store.
    pub async fn start() -> io::Result<Self> {
        Self::start_with_store(EventStore::new()).await
    }

    pub async fn start_with_store(store: EventStore) -> io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let app = router(store.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "mock calendar server stopped with error");
            }
        });
        debug!(%addr, "mock calendar server listening");

        Ok(Self {
            addr,
            store,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL including the API prefix, e.g. `http://127.0.0.1:41234/calendar/v3`.
    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, API_PREFIX)
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Stops accepting connections and waits for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for MockCalendarServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
