//! Request dispatch.
//!
//! Calendar requests go to a [`CalendarClient`] built on first use, so `ping`
//! and `status` work before any credentials exist. `list_events` replies are
//! streamed frame by frame from the client's [`ListStream`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info, warn};

use cali_protocol::{AuthMode, ErrorCode, Request, Response, StatusInfo};
use cali_providers::{
    AuthKind, CalendarClient, ErrorCategory, ListStream, ProviderError, ProviderResult,
};

use crate::error::{ServerError, ServerResult};
use crate::signals::ShutdownHandle;
use crate::socket::Connection;

/// Builds the calendar client. Called again on the next request after a failure.
pub type ClientFactory = Arc<dyn Fn() -> ProviderResult<CalendarClient> + Send + Sync>;

/// State shared by every connection.
pub struct ServerState {
    started_at: DateTime<Utc>,
    factory: ClientFactory,
    client: OnceCell<CalendarClient>,
    request_timeout: Duration,
    requests_served: AtomicU64,
    requests_failed: AtomicU64,
    shutdown: ShutdownHandle,
}

pub type SharedState = Arc<ServerState>;

impl ServerState {
    pub fn new(factory: ClientFactory, request_timeout: Duration, shutdown: ShutdownHandle) -> Self {
        Self {
            started_at: Utc::now(),
            factory,
            client: OnceCell::new(),
            request_timeout,
            requests_served: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            shutdown,
        }
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(self)
    }

    /// The calendar client, building it on first use.
    pub async fn client(&self) -> ProviderResult<&CalendarClient> {
        self.client
            .get_or_try_init(|| async {
                let client = (self.factory)()?;
                info!(
                    endpoint = client.endpoint(),
                    auth = %client.auth_kind(),
                    "calendar client ready"
                );
                Ok(client)
            })
            .await
    }

    pub fn uptime_seconds(&self) -> u64 {
        u64::try_from((Utc::now() - self.started_at).num_seconds()).unwrap_or(0)
    }

    pub fn status_info(&self) -> StatusInfo {
        let client = self.client.get();
        StatusInfo {
            uptime_seconds: self.uptime_seconds(),
            started_at: self.started_at,
            calendar_ready: client.is_some(),
            auth_mode: client.map(|c| auth_mode(c.auth_kind())),
            endpoint: client.map(|c| c.endpoint().to_string()).unwrap_or_default(),
            requests_served: self.requests_served.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
        }
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.is_shutdown()
    }

    fn record_request(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }
}

fn auth_mode(kind: AuthKind) -> AuthMode {
    match kind {
        AuthKind::ServiceAccount => AuthMode::ServiceAccount,
        AuthKind::OAuth => AuthMode::OAuth,
        AuthKind::Static => AuthMode::Static,
    }
}

/// Maps a provider failure onto the IPC error taxonomy.
pub fn error_code(error: &ProviderError) -> ErrorCode {
    match error.category() {
        ErrorCategory::NotFound => ErrorCode::NotFound,
        ErrorCategory::InvalidInput => ErrorCode::InvalidRequest,
        ErrorCategory::UpstreamFailure => ErrorCode::UpstreamFailure,
        ErrorCategory::Cancelled => ErrorCode::Cancelled,
        ErrorCategory::Configuration => ErrorCode::NotConfigured,
    }
}

fn error_response(error: &ProviderError) -> Response {
    Response::error(error_code(error), error.to_string())
}

fn timed_out(operation: &str) -> ProviderError {
    ProviderError::network("request timed out").with_operation(operation)
}

/// What a request is answered with.
pub enum Reply {
    Single(Response),
    /// `list_item` frames from the stream, then `list_end`.
    Stream {
        stream: ListStream,
        cancel: CancellationToken,
    },
}

pub struct RequestHandler {
    state: SharedState,
}

impl RequestHandler {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Handles one request.
    #[tracing::instrument(skip_all, fields(request = request.name(), duration_ms))]
    pub async fn handle(&self, request: Request) -> Reply {
        let start = std::time::Instant::now();
        self.state.record_request();

        let reply = self.dispatch(request).await;
        if let Reply::Single(response) = &reply
            && !response.is_success()
        {
            self.state.record_failure();
        }

        let elapsed = start.elapsed().as_millis();
        Span::current().record("duration_ms", elapsed);
        debug!(duration_ms = elapsed, "request handled");
        reply
    }

    async fn dispatch(&self, request: Request) -> Reply {
        if request.needs_calendar() && self.state.shutdown_requested() {
            return Reply::Single(Response::error(
                ErrorCode::ShuttingDown,
                "daemon is shutting down",
            ));
        }

        let response = match request {
            Request::Ping => Response::Pong,
            Request::Status => Response::status(self.state.status_info()),
            Request::Shutdown => {
                info!("shutdown requested by client");
                self.state.shutdown.trigger();
                Response::Ok
            }
            Request::ListEvents { request } => {
                let client = match self.state.client().await {
                    Ok(client) => client,
                    Err(e) => return Reply::Single(error_response(&e)),
                };
                let cancel = CancellationToken::new();
                let stream = client.list_events(request, cancel.clone());
                return Reply::Stream { stream, cancel };
            }
            request => match self.calendar_call(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "calendar request failed");
                    error_response(&e)
                }
            },
        };
        Reply::Single(response)
    }

    async fn calendar_call(&self, request: Request) -> ProviderResult<Response> {
        let client = self.state.client().await?;
        let limit = self.state.request_timeout;

        let response = match request {
            Request::AddEvent { request } => {
                let created = tokio::time::timeout(limit, client.create_event(&request))
                    .await
                    .map_err(|_| timed_out("unable to create event"))??;
                Response::EventAdded { response: created }
            }
            Request::UpdateEvent { request } => {
                let updated = tokio::time::timeout(limit, client.update_event(&request))
                    .await
                    .map_err(|_| timed_out("unable to update event"))??;
                Response::EventUpdated { response: updated }
            }
            Request::GetEvent { request } => {
                let event = tokio::time::timeout(limit, client.get_event(&request))
                    .await
                    .map_err(|_| timed_out("unable to get event"))??;
                Response::Event { event }
            }
            Request::DeleteEvent { request } => {
                let deleted = tokio::time::timeout(limit, client.delete_event(&request))
                    .await
                    .map_err(|_| timed_out("unable to delete event"))??;
                Response::EventDeleted { response: deleted }
            }
            other => {
                return Err(ProviderError::internal(format!(
                    "{} is not a calendar request",
                    other.name()
                )));
            }
        };
        Ok(response)
    }

    /// Forwards a listing to the client. Stops and cancels the producer when
    /// the client goes away.
    async fn stream_list(
        &self,
        conn: &mut Connection,
        request_id: &str,
        mut stream: ListStream,
        cancel: CancellationToken,
    ) -> ServerResult<()> {
        let limit = self.state.request_timeout;
        let mut sent = 0usize;

        loop {
            let next = tokio::select! {
                next = tokio::time::timeout(limit, stream.next()) => next,
                () = conn.closed() => {
                    cancel.cancel();
                    debug!(sent, "client went away while events were being fetched");
                    return Ok(());
                }
            };
            let item = match next {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(_) => {
                    cancel.cancel();
                    Err(timed_out("unable to retrieve events"))
                }
            };

            let (response, done) = match item {
                Ok(item) => (Response::ListItem { item }, false),
                Err(e) => {
                    self.state.record_failure();
                    warn!(error = %e, sent, "event listing failed");
                    (error_response(&e), true)
                }
            };
            if let Err(e) = conn.respond(request_id, response).await {
                cancel.cancel();
                debug!(sent, "client went away during listing");
                return Err(e);
            }
            if done {
                return Ok(());
            }
            sent += 1;
        }

        debug!(sent, "event listing complete");
        conn.respond(request_id, Response::ListEnd).await
    }

    /// Serves requests until the client disconnects or asks for shutdown.
    pub async fn handle_connection(&self, mut conn: Connection) -> ServerResult<()> {
        loop {
            let Some(envelope) = conn.read_request().await? else {
                debug!("client disconnected");
                return Ok(());
            };
            let is_shutdown = matches!(envelope.payload, Request::Shutdown);

            match self.handle(envelope.payload).await {
                Reply::Single(response) => conn.respond(&envelope.request_id, response).await?,
                Reply::Stream { stream, cancel } => {
                    self.stream_list(&mut conn, &envelope.request_id, stream, cancel)
                        .await?
                }
            }

            if is_shutdown {
                return Err(ServerError::Shutdown);
            }
        }
    }
}

/// Connection callback for [`SocketServer::run`](crate::SocketServer::run).
pub fn make_connection_handler(
    state: SharedState,
) -> impl Fn(Connection) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static
{
    move |conn| {
        let handler = RequestHandler::new(state.clone());
        Box::pin(async move {
            match handler.handle_connection(conn).await {
                Ok(()) | Err(ServerError::Shutdown) => {}
                Err(e) if e.is_disconnect() => debug!(error = %e, "connection closed"),
                Err(e) => warn!(error = %e, "connection handler error"),
            }
        })
    }
}
