//! Unix socket client for the `cali` daemon.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::net::UnixStream;
use tracing::{debug, warn};
use uuid::Uuid;

use cali_core::{
    AddEventRequest, AddEventResponse, DeleteEventRequest, DeleteEventResponse, Event, EventPage,
    GetEventRequest, ListEventsRequest, UpdateEventRequest, UpdateEventResponse,
};
use cali_protocol::{Envelope, ProtocolError, Request, Response, StatusInfo, read_frame, write_frame};

use crate::error::{ClientError, ClientResult};

/// Client for the daemon's Unix socket.
///
/// Each call opens its own connection.
#[derive(Debug, Clone)]
pub struct SocketClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl SocketClient {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    /// Creates a socket client with the default socket path.
    pub fn with_defaults() -> Self {
        Self::new(cali_server::default_socket_path(), Duration::from_secs(30))
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Checks if the daemon socket exists.
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    async fn connect(&self) -> ClientResult<UnixStream> {
        debug!(socket = %self.socket_path.display(), "connecting to daemon");
        tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| {
                ClientError::Connection(format!(
                    "connection timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                ClientError::Connection(format!(
                    "failed to connect to {}: {} (is `cali server` running?)",
                    self.socket_path.display(),
                    e
                ))
            })
    }

    /// Sends `request` and returns the id it was sent under.
    async fn send_on(&self, stream: &mut UnixStream, request: Request) -> ClientResult<String> {
        let request_id = Uuid::new_v4().to_string();
        debug!(request_id = %request_id, request = request.name(), "sending request");
        write_frame(
            stream,
            &Envelope::request(&request_id, request),
            Some(self.timeout),
        )
        .await?;
        Ok(request_id)
    }

    async fn receive(&self, stream: &mut UnixStream, request_id: &str) -> ClientResult<Response> {
        let envelope: Envelope<Response> = read_frame(stream, Some(self.timeout))
            .await?
            .ok_or_else(|| ClientError::Connection("daemon closed the connection".into()))?;

        if envelope.request_id != request_id {
            warn!(
                expected = %request_id,
                received = %envelope.request_id,
                "response request_id mismatch"
            );
        }
        match envelope.payload {
            Response::Error { error } => Err(ClientError::Daemon(error)),
            payload => Ok(payload),
        }
    }

    /// Sends a request that has a single response.
    pub async fn send(&self, request: Request) -> ClientResult<Response> {
        let mut stream = self.connect().await?;
        let request_id = self.send_on(&mut stream, request).await?;
        self.receive(&mut stream, &request_id).await
    }

    /// Pings the daemon to check if it's alive.
    pub async fn ping(&self) -> bool {
        matches!(self.send(Request::Ping).await, Ok(Response::Pong))
    }

    pub async fn status(&self) -> ClientResult<StatusInfo> {
        match self.send(Request::Status).await? {
            Response::Status { info } => Ok(info),
            other => Err(unexpected(&other)),
        }
    }

    /// Asks the daemon to shut down.
    pub async fn shutdown(&self) -> ClientResult<()> {
        match self.send(Request::Shutdown).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn add_event(&self, request: AddEventRequest) -> ClientResult<AddEventResponse> {
        match self.send(Request::AddEvent { request }).await? {
            Response::EventAdded { response } => Ok(response),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn update_event(
        &self,
        request: UpdateEventRequest,
    ) -> ClientResult<UpdateEventResponse> {
        match self.send(Request::UpdateEvent { request }).await? {
            Response::EventUpdated { response } => Ok(response),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn get_event(&self, request: GetEventRequest) -> ClientResult<Event> {
        match self.send(Request::GetEvent { request }).await? {
            Response::Event { event } => Ok(event),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn delete_event(
        &self,
        request: DeleteEventRequest,
    ) -> ClientResult<DeleteEventResponse> {
        match self.send(Request::DeleteEvent { request }).await? {
            Response::EventDeleted { response } => Ok(response),
            other => Err(unexpected(&other)),
        }
    }

    /// Reads one listing stream: `list_item` frames up to `list_end`.
    pub async fn list_events(&self, request: ListEventsRequest) -> ClientResult<EventPage> {
        let mut stream = self.connect().await?;
        let request_id = self.send_on(&mut stream, Request::ListEvents { request }).await?;

        let mut page = EventPage::default();
        loop {
            match self.receive(&mut stream, &request_id).await? {
                Response::ListItem { item } => page.push(item),
                Response::ListEnd => break,
                other => return Err(unexpected(&other)),
            }
        }
        debug!(
            count = page.events.len(),
            has_next_page = page.next_anchor.is_some(),
            "listing received"
        );
        Ok(page)
    }

    /// Follows next anchors until the listing is exhausted.
    pub async fn list_all(&self, mut request: ListEventsRequest) -> ClientResult<Vec<Event>> {
        let mut events = Vec::new();
        loop {
            let page = self.list_events(request.clone()).await?;
            events.extend(page.events);
            match page.next_anchor {
                Some(anchor) if request.anchor.as_deref() == Some(anchor.as_str()) => {
                    return Err(ClientError::Protocol(ProtocolError::UnexpectedResponse(
                        format!("pagination did not advance past anchor '{anchor}'"),
                    )));
                }
                Some(anchor) => request.anchor = Some(anchor),
                None => return Ok(events),
            }
        }
    }
}

fn unexpected(response: &Response) -> ClientError {
    ClientError::Protocol(ProtocolError::UnexpectedResponse(format!("{response:?}")))
}
