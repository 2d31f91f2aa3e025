//! Google Calendar API v3 client.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::Stream;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use cali_core::time::format_rfc3339;
use cali_core::{
    AddEventRequest, AddEventResponse, DeleteEventRequest, DeleteEventResponse, Event,
    EventPage, GetEventRequest, ListEventsRequest, ListEventsResponse, TimeBounds,
    UpdateEventRequest, UpdateEventResponse, resolve_calendar_id,
};

use crate::error::{ProviderError, ProviderResult};
use crate::token_source::{AuthKind, TokenSource};

use super::api::{ApiErrorBody, ApiEvent, ApiEventList};
use super::mapper::{event_to_response, request_to_event, update_to_event};

/// Google Calendar API v3 base URL.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const CREATE_OP: &str = "unable to create event";
const GET_OP: &str = "unable to get event";
const UPDATE_OP: &str = "unable to update event";
const DELETE_OP: &str = "unable to delete event";
const LIST_OP: &str = "unable to retrieve events";

/// Client for one calendar API endpoint.
///
/// Cheap to clone; clones share the HTTP connection pool and token source.
#[derive(Clone)]
pub struct CalendarClient {
    http_client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl std::fmt::Debug for CalendarClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarClient")
            .field("base_url", &self.base_url)
            .field("auth", &self.tokens.kind())
            .finish()
    }
}

impl CalendarClient {
    pub fn new(tokens: Arc<dyn TokenSource>) -> ProviderResult<Self> {
        Self::with_timeout(tokens, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(tokens: Arc<dyn TokenSource>, timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cali/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::internal(format!("unable to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: CALENDAR_API_BASE.to_string(),
            tokens,
        })
    }

    /// Points the client at another API base (e.g. a mock server).
    pub fn with_endpoint(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    pub fn auth_kind(&self) -> AuthKind {
        self.tokens.kind()
    }

    /// Inserts a new event.
    pub async fn create_event(&self, request: &AddEventRequest) -> ProviderResult<AddEventResponse> {
        let calendar_id = resolve_calendar_id(request.calendar_id.as_deref());
        let body = request_to_event(request);

        let created: ApiEvent = async {
            let response = self
                .execute(self.http_client.post(self.events_url(calendar_id)).json(&body))
                .await?;
            decode::<ApiEvent>(response).await
        }
        .await
        .map_err(|e| e.with_operation(CREATE_OP))?;

        debug!(calendar_id, event_id = ?created.id, "created event");
        let summary = created.summary.as_deref().unwrap_or(&request.summary);
        Ok(AddEventResponse::created(
            created.id.clone().unwrap_or_default(),
            summary,
            created.html_link.clone().unwrap_or_default(),
            calendar_id,
        ))
    }

    /// Fetches one event.
    pub async fn get_event(&self, request: &GetEventRequest) -> ProviderResult<Event> {
        let calendar_id = resolve_calendar_id(request.calendar_id.as_deref());
        let event = self
            .fetch_event(calendar_id, &request.event_id)
            .await
            .map_err(|e| e.with_operation(GET_OP))?;
        Ok(event_to_response(&event, calendar_id))
    }

    /// Applies a sparse patch: fetch, merge, then full replace.
    ///
    /// Not atomic; a concurrent edit between the fetch and the replace is
    /// overwritten.
    pub async fn update_event(
        &self,
        request: &UpdateEventRequest,
    ) -> ProviderResult<UpdateEventResponse> {
        let calendar_id = resolve_calendar_id(request.calendar_id.as_deref());
        let existing = self
            .fetch_event(calendar_id, &request.event_id)
            .await
            .map_err(|e| e.with_operation(GET_OP))?;

        let body = update_to_event(request, existing);
        let updated: ApiEvent = async {
            let url = self.event_url(calendar_id, &request.event_id);
            let response = self.execute(self.http_client.put(url).json(&body)).await?;
            decode::<ApiEvent>(response).await
        }
        .await
        .map_err(|e| e.with_operation(UPDATE_OP))?;

        debug!(calendar_id, event_id = %request.event_id, "updated event");
        Ok(UpdateEventResponse::updated(
            updated.id.clone().unwrap_or_else(|| request.event_id.clone()),
            updated.summary.as_deref().unwrap_or_default(),
            updated.html_link.clone().unwrap_or_default(),
            calendar_id,
        ))
    }

    pub async fn delete_event(
        &self,
        request: &DeleteEventRequest,
    ) -> ProviderResult<DeleteEventResponse> {
        let calendar_id = resolve_calendar_id(request.calendar_id.as_deref());
        async {
            require_event_id(&request.event_id)?;
            let url = self.event_url(calendar_id, &request.event_id);
            self.execute(self.http_client.delete(url)).await
        }
        .await
        .map_err(|e| e.with_operation(DELETE_OP))?;

        debug!(calendar_id, event_id = %request.event_id, "deleted event");
        Ok(DeleteEventResponse::deleted(calendar_id))
    }

    /// Streams one page of events.
    ///
    /// A producer task fetches the page and hands items over one at a time;
    /// a trailing [`ListEventsResponse::NextAnchor`] is sent when more pages
    /// exist. Cancelling `cancel` stops the producer and yields a single
    /// cancelled error. Dropping the stream stops the producer too.
    pub fn list_events(&self, request: ListEventsRequest, cancel: CancellationToken) -> ListStream {
        let (tx, rx) = mpsc::channel(1);
        let client = self.clone();

        tokio::spawn(async move {
            let calendar_id = resolve_calendar_id(request.calendar_id.as_deref()).to_string();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(%calendar_id, "event listing cancelled");
                    let err = ProviderError::cancelled().with_operation(LIST_OP);
                    tokio::select! {
                        _ = tx.send(Err(err)) => {}
                        _ = tx.closed() => {}
                    }
                }
                _ = tx.closed() => debug!(%calendar_id, "event listing abandoned"),
                _ = client.produce_page(&calendar_id, &request, &tx) => {}
            }
        });

        ListStream { rx }
    }

    /// Follows next anchors until the listing is exhausted.
    pub async fn collect_all(
        &self,
        mut request: ListEventsRequest,
        cancel: CancellationToken,
    ) -> ProviderResult<Vec<Event>> {
        let mut events = Vec::new();
        loop {
            let page = self
                .list_events(request.clone(), cancel.clone())
                .collect_page()
                .await?;
            events.extend(page.events);

            match page.next_anchor {
                Some(anchor) if request.anchor.as_deref() == Some(anchor.as_str()) => {
                    return Err(ProviderError::invalid_response(format!(
                        "pagination did not advance past anchor '{anchor}'"
                    ))
                    .with_operation(LIST_OP));
                }
                Some(anchor) => request.anchor = Some(anchor),
                None => return Ok(events),
            }
        }
    }

    async fn produce_page(
        &self,
        calendar_id: &str,
        request: &ListEventsRequest,
        tx: &mpsc::Sender<ProviderResult<ListEventsResponse>>,
    ) {
        let query = list_query(request, Utc::now());
        let page = async {
            let builder = self.http_client.get(self.events_url(calendar_id)).query(&query);
            let response = self.execute(builder).await?;
            decode::<ApiEventList>(response).await
        }
        .await;

        let page = match page {
            Ok(page) => page,
            Err(e) => {
                error!(calendar_id, error = %e, "unable to retrieve events");
                let _ = tx.send(Err(e.with_operation(LIST_OP))).await;
                return;
            }
        };

        let next_page_token = page.next_page_token.filter(|t| !t.is_empty());
        debug!(
            calendar_id,
            count = page.items.len(),
            has_next_page = next_page_token.is_some(),
            "retrieved events"
        );

        for item in &page.items {
            let event = event_to_response(item, calendar_id);
            if tx.send(Ok(ListEventsResponse::Event(event))).await.is_err() {
                return;
            }
        }
        if let Some(token) = next_page_token {
            let _ = tx.send(Ok(ListEventsResponse::NextAnchor(token))).await;
        }
    }

    async fn fetch_event(&self, calendar_id: &str, event_id: &str) -> ProviderResult<ApiEvent> {
        require_event_id(event_id)?;
        let url = self.event_url(calendar_id, event_id);
        let response = self.execute(self.http_client.get(url)).await?;
        decode(response).await
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(event_id)
        )
    }

    /// Authorizes and sends a request, turning non-success statuses into errors.
    async fn execute(&self, builder: RequestBuilder) -> ProviderResult<reqwest::Response> {
        let token = self.tokens.access_token().await?;
        let response = builder.bearer_auth(token).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timed out".to_string()
            } else if e.is_connect() {
                format!("connection failed: {e}")
            } else {
                format!("request failed: {e}")
            };
            ProviderError::network(message).with_source(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

/// A stream of listing items fed by a producer task.
///
/// Consume it with [`ListStream::next`] or as a [`Stream`].
#[derive(Debug)]
pub struct ListStream {
    rx: mpsc::Receiver<ProviderResult<ListEventsResponse>>,
}

impl ListStream {
    pub async fn next(&mut self) -> Option<ProviderResult<ListEventsResponse>> {
        self.rx.recv().await
    }

    /// Drains the stream into a page, stopping at the first error.
    pub async fn collect_page(mut self) -> ProviderResult<EventPage> {
        let mut page = EventPage::default();
        while let Some(item) = self.next().await {
            page.push(item?);
        }
        Ok(page)
    }
}

impl Stream for ListStream {
    type Item = ProviderResult<ListEventsResponse>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Resolves the start-time window of a listing.
///
/// Explicit bounds win and are both applied; otherwise `future` means
/// "from now" and `past` means "until now". Bounds at or before the Unix
/// epoch count as unset.
pub fn resolve_time_bounds(request: &ListEventsRequest, now: DateTime<Utc>) -> TimeBounds {
    let after = request.after.filter(|t| t.timestamp() > 0);
    let before = request.before.filter(|t| t.timestamp() > 0);
    if after.is_some() || before.is_some() {
        TimeBounds {
            min: after,
            max: before,
        }
    } else if request.future == Some(true) {
        TimeBounds::after(now)
    } else if request.past == Some(true) {
        TimeBounds::before(now)
    } else {
        TimeBounds::NONE
    }
}

/// Query parameters for `events.list`.
pub fn list_query(request: &ListEventsRequest, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
    let mut query = vec![("singleEvents", "true".to_string())];

    let bounds = resolve_time_bounds(request, now);
    if let Some(min) = bounds.min {
        query.push(("timeMin", format_rfc3339(min)));
    }
    if let Some(max) = bounds.max {
        query.push(("timeMax", format_rfc3339(max)));
    }
    if bounds.is_active() {
        query.push(("orderBy", "startTime".to_string()));
    }
    if let Some(limit) = request.limit.filter(|l| *l > 0) {
        query.push(("maxResults", limit.to_string()));
    }
    if let Some(anchor) = request.anchor.as_deref().filter(|a| !a.is_empty()) {
        query.push(("pageToken", anchor.to_string()));
    }
    query
}

fn require_event_id(event_id: &str) -> ProviderResult<()> {
    if event_id.is_empty() {
        return Err(ProviderError::invalid_input("event id is required"));
    }
    Ok(())
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ProviderResult<T> {
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::network(format!("failed to read response: {e}")))?;
    serde_json::from_str(&body).map_err(|e| {
        ProviderError::invalid_response(format!("failed to parse response: {e}")).with_source(e)
    })
}

/// Maps a non-success status onto the error taxonomy, preferring the
/// message from a Google-style error body.
fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    let message = if message.is_empty() {
        status.to_string()
    } else {
        message
    };

    match status {
        StatusCode::NOT_FOUND => ProviderError::not_found(message),
        StatusCode::BAD_REQUEST => ProviderError::invalid_input(message),
        StatusCode::UNAUTHORIZED => {
            ProviderError::authentication(format!("access token rejected: {message}"))
        }
        StatusCode::FORBIDDEN => ProviderError::authorization(format!("access denied: {message}")),
        StatusCode::TOO_MANY_REQUESTS => {
            ProviderError::rate_limited(format!("rate limited: {message}"))
        }
        _ => ProviderError::server(format!("API error ({status}): {message}")),
    }
}
