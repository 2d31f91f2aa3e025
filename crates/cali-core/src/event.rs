//! Request and response schema for calendar operations.
//!
//! These are the shapes the CLI, the daemon protocol and the output renderers
//! agree on. Optional fields stay `None` when the caller did not provide them;
//! the mapping layer relies on that to avoid overwriting provider defaults
//! (an unset guest permission is not the same as `false`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Calendar used when a request does not name one.
pub const DEFAULT_CALENDAR_ID: &str = "primary";

/// Returns the calendar id to use, falling back to [`DEFAULT_CALENDAR_ID`].
pub fn resolve_calendar_id(calendar_id: Option<&str>) -> &str {
    match calendar_id {
        Some(id) if !id.is_empty() => id,
        _ => DEFAULT_CALENDAR_ID,
    }
}

/// A calendar event as presented to callers.
///
/// Every optional provider field is `Some` only when the provider returned a
/// non-empty value for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub html_link: String,
    #[serde(default)]
    pub calendar_id: String,
}

/// Create a new event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddEventRequest {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Defaults to the top of the next hour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Defaults to one hour after the start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
    /// Becomes the event id so a retried create does not duplicate the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests_can_see_other_guests: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests_can_modify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests_can_invite_others: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// `true` marks the slot busy (opaque); anything else leaves it free.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks_time: Option<bool>,
}

impl AddEventRequest {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddEventResponse {
    pub event_id: String,
    pub success: bool,
    pub message: String,
    pub html_link: String,
    pub calendar_id: String,
}

impl AddEventResponse {
    pub fn created(event_id: String, summary: &str, html_link: String, calendar_id: &str) -> Self {
        Self {
            event_id,
            success: true,
            message: format!("Event '{summary}' added successfully to Google Calendar"),
            html_link,
            calendar_id: calendar_id.to_string(),
        }
    }
}

/// Sparse patch of an existing event: only `Some` fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    pub event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests_can_see_other_guests: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests_can_modify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests_can_invite_others: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks_time: Option<bool>,
}

impl UpdateEventRequest {
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEventResponse {
    pub event_id: String,
    pub success: bool,
    pub message: String,
    pub html_link: String,
    pub calendar_id: String,
}

impl UpdateEventResponse {
    pub fn updated(event_id: String, summary: &str, html_link: String, calendar_id: &str) -> Self {
        Self {
            event_id,
            success: true,
            message: format!("Event '{summary}' updated successfully in Google Calendar"),
            html_link,
            calendar_id: calendar_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetEventRequest {
    pub event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEventRequest {
    pub event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEventResponse {
    pub success: bool,
    pub message: String,
    pub calendar_id: String,
}

impl DeleteEventResponse {
    pub fn deleted(calendar_id: &str) -> Self {
        Self {
            success: true,
            message: "Event deleted successfully from Google Calendar".to_string(),
            calendar_id: calendar_id.to_string(),
        }
    }
}

/// One page of a listing.
///
/// Explicit `after`/`before` bounds win over the `future`/`past` flags;
/// `future` wins over `past`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEventsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub future: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub past: Option<bool>,
    /// Page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Continuation cursor returned by a previous page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

/// An item of a listing stream: an event, or the trailing continuation cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListEventsResponse {
    Event(Event),
    NextAnchor(String),
}

impl ListEventsResponse {
    pub fn event(&self) -> Option<&Event> {
        match self {
            Self::Event(event) => Some(event),
            Self::NextAnchor(_) => None,
        }
    }

    pub fn next_anchor(&self) -> Option<&str> {
        match self {
            Self::NextAnchor(anchor) => Some(anchor),
            Self::Event(_) => None,
        }
    }
}

/// A fully collected listing, as rendered by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_anchor: Option<String>,
}

impl EventPage {
    /// Folds listing items into a page; the last anchor seen wins.
    pub fn push(&mut self, item: ListEventsResponse) {
        match item {
            ListEventsResponse::Event(event) => self.events.push(event),
            ListEventsResponse::NextAnchor(anchor) => self.next_anchor = Some(anchor),
        }
    }
}

impl FromIterator<ListEventsResponse> for EventPage {
    fn from_iter<I: IntoIterator<Item = ListEventsResponse>>(iter: I) -> Self {
        let mut page = Self::default();
        for item in iter {
            page.push(item);
        }
        page
    }
}
