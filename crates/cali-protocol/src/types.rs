//! Request and response types for the daemon protocol.

use cali_core::{
    AddEventRequest, AddEventResponse, DeleteEventRequest, DeleteEventResponse, Event,
    GetEventRequest, ListEventsRequest, ListEventsResponse, UpdateEventRequest,
    UpdateEventResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PROTOCOL_VERSION;

/// Message envelope wrapping all protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub protocol_version: String,
    /// Correlates responses (including every frame of a list stream) with their request.
    pub request_id: String,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(request_id: impl Into<String>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_id: request_id.into(),
            payload,
        }
    }

    pub fn request(request_id: impl Into<String>, request: T) -> Self {
        Self::new(request_id, request)
    }

    pub fn response(request_id: impl Into<String>, response: T) -> Self {
        Self::new(request_id, response)
    }

    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

/// Requests sent from the CLI to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Status,
    AddEvent { request: AddEventRequest },
    UpdateEvent { request: UpdateEventRequest },
    GetEvent { request: GetEventRequest },
    DeleteEvent { request: DeleteEventRequest },
    /// Answered with a stream of `list_item` frames and a final `list_end`.
    ListEvents { request: ListEventsRequest },
    Shutdown,
}

impl Request {
    /// Operation name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Status => "status",
            Self::AddEvent { .. } => "add_event",
            Self::UpdateEvent { .. } => "update_event",
            Self::GetEvent { .. } => "get_event",
            Self::DeleteEvent { .. } => "delete_event",
            Self::ListEvents { .. } => "list_events",
            Self::Shutdown => "shutdown",
        }
    }

    /// Whether handling this request needs an authenticated calendar client.
    pub fn needs_calendar(&self) -> bool {
        matches!(
            self,
            Self::AddEvent { .. }
                | Self::UpdateEvent { .. }
                | Self::GetEvent { .. }
                | Self::DeleteEvent { .. }
                | Self::ListEvents { .. }
        )
    }
}

/// Responses sent from the daemon to the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    Status {
        #[serde(flatten)]
        info: StatusInfo,
    },
    EventAdded { response: AddEventResponse },
    EventUpdated { response: UpdateEventResponse },
    Event { event: Event },
    EventDeleted { response: DeleteEventResponse },
    ListItem { item: ListEventsResponse },
    /// Terminates a list stream.
    ListEnd,
    Ok,
    Error {
        #[serde(flatten)]
        error: ErrorResponse,
    },
}

impl Response {
    pub fn status(info: StatusInfo) -> Self {
        Self::Status { info }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorResponse::new(code, message),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Error { .. })
    }

    pub fn as_error(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Error { error } => Some(error),
            _ => None,
        }
    }
}

/// How the daemon authenticates against the calendar API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    ServiceAccount,
    OAuth,
    /// Fixed bearer token, used against local test endpoints.
    Static,
}

/// Daemon status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub uptime_seconds: u64,
    pub started_at: DateTime<Utc>,
    /// Whether the calendar client has been built yet.
    pub calendar_ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<AuthMode>,
    pub endpoint: String,
    pub requests_served: u64,
    pub requests_failed: u64,
}

/// Error codes carried by [`Response::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    NotFound,
    /// The calendar API failed or could not be reached.
    UpstreamFailure,
    Cancelled,
    /// No usable credentials are configured.
    NotConfigured,
    InternalError,
    ShuttingDown,
}

impl ErrorCode {
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "The request was invalid",
            Self::NotFound => "Calendar or event not found",
            Self::UpstreamFailure => "The calendar API returned an error",
            Self::Cancelled => "The operation was cancelled",
            Self::NotConfigured => "Google Calendar is not configured",
            Self::InternalError => "An internal error occurred",
            Self::ShuttingDown => "Server is shutting down",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn simple_requests() {
        insta::assert_json_snapshot!(Request::Ping, @r#"
        {
          "type": "ping"
        }
        "#);
        assert_eq!(Request::Shutdown.name(), "shutdown");
        assert!(!Request::Status.needs_calendar());
    }

    #[test]
    fn add_event_request_shape() {
        let request = Request::AddEvent {
            request: AddEventRequest {
                blocks_time: Some(true),
                ..AddEventRequest::new("Standup")
            },
        };
        insta::assert_json_snapshot!(request, @r#"
        {
          "type": "add_event",
          "request": {
            "summary": "Standup",
            "blocks_time": true
          }
        }
        "#);
        assert!(request.needs_calendar());
    }

    #[test]
    fn list_request_roundtrip() {
        let request = Request::ListEvents {
            request: ListEventsRequest {
                after: Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()),
                limit: Some(10),
                ..Default::default()
            },
        };
        let json = serde_json::to_string(&request).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn list_item_shape() {
        let response = Response::ListItem {
            item: ListEventsResponse::NextAnchor("5".into()),
        };
        insta::assert_json_snapshot!(response, @r#"
        {
          "type": "list_item",
          "item": {
            "next_anchor": "5"
          }
        }
        "#);
    }

    #[test]
    fn error_is_flattened() {
        let response = Response::error(ErrorCode::NotFound, "unable to get event: event not found");
        insta::assert_json_snapshot!(response, @r#"
        {
          "type": "error",
          "code": "not_found",
          "message": "unable to get event: event not found"
        }
        "#);
        assert!(!response.is_success());
        assert_eq!(response.as_error().unwrap().code, ErrorCode::NotFound);
    }

    #[test]
    fn status_roundtrip() {
        let response = Response::status(StatusInfo {
            uptime_seconds: 42,
            started_at: Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
            calendar_ready: true,
            auth_mode: Some(AuthMode::ServiceAccount),
            endpoint: "https://www.googleapis.com/calendar/v3".into(),
            requests_served: 3,
            requests_failed: 1,
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["auth_mode"], "service_account");
        let parsed: Response = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn envelope_version() {
        let envelope = Envelope::request("abc", Request::Status);
        assert!(envelope.is_compatible());
        let old = Envelope {
            protocol_version: "0".into(),
            ..envelope
        };
        assert!(!old.is_compatible());
    }
}
