//! Google Calendar API v3 wire types.
//!
//! Only the fields `cali` reads or writes are modelled. Every optional field is
//! skipped when `None` so that an unset value never overwrites a server-side
//! default on insert or update.

use serde::{Deserialize, Serialize};

/// `transparency` value for events that block time.
pub const OPAQUE: &str = "opaque";
/// `transparency` value for events that leave the slot free.
pub const TRANSPARENT: &str = "transparent";
/// Conference entry point type carrying the joinable video link.
pub const VIDEO_ENTRY_POINT: &str = "video";

/// An event resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<ApiEventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<ApiEventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<ApiPerson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<ApiAttendee>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_data: Option<ApiConferenceData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ApiSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests_can_see_other_guests: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests_can_modify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests_can_invite_others: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_event_id: Option<String>,
}

impl ApiEvent {
    /// Start used for ordering: the timestamp if present, else the date.
    pub fn start_key(&self) -> Option<cali_core::EventTime> {
        let start = self.start.as_ref()?;
        cali_core::EventTime::from_wire(start.date_time.as_deref(), start.date.as_deref())
    }
}

/// Start or end of an event: either `dateTime` or (all-day) `date`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl ApiEventDateTime {
    pub fn timestamp(date_time: impl Into<String>, time_zone: impl Into<String>) -> Self {
        Self {
            date: None,
            date_time: Some(date_time.into()),
            time_zone: Some(time_zone.into()),
        }
    }

    pub fn all_day(date: impl Into<String>) -> Self {
        Self {
            date: Some(date.into()),
            ..Default::default()
        }
    }
}

/// Organizer or creator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPerson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub is_self: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAttendee {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<bool>,
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub is_self: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConferenceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_solution: Option<ApiConferenceSolution>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry_points: Vec<ApiEntryPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConferenceSolution {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEntryPoint {
    #[serde(default)]
    pub entry_point_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Where an event came from (e.g. the page that created it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSource {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// Response of `events.list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub items: Vec<ApiEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Error body returned with non-success statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

impl ApiErrorBody {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code,
                message: message.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_event_list() {
        let json = r#"{
            "kind": "calendar#events",
            "summary": "primary",
            "items": [
                {
                    "id": "event1",
                    "summary": "Test Meeting",
                    "start": {"dateTime": "2024-03-15T10:00:00Z", "timeZone": "UTC"},
                    "end": {"dateTime": "2024-03-15T11:00:00Z"},
                    "status": "confirmed"
                }
            ],
            "nextPageToken": "1"
        }"#;

        let list: ApiEventList = serde_json::from_str(json).unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].summary.as_deref(), Some("Test Meeting"));
        assert_eq!(list.next_page_token.as_deref(), Some("1"));
        let start = list.items[0].start.as_ref().unwrap();
        assert_eq!(start.time_zone.as_deref(), Some("UTC"));
    }

    #[test]
    fn parse_all_day_event() {
        let json = r#"{
            "id": "event1",
            "summary": "Offsite",
            "start": {"date": "2024-03-15"},
            "end": {"date": "2024-03-16"}
        }"#;

        let event: ApiEvent = serde_json::from_str(json).unwrap();
        let start = event.start.as_ref().unwrap();
        assert_eq!(start.date.as_deref(), Some("2024-03-15"));
        assert!(start.date_time.is_none());
        assert!(event.start_key().unwrap().is_all_day());
    }

    #[test]
    fn parse_conference_and_people() {
        let json = r#"{
            "id": "event1",
            "organizer": {"email": "boss@example.com", "displayName": "Boss", "self": true},
            "attendees": [{"email": "a@example.com", "responseStatus": "accepted"}, {}],
            "conferenceData": {
                "conferenceId": "abc-defg-hij",
                "conferenceSolution": {"name": "Google Meet"},
                "entryPoints": [
                    {"entryPointType": "phone", "uri": "tel:+1-555"},
                    {"entryPointType": "video", "uri": "https://meet.google.com/abc-defg-hij"}
                ]
            }
        }"#;

        let event: ApiEvent = serde_json::from_str(json).unwrap();
        let organizer = event.organizer.unwrap();
        assert_eq!(organizer.is_self, Some(true));
        assert_eq!(event.attendees.unwrap().len(), 2);
        let conference = event.conference_data.unwrap();
        assert_eq!(conference.entry_points[1].entry_point_type, "video");
    }

    #[test]
    fn unset_fields_are_not_sent() {
        let event = ApiEvent {
            summary: Some("Standup".into()),
            guests_can_modify: Some(false),
            ..Default::default()
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"summary": "Standup", "guestsCanModify": false})
        );
    }

    #[test]
    fn error_body_shape() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"error": {"code": 404, "message": "event not found"}}"#)
                .unwrap();
        assert_eq!(body, ApiErrorBody::new(404, "event not found"));
    }
}
