//! Conversion between the request/response schema and API events.
//!
//! None of these functions fail. Unparseable provider timestamps become absent
//! fields, and unset request fields leave the API field untouched.

use chrono::{DateTime, Duration, Utc};

use cali_core::time::{WIRE_TIMEZONE, format_rfc3339, top_of_next_hour};
use cali_core::{AddEventRequest, Event, EventTime, UpdateEventRequest};

use super::api::{
    ApiEvent, ApiEventDateTime, ApiSource, OPAQUE, TRANSPARENT, VIDEO_ENTRY_POINT,
};

/// Builds the API event inserted for `request`.
pub fn request_to_event(request: &AddEventRequest) -> ApiEvent {
    request_to_event_at(request, Utc::now())
}

/// [`request_to_event`] with an explicit clock for default start times.
pub fn request_to_event_at(request: &AddEventRequest, now: DateTime<Utc>) -> ApiEvent {
    let start = request.start_time.unwrap_or_else(|| top_of_next_hour(now));
    let end = request.end_time.unwrap_or(start + Duration::hours(1));

    let source = build_source(request.source_title.as_deref(), request.source_url.as_deref());

    ApiEvent {
        id: non_empty(request.idempotency_key.as_deref()),
        summary: Some(request.summary.clone()),
        description: non_empty(request.description.as_deref()),
        location: non_empty(request.location.as_deref()),
        start: Some(wire_time(start)),
        end: Some(wire_time(end)),
        transparency: Some(transparency(request.blocks_time).to_string()),
        guests_can_see_other_guests: request.guests_can_see_other_guests,
        guests_can_modify: request.guests_can_modify,
        guests_can_invite_others: request.guests_can_invite_others,
        source,
        ..Default::default()
    }
}

/// Applies the fields present in `update` on top of `existing`.
///
/// The result is sent as a full replace, so every field `update` leaves unset
/// keeps the value the provider returned.
pub fn update_to_event(update: &UpdateEventRequest, mut existing: ApiEvent) -> ApiEvent {
    if let Some(summary) = non_empty(update.summary.as_deref()) {
        existing.summary = Some(summary);
    }
    if let Some(description) = non_empty(update.description.as_deref()) {
        existing.description = Some(description);
    }
    if let Some(location) = non_empty(update.location.as_deref()) {
        existing.location = Some(location);
    }
    if let Some(start) = update.start_time {
        existing.start = Some(wire_time(start));
    }
    if let Some(end) = update.end_time {
        existing.end = Some(wire_time(end));
    }
    if update.guests_can_see_other_guests.is_some() {
        existing.guests_can_see_other_guests = update.guests_can_see_other_guests;
    }
    if update.guests_can_modify.is_some() {
        existing.guests_can_modify = update.guests_can_modify;
    }
    if update.guests_can_invite_others.is_some() {
        existing.guests_can_invite_others = update.guests_can_invite_others;
    }
    if update.source_title.is_some() || update.source_url.is_some() {
        let source = existing.source.get_or_insert_with(ApiSource::default);
        if let Some(title) = &update.source_title {
            source.title = title.clone();
        }
        if let Some(url) = &update.source_url {
            source.url = url.clone();
        }
    }
    if update.blocks_time.is_some() {
        existing.transparency = Some(transparency(update.blocks_time).to_string());
    }
    existing
}

/// Converts an API event into the response schema.
pub fn event_to_response(event: &ApiEvent, calendar_id: &str) -> Event {
    let start_time = event
        .start
        .as_ref()
        .and_then(resolve_time)
        .map(|t| t.to_utc_datetime());
    let end_time = event
        .end
        .as_ref()
        .and_then(resolve_time)
        .map(|t| t.to_utc_datetime());

    let conference = event.conference_data.as_ref();
    let conference_uri = conference.and_then(|data| {
        data.entry_points
            .iter()
            .filter(|ep| ep.entry_point_type == VIDEO_ENTRY_POINT)
            .find_map(|ep| non_empty(ep.uri.as_deref()))
    });

    let source = event.source.as_ref();
    let organizer = event.organizer.as_ref();

    Event {
        id: event.id.clone().unwrap_or_default(),
        summary: event.summary.clone().unwrap_or_default(),
        description: non_empty(event.description.as_deref()),
        location: non_empty(event.location.as_deref()),
        start_time,
        end_time,
        status: non_empty(event.status.as_deref()),
        transparency: non_empty(event.transparency.as_deref()),
        organizer_email: organizer.and_then(|o| non_empty(o.email.as_deref())),
        organizer_name: organizer.and_then(|o| non_empty(o.display_name.as_deref())),
        conference_uri,
        conference_id: conference.and_then(|c| non_empty(c.conference_id.as_deref())),
        source_title: source.and_then(|s| non_empty(Some(s.title.as_str()))),
        source_url: source.and_then(|s| non_empty(Some(s.url.as_str()))),
        attendees: event
            .attendees
            .iter()
            .flatten()
            .filter_map(|a| non_empty(a.email.as_deref()))
            .collect(),
        html_link: event.html_link.clone().unwrap_or_default(),
        calendar_id: calendar_id.to_string(),
    }
}

fn resolve_time(time: &ApiEventDateTime) -> Option<EventTime> {
    EventTime::from_wire(time.date_time.as_deref(), time.date.as_deref())
}

fn wire_time(instant: DateTime<Utc>) -> ApiEventDateTime {
    ApiEventDateTime::timestamp(format_rfc3339(instant), WIRE_TIMEZONE)
}

fn transparency(blocks_time: Option<bool>) -> &'static str {
    if blocks_time == Some(true) {
        OPAQUE
    } else {
        TRANSPARENT
    }
}

fn build_source(title: Option<&str>, url: Option<&str>) -> Option<ApiSource> {
    let title = title.unwrap_or_default();
    let url = url.unwrap_or_default();
    if title.is_empty() && url.is_empty() {
        return None;
    }
    Some(ApiSource {
        title: title.to_string(),
        url: url.to_string(),
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
