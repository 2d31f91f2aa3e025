//! iCalendar rendering.

use icalendar::{Calendar, Component, Event as VEvent, EventLike, Property};

use crate::event::Event;

/// Calendar-level property carrying the continuation cursor of a partial listing.
pub const NEXT_ANCHOR_PROPERTY: &str = "X-CALI-NEXT-ANCHOR";

/// Renders events as a single `VCALENDAR`.
pub fn to_icalendar(events: &[Event], next_anchor: Option<&str>) -> String {
    let mut calendar = Calendar::new();
    calendar.name("cali");
    if let Some(anchor) = next_anchor {
        calendar.append_property(Property::new(NEXT_ANCHOR_PROPERTY, anchor));
    }
    for event in events {
        calendar.push(to_vevent(event));
    }
    calendar.done().to_string()
}

fn to_vevent(event: &Event) -> VEvent {
    let mut vevent = VEvent::new();
    vevent.uid(&event.id).summary(&event.summary);

    if let Some(description) = &event.description {
        vevent.description(description);
    }
    if let Some(location) = &event.location {
        vevent.location(location);
    }
    if let Some(start) = event.start_time {
        vevent.starts(start);
    }
    if let Some(end) = event.end_time {
        vevent.ends(end);
    }
    if let Some(status) = &event.status {
        vevent.add_property("STATUS", &status.to_ascii_uppercase());
    }
    if let Some(transparency) = &event.transparency {
        vevent.add_property("TRANSP", &transparency.to_ascii_uppercase());
    }
    if !event.html_link.is_empty() {
        vevent.add_property("URL", &event.html_link);
    }
    if let Some(email) = &event.organizer_email {
        vevent.add_property("ORGANIZER", &format!("mailto:{email}"));
    }
    for attendee in &event.attendees {
        vevent.append_multi_property(Property::new("ATTENDEE", &format!("mailto:{attendee}")));
    }

    vevent.done()
}
