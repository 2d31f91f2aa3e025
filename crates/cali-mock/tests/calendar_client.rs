//! The calendar client driven against the mock server.

use std::sync::Arc;

use cali_core::{
    AddEventRequest, DeleteEventRequest, GetEventRequest, ListEventsRequest, ListEventsResponse,
    UpdateEventRequest,
};
use cali_mock::MockCalendarServer;
use cali_providers::google::api::{ApiEvent, ApiEventDateTime};
use cali_providers::{CalendarClient, ErrorCategory, StaticToken};
use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

async fn setup() -> (MockCalendarServer, CalendarClient) {
    let server = MockCalendarServer::start().await.unwrap();
    let client = CalendarClient::new(Arc::new(StaticToken::new("test-token")))
        .unwrap()
        .with_endpoint(server.url());
    (server, client)
}

fn get(event_id: &str) -> GetEventRequest {
    GetEventRequest {
        event_id: event_id.to_string(),
        calendar_id: None,
    }
}

async fn seed(server: &MockCalendarServer, count: u32) {
    for i in 0..count {
        let start = format!("2024-01-{:02}T10:00:00Z", 10 + i);
        server
            .store()
            .add_event(
                "primary",
                ApiEvent {
                    summary: Some(format!("event {i}")),
                    start: Some(ApiEventDateTime::timestamp(start, "UTC")),
                    ..Default::default()
                },
            )
            .await;
    }
}

#[tokio::test]
async fn insert_then_get() {
    let (_server, client) = setup().await;
    let mut request = AddEventRequest::new("Design review");
    request.start_time = Some(at(15, 10));
    request.end_time = Some(at(15, 11));
    request.blocks_time = Some(true);

    let added = client.create_event(&request).await.unwrap();
    assert!(added.success);
    assert_eq!(added.calendar_id, "primary");
    assert_eq!(
        added.message,
        "Event 'Design review' added successfully to Google Calendar"
    );

    let event = client.get_event(&get(&added.event_id)).await.unwrap();
    assert_eq!(event.summary, "Design review");
    assert_eq!(event.status.as_deref(), Some("confirmed"));
    assert!(!event.html_link.is_empty());
    assert_eq!(event.start_time, Some(at(15, 10)));
    assert_eq!(event.end_time, Some(at(15, 11)));
    assert_eq!(event.transparency.as_deref(), Some("opaque"));
}

#[tokio::test]
async fn created_equals_updated_on_insert() {
    let (server, client) = setup().await;
    let added = client
        .create_event(&AddEventRequest::new("Standup"))
        .await
        .unwrap();
    let stored = &server.store().events("primary").await[0];
    assert_eq!(stored.id.as_deref(), Some(added.event_id.as_str()));
    assert!(stored.created.is_some());
    assert_eq!(stored.created, stored.updated);
}

#[tokio::test]
async fn unset_guest_flags_are_not_sent() {
    let (server, client) = setup().await;
    let mut request = AddEventRequest::new("Lunch");
    request.guests_can_invite_others = Some(false);
    client.create_event(&request).await.unwrap();

    let stored = &server.store().events("primary").await[0];
    assert_eq!(stored.guests_can_invite_others, Some(false));
    assert_eq!(stored.guests_can_modify, None);
    assert_eq!(stored.guests_can_see_other_guests, None);
}

#[tokio::test]
async fn update_only_location() {
    let (server, client) = setup().await;
    let mut request = AddEventRequest::new("Offsite");
    request.location = Some("Room 1".into());
    request.description = Some("quarterly".into());
    let added = client.create_event(&request).await.unwrap();
    let before = server.store().events("primary").await.remove(0);

    let mut update = UpdateEventRequest::new(&added.event_id);
    update.location = Some("Room 2".into());
    let updated = client.update_event(&update).await.unwrap();
    assert!(updated.success);
    assert_eq!(updated.event_id, added.event_id);

    let event = client.get_event(&get(&added.event_id)).await.unwrap();
    assert_eq!(event.summary, "Offsite");
    assert_eq!(event.location.as_deref(), Some("Room 2"));
    assert_eq!(event.description.as_deref(), Some("quarterly"));

    let after = server.store().events("primary").await.remove(0);
    assert_eq!(after.created, before.created);
    assert!(after.updated > before.created);
}

#[tokio::test]
async fn update_of_missing_event_is_not_found() {
    let (_server, client) = setup().await;
    let err = client
        .update_event(&UpdateEventRequest::new("event42"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
}

#[tokio::test]
async fn delete_then_get_and_delete_again() {
    let (_server, client) = setup().await;
    let added = client
        .create_event(&AddEventRequest::new("Temp"))
        .await
        .unwrap();
    let delete = DeleteEventRequest {
        event_id: added.event_id.clone(),
        calendar_id: None,
    };

    let deleted = client.delete_event(&delete).await.unwrap();
    assert!(deleted.success);

    let err = client.get_event(&get(&added.event_id)).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
    assert_eq!(err.operation(), Some("unable to get event"));

    let err = client.delete_event(&delete).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
    assert_eq!(err.operation(), Some("unable to delete event"));
}

#[tokio::test]
async fn ids_are_not_reused_after_delete() {
    let (_server, client) = setup().await;
    let first = client.create_event(&AddEventRequest::new("a")).await.unwrap();
    client
        .delete_event(&DeleteEventRequest {
            event_id: first.event_id.clone(),
            calendar_id: None,
        })
        .await
        .unwrap();
    let second = client.create_event(&AddEventRequest::new("b")).await.unwrap();
    assert_ne!(first.event_id, second.event_id);
}

#[tokio::test]
async fn pages_concatenate_to_the_full_set() {
    let (server, client) = setup().await;
    seed(&server, 5).await;

    let request = ListEventsRequest {
        limit: Some(2),
        ..Default::default()
    };
    let first = client
        .list_events(request.clone(), CancellationToken::new())
        .collect_page()
        .await
        .unwrap();
    assert_eq!(first.events.len(), 2);
    assert_eq!(first.next_anchor.as_deref(), Some("2"));

    let all = client
        .collect_all(request, CancellationToken::new())
        .await
        .unwrap();
    let summaries: Vec<_> = all.iter().map(|e| e.summary.as_str()).collect();
    assert_eq!(
        summaries,
        ["event 0", "event 1", "event 2", "event 3", "event 4"]
    );
}

#[tokio::test]
async fn filtered_listing_is_ordered_by_start() {
    let (server, client) = setup().await;
    for (summary, day) in [("c", 20), ("a", 12), ("b", 16)] {
        server
            .store()
            .add_event(
                "primary",
                ApiEvent {
                    summary: Some(summary.into()),
                    start: Some(ApiEventDateTime::timestamp(
                        format!("2024-01-{day}T09:00:00Z"),
                        "UTC",
                    )),
                    ..Default::default()
                },
            )
            .await;
    }

    let request = ListEventsRequest {
        after: Some(at(11, 0)),
        ..Default::default()
    };
    let events = client
        .collect_all(request, CancellationToken::new())
        .await
        .unwrap();
    let starts: Vec<_> = events.iter().map(|e| e.start_time).collect();
    assert!(starts.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].summary, "a");
}

#[tokio::test]
async fn time_min_after_everything_is_empty() {
    let (server, client) = setup().await;
    seed(&server, 3).await;
    let request = ListEventsRequest {
        after: Some(at(31, 0)),
        ..Default::default()
    };
    let page = client
        .list_events(request, CancellationToken::new())
        .collect_page()
        .await
        .unwrap();
    assert!(page.events.is_empty());
    assert_eq!(page.next_anchor, None);
}

#[tokio::test]
async fn before_includes_an_event_starting_exactly_then() {
    let (server, client) = setup().await;
    seed(&server, 3).await;
    let request = ListEventsRequest {
        before: Some(at(11, 10)),
        ..Default::default()
    };
    let events = client
        .collect_all(request, CancellationToken::new())
        .await
        .unwrap();
    let starts: Vec<_> = events.iter().map(|e| e.start_time).collect();
    assert_eq!(starts, [Some(at(10, 10)), Some(at(11, 10))]);
}

#[tokio::test]
async fn stream_delivers_events_then_anchor() {
    let (server, client) = setup().await;
    seed(&server, 3).await;
    let request = ListEventsRequest {
        limit: Some(2),
        ..Default::default()
    };
    let items: Vec<_> = client
        .list_events(request, CancellationToken::new())
        .collect()
        .await;
    assert_eq!(items.len(), 3);
    assert!(matches!(items[0], Ok(ListEventsResponse::Event(_))));
    assert!(matches!(
        &items[2],
        Ok(ListEventsResponse::NextAnchor(anchor)) if anchor == "2"
    ));
}

#[tokio::test]
async fn cancelling_mid_stream_reports_cancellation() {
    let (server, client) = setup().await;
    seed(&server, 4).await;
    let cancel = CancellationToken::new();
    let mut stream = client.list_events(ListEventsRequest::default(), cancel.clone());

    let first = stream.next().await.unwrap().unwrap();
    assert!(first.event().is_some());
    cancel.cancel();

    // Items already handed over stay valid; anything after the cancel is the error.
    while let Some(item) = stream.next().await {
        match item {
            Ok(item) => assert!(item.event().is_some()),
            Err(e) => assert_eq!(e.category(), ErrorCategory::Cancelled),
        }
    }
}

#[tokio::test]
async fn round_trip_preserves_request_fields() {
    let (_server, client) = setup().await;
    let request = AddEventRequest {
        summary: "Launch".into(),
        description: Some("ship it".into()),
        location: Some("HQ".into()),
        start_time: Some(at(15, 14)),
        end_time: Some(at(15, 15)),
        calendar_id: Some("team@example.com".into()),
        source_title: Some("Tracker".into()),
        source_url: Some("https://example.com/t/1".into()),
        blocks_time: Some(false),
        ..Default::default()
    };
    let added = client.create_event(&request).await.unwrap();
    assert_eq!(added.calendar_id, "team@example.com");

    let event = client
        .get_event(&GetEventRequest {
            event_id: added.event_id,
            calendar_id: Some("team@example.com".into()),
        })
        .await
        .unwrap();
    assert_eq!(event.description.as_deref(), Some("ship it"));
    assert_eq!(event.location.as_deref(), Some("HQ"));
    assert_eq!(event.source_title.as_deref(), Some("Tracker"));
    assert_eq!(event.source_url.as_deref(), Some("https://example.com/t/1"));
    assert_eq!(event.transparency.as_deref(), Some("transparent"));
    assert_eq!(event.calendar_id, "team@example.com");
    assert_eq!(event.organizer_email, None);
    assert_eq!(event.conference_uri, None);
}
