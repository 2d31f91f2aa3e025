use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use cali_providers::google::api::{ApiEvent, ApiEventList};
use serde::Deserialize;

use crate::error::{MockError, MockResult};
use crate::store::{EventStore, ListQuery};

/// API prefix of the real service; routes are also served without it.
pub const API_PREFIX: &str = "/calendar/v3";

/// The events endpoints, mounted both bare and under [`API_PREFIX`].
pub fn router(store: EventStore) -> Router {
    Router::new()
        .merge(events_routes())
        .nest(API_PREFIX, events_routes())
        .with_state(store)
}

fn events_routes() -> Router<EventStore> {
    Router::new()
        .route(
            "/calendars/{calendar_id}/events",
            get(list_events).post(insert_event),
        )
        .route(
            "/calendars/{calendar_id}/events/{event_id}",
            get(get_event)
                .put(update_event)
                .patch(update_event)
                .delete(delete_event),
        )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    time_min: Option<String>,
    time_max: Option<String>,
    max_results: Option<String>,
    page_token: Option<String>,
    single_events: Option<String>,
    order_by: Option<String>,
}

impl ListParams {
    fn into_query(self) -> MockResult<ListQuery> {
        let max_results = match self.max_results.as_deref() {
            None | Some("") => None,
            Some(value) => Some(value.parse().map_err(|_| MockError::InvalidQuery {
                name: "maxResults",
                value: value.to_string(),
            })?),
        };
        Ok(ListQuery {
            time_min: self.time_min.filter(|v| !v.is_empty()),
            time_max: self.time_max.filter(|v| !v.is_empty()),
            max_results,
            page_token: self.page_token,
            single_events: self.single_events.as_deref() == Some("true"),
            order_by_start_time: self.order_by.as_deref() == Some("startTime"),
        })
    }
}

fn parse_event(body: &[u8]) -> MockResult<ApiEvent> {
    serde_json::from_slice(body).map_err(|e| MockError::InvalidJson(e.to_string()))
}

async fn list_events(
    State(store): State<EventStore>,
    Path(calendar_id): Path<String>,
    Query(params): Query<ListParams>,
) -> MockResult<Json<ApiEventList>> {
    let query = params.into_query()?;
    Ok(Json(store.list(&calendar_id, &query).await?))
}

async fn insert_event(
    State(store): State<EventStore>,
    Path(calendar_id): Path<String>,
    body: Bytes,
) -> MockResult<Json<ApiEvent>> {
    let event = parse_event(&body)?;
    Ok(Json(store.insert(&calendar_id, event).await))
}

async fn get_event(
    State(store): State<EventStore>,
    Path((calendar_id, event_id)): Path<(String, String)>,
) -> MockResult<Json<ApiEvent>> {
    Ok(Json(store.get(&calendar_id, &event_id).await?))
}

async fn update_event(
    State(store): State<EventStore>,
    Path((calendar_id, event_id)): Path<(String, String)>,
    body: Bytes,
) -> MockResult<Json<ApiEvent>> {
    // Missing targets win over a bad body.
    store.get(&calendar_id, &event_id).await?;
    let replacement = parse_event(&body)?;
    Ok(Json(store.update(&calendar_id, &event_id, replacement).await?))
}

async fn delete_event(
    State(store): State<EventStore>,
    Path((calendar_id, event_id)): Path<(String, String)>,
) -> MockResult<StatusCode> {
    store.delete(&calendar_id, &event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
