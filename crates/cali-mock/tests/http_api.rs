//! Raw HTTP behaviour of the mock server.

use cali_mock::MockCalendarServer;
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn post(server: &MockCalendarServer, body: &Value) -> Value {
    reqwest::Client::new()
        .post(format!("{}/calendars/primary/events", server.url()))
        .json(body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn insert_then_get_under_both_prefixes() {
    let server = MockCalendarServer::start().await.unwrap();
    let created = post(
        &server,
        &json!({
            "id": "ignored",
            "summary": "Planning",
            "start": {"dateTime": "2024-01-15T10:00:00Z", "timeZone": "UTC"},
            "end": {"dateTime": "2024-01-15T11:00:00Z", "timeZone": "UTC"}
        }),
    )
    .await;
    assert_eq!(created["id"], "event1");
    assert_eq!(created["status"], "confirmed");
    assert_eq!(created["created"], created["updated"]);

    let bare = format!("http://{}/calendars/primary/events/event1", server.addr());
    let fetched: Value = reqwest::get(&bare).await.unwrap().json().await.unwrap();
    assert_eq!(fetched["summary"], "Planning");
    assert_eq!(fetched["start"]["dateTime"], "2024-01-15T10:00:00Z");
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let server = MockCalendarServer::start().await.unwrap();
    let response = reqwest::Client::new()
        .post(format!("{}/calendars/primary/events", server.url()))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], 400);
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("invalid JSON")
    );
    assert!(server.store().events("primary").await.is_empty());
}

#[tokio::test]
async fn missing_targets_are_not_found() {
    let server = MockCalendarServer::start().await.unwrap();
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/calendars/primary/events/event1", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["message"], "calendar not found");

    post(&server, &json!({"summary": "x"})).await;
    let response = client
        .put(format!("{}/calendars/primary/events/event7", server.url()))
        .body("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_returns_no_content_once() {
    let server = MockCalendarServer::start().await.unwrap();
    post(&server, &json!({"summary": "x"})).await;
    let client = reqwest::Client::new();
    let url = format!("{}/calendars/primary/events/event1", server.url());

    let first = client.delete(&url).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::NO_CONTENT);
    let second = client.delete(&url).send().await.unwrap();
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_is_a_full_replace() {
    let server = MockCalendarServer::start().await.unwrap();
    post(
        &server,
        &json!({"summary": "x", "location": "Room 1", "description": "d"}),
    )
    .await;
    let replaced: Value = reqwest::Client::new()
        .patch(format!("{}/calendars/primary/events/event1", server.url()))
        .json(&json!({"summary": "y"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(replaced["id"], "event1");
    assert_eq!(replaced["summary"], "y");
    assert!(replaced.get("location").is_none());
}

#[tokio::test]
async fn list_query_parameters() {
    let server = MockCalendarServer::start().await.unwrap();
    for hour in [12, 9, 15] {
        post(
            &server,
            &json!({
                "summary": format!("at {hour}"),
                "start": {"dateTime": format!("2024-01-15T{hour:02}:00:00Z")}
            }),
        )
        .await;
    }

    let list: Value = reqwest::Client::new()
        .get(format!("{}/calendars/primary/events", server.url()))
        .query(&[
            ("singleEvents", "true"),
            ("orderBy", "startTime"),
            ("timeMin", "2024-01-15T10:00:00Z"),
            ("maxResults", "1"),
        ])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["kind"], "calendar#events");
    assert_eq!(list["items"].as_array().unwrap().len(), 1);
    assert_eq!(list["items"][0]["summary"], "at 12");
    assert_eq!(list["nextPageToken"], "1");

    let bad = reqwest::Client::new()
        .get(format!("{}/calendars/primary/events", server.url()))
        .query(&[("maxResults", "many")])
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsupported_method_is_rejected() {
    let server = MockCalendarServer::start().await.unwrap();
    let response = reqwest::Client::new()
        .delete(format!("{}/calendars/primary/events", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn shutdown_stops_serving() {
    let server = MockCalendarServer::start().await.unwrap();
    let url = format!("{}/calendars/primary/events", server.url());
    server.shutdown().await;
    assert!(reqwest::get(&url).await.is_err());
}
