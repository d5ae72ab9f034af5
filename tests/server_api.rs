mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use courier::app::{App, assemble};
use courier::channels::adapter::{Channel, ChannelType};
use courier::config::Config;

use common::StubChannel;

fn app_with_key() -> (App, Arc<StubChannel>) {
    let config: Config = "[server.auth]\napi_keys = [\"secret\"]\n".parse().unwrap();
    let email = StubChannel::ok(ChannelType::Email);
    let channels: Vec<Arc<dyn Channel>> = vec![email.clone()];
    (assemble(config, channels).unwrap(), email)
}

fn post(body: Value, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/notifications")
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("authorization", format!("Bearer {key}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn draft(message: &str) -> Value {
    json!({
        "contacts": [{"type": "email", "value": "ops@example.com"}],
        "message": message,
    })
}

#[tokio::test]
async fn liveness_is_always_ok() {
    let (app, _) = app_with_key();
    let response = app.router().oneshot(get("/health/liveness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ingest_requires_api_key() {
    let (app, _) = app_with_key();
    let response = app
        .router()
        .oneshot(post(draft("hello"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router()
        .oneshot(post(draft("hello"), Some("wrong")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ingest_rejects_invalid_notifications() {
    let (app, _) = app_with_key();
    let body = json!([draft("fine"), {"contacts": [], "message": "no one to tell"}]);
    let response = app.router().oneshot(post(body, Some("secret"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["index"], 1);

    let bad_bitrix = json!({
        "contacts": [{"type": "bitrix", "value": 0}],
        "message": "hi",
    });
    let response = app
        .router()
        .oneshot(post(bad_bitrix, Some("secret")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ingest_before_start_is_unavailable() {
    let (app, _) = app_with_key();
    let response = app
        .router()
        .oneshot(post(draft("hello"), Some("secret")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test(start_paused = true)]
async fn accepted_notifications_are_delivered_through_the_broker() {
    let (app, email) = app_with_key();
    app.start().await.unwrap();

    let body = json!([draft("one"), draft("two")]);
    let response = app.router().oneshot(post(body, Some("secret"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    assert_eq!(body["ids"].as_array().unwrap().len(), 2);

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    assert_eq!(email.calls(), 2);
    assert_eq!(app.broker().unacked_len("notifications").await, 0);
    app.shutdown().await;
}

#[tokio::test]
async fn readiness_reports_each_component() {
    let (app, _) = app_with_key();

    let response = app.router().oneshot(get("/health/readiness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let report = json_body(response).await;
    assert_eq!(report["ready"], false);
    let producer = report["components"]
        .as_array()
        .unwrap()
        .iter()
        .find(|component| component["name"] == "producer:notifications")
        .unwrap();
    assert_eq!(producer["healthy"], false);

    app.start().await.unwrap();
    let response = app.router().oneshot(get("/health/readiness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = json_body(response).await;
    assert_eq!(report["components"].as_array().unwrap().len(), 5);

    app.broker().set_unavailable(true);
    let response = app.router().oneshot(get("/health/readiness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    app.broker().set_unavailable(false);
    app.shutdown().await;
}
