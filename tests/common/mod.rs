//! Shared test helpers driving the router in-process.

#![allow(dead_code)]

use axum::{
    Router,
    body::{self, Body},
    http::{Method, Request, StatusCode, header},
};
use hwid_keyserver::{
    build_router, middleware::auth::AdminAuth, services::key_service::KeyService,
    state::AppState, store::FileKeyStore,
};
use serde_json::Value;
use tower::ServiceExt;

/// Router over a fresh in-memory store with admin auth disabled.
pub fn test_app() -> Router {
    app_with_auth(AdminAuth::disabled())
}

pub fn app_with_auth(auth: AdminAuth) -> Router {
    let state = AppState::new(KeyService::new(FileKeyStore::in_memory(), "TEST"));
    build_router(state, auth)
}

/// Send one request and decode the JSON response (Null for empty bodies).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_with_headers(app, method, uri, body, &[]).await
}

pub async fn send_with_headers(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }

    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, json)
}

/// Create a key through the API and return its record.
pub async fn create_key(app: &Router, body: Value) -> Value {
    let (status, key) = send(app, Method::POST, "/keys", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "unexpected create response: {key}");
    key
}

/// Validate through the API and return `(valid, message)`.
pub async fn validate(app: &Router, key_value: &str, hwid: &str) -> (bool, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/validate",
        Some(serde_json::json!({ "keyValue": key_value, "hwid": hwid })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "unexpected validate response: {body}");

    (
        body["valid"].as_bool().unwrap(),
        body["message"].as_str().unwrap().to_string(),
    )
}
