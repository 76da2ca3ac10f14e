mod common;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Duration, Utc};
use common::{create_key, send, test_app, validate};
use serde_json::json;

#[tokio::test]
async fn trial_key_lifecycle() {
    let app = test_app();
    let key = create_key(&app, json!({ "name": "trial", "duration": 7, "unit": "days" })).await;

    assert!(key["hwid"].is_null());
    let created_at: DateTime<Utc> = key["createdAt"].as_str().unwrap().parse().unwrap();
    let expires_at: DateTime<Utc> = key["expiresAt"].as_str().unwrap().parse().unwrap();
    assert_eq!(expires_at - created_at, Duration::days(7));

    let value = key["value"].as_str().unwrap();
    let id = key["id"].as_str().unwrap();

    assert_eq!(validate(&app, value, "ABC").await, (true, "ok".to_string()));
    let (_, record) = send(&app, Method::GET, &format!("/keys/{id}"), None).await;
    assert_eq!(record["hwid"], "ABC");

    assert_eq!(
        validate(&app, value, "XYZ").await,
        (false, "hwid mismatch".to_string())
    );

    let (status, _) = send(&app, Method::POST, &format!("/keys/{id}/ban"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(validate(&app, value, "ABC").await, (false, "banned".to_string()));
}

#[tokio::test]
async fn unbanning_restores_validity() {
    let app = test_app();
    let key = create_key(&app, json!({ "name": "toggle" })).await;
    let value = key["value"].as_str().unwrap();
    let id = key["id"].as_str().unwrap();

    assert!(validate(&app, value, "ABC").await.0);

    send(&app, Method::PUT, &format!("/keys/{id}"), Some(json!({ "isBanned": true }))).await;
    assert_eq!(validate(&app, value, "ABC").await, (false, "banned".to_string()));
    // A ban outranks the mismatch check too
    assert_eq!(validate(&app, value, "XYZ").await, (false, "banned".to_string()));

    send(&app, Method::PUT, &format!("/keys/{id}"), Some(json!({ "isBanned": false }))).await;
    assert_eq!(validate(&app, value, "ABC").await, (true, "ok".to_string()));
}

#[tokio::test]
async fn banned_unbound_key_is_not_bound() {
    let app = test_app();
    let key = create_key(&app, json!({ "name": "blocked" })).await;
    let value = key["value"].as_str().unwrap();
    let id = key["id"].as_str().unwrap();

    send(&app, Method::POST, &format!("/keys/{id}/ban"), None).await;
    assert_eq!(validate(&app, value, "ABC").await, (false, "banned".to_string()));

    let (_, record) = send(&app, Method::GET, &format!("/keys/{id}"), None).await;
    assert!(record["hwid"].is_null());
}

#[tokio::test]
async fn expired_key_is_invalid_and_stays_unbound() {
    let app = test_app();
    let yesterday = (Utc::now() - Duration::days(1)).to_rfc3339();
    let key = create_key(&app, json!({ "name": "old", "expiresAt": yesterday })).await;
    let value = key["value"].as_str().unwrap();
    let id = key["id"].as_str().unwrap();

    assert_eq!(validate(&app, value, "ABC").await, (false, "expired".to_string()));

    let (status, record) = send(&app, Method::GET, &format!("/keys/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(record["hwid"].is_null());
}

#[tokio::test]
async fn extending_expiry_revives_a_key() {
    let app = test_app();
    let key = create_key(&app, json!({ "name": "renewal", "expiresAt": "2000-01-01" })).await;
    let value = key["value"].as_str().unwrap();
    let id = key["id"].as_str().unwrap();

    assert_eq!(validate(&app, value, "ABC").await.1, "expired");

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/keys/{id}"),
        Some(json!({ "expiresAt": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(updated["expiresAt"].is_null());
    assert!(validate(&app, value, "ABC").await.0);
}

#[tokio::test]
async fn reset_allows_one_new_binding() {
    let app = test_app();
    let key = create_key(&app, json!({ "name": "moved" })).await;
    let value = key["value"].as_str().unwrap();
    let id = key["id"].as_str().unwrap();

    assert!(validate(&app, value, "OLD-PC").await.0);

    let (status, reset) =
        send(&app, Method::PUT, &format!("/keys/{id}"), Some(json!({ "hwid": null }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(reset["hwid"].is_null());

    assert!(validate(&app, value, "NEW-PC").await.0);
    assert_eq!(validate(&app, value, "OLD-PC").await.1, "hwid mismatch");
    assert_eq!(validate(&app, value, "THIRD-PC").await.1, "hwid mismatch");
}

#[tokio::test]
async fn reset_endpoint_clears_binding() {
    let app = test_app();
    let key = create_key(&app, json!({ "name": "moved" })).await;
    let value = key["value"].as_str().unwrap();
    let id = key["id"].as_str().unwrap();

    validate(&app, value, "OLD-PC").await;
    let (status, record) =
        send(&app, Method::POST, &format!("/keys/{id}/reset-hwid"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(record["hwid"].is_null());
    assert!(validate(&app, value, "NEW-PC").await.0);
}

#[tokio::test]
async fn deleted_key_is_unknown() {
    let app = test_app();
    let key = create_key(&app, json!({ "name": "gone" })).await;
    let value = key["value"].as_str().unwrap();
    let id = key["id"].as_str().unwrap();

    assert!(validate(&app, value, "ABC").await.0);

    let (status, _) = send(&app, Method::DELETE, &format!("/keys/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(validate(&app, value, "ABC").await, (false, "unknown key".to_string()));
}

#[tokio::test]
async fn unknown_key_is_a_normal_response() {
    let app = test_app();
    assert_eq!(
        validate(&app, "TEST-NOPE-NOPE-NOPE", "ABC").await,
        (false, "unknown key".to_string())
    );
}

#[tokio::test]
async fn missing_fields_are_rejected_with_400() {
    let app = test_app();

    for body in [
        json!({}),
        json!({ "keyValue": "TEST-AAAA-BBBB-CCCC" }),
        json!({ "hwid": "ABC" }),
        json!({ "keyValue": "", "hwid": "ABC" }),
    ] {
        let (status, response) = send(&app, Method::POST, "/validate", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response, json!({ "valid": false, "message": "invalid request" }));
    }
}

#[tokio::test]
async fn legacy_validate_path_is_served() {
    let app = test_app();
    let key = create_key(&app, json!({ "name": "legacy" })).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/validate",
        Some(json!({ "keyValue": key["value"], "hwid": "ABC" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "valid": true, "message": "ok" }));
}
