//! Public sign-up request endpoint

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use helpers::{error_code, test_app, test_app_with_config, TestApp};
use http_body_util::BodyExt;
use litrev_common::config::TomlConfig;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn submit(app: &TestApp, client: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/signup-request")
        .header("content-type", "application/json")
        .header("x-forwarded-for", client)
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn valid() -> String {
    json!({
        "email": "researcher@uni.example",
        "name": "A. Researcher",
        "institution": "Example University",
        "message": "Would like to run a scoping review"
    })
    .to_string()
}

async fn stored_requests(app: &TestApp) -> i64 {
    litrev_server::db::signup::count_signup_requests(&app.state.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_valid_request_is_stored_without_identity() {
    let app = test_app(None).await;

    let (status, body) = submit(&app, "203.0.113.7", &valid()).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "received");
    assert_eq!(stored_requests(&app).await, 1);

    let stored_key: String = sqlx::query_scalar("SELECT client_key_hash FROM signup_requests")
        .fetch_one(&app.state.db)
        .await
        .unwrap();
    assert_ne!(stored_key, "203.0.113.7");
    assert_eq!(stored_key.len(), 64);
}

#[tokio::test]
async fn test_invalid_payloads_are_rejected() {
    let app = test_app(None).await;

    for (n, body) in [
        json!({ "email": "not-an-email" }).to_string(),
        json!({ "email": "a@b" }).to_string(),
        json!({ "email": "x@example.org", "message": "m".repeat(2001) }).to_string(),
        json!({ "name": "No email" }).to_string(),
        "{not json".to_string(),
    ]
    .into_iter()
    .enumerate()
    {
        let (status, response) = submit(&app, &format!("198.51.100.{}", n), &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(error_code(&response), "BAD_REQUEST");
    }
    assert_eq!(stored_requests(&app).await, 0);
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let mut config = TomlConfig::default();
    config.signup.max_requests = 2;
    config.signup.window_secs = 3600;
    let app = test_app_with_config(config, None).await;

    for _ in 0..2 {
        let (status, _) = submit(&app, "192.0.2.10", &valid()).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = submit(&app, "192.0.2.10", &valid()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_code(&body), "RATE_LIMITED");

    // Over-quota clients are refused before their payload is looked at
    let (status, _) = submit(&app, "192.0.2.10", "{not json").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = submit(&app, "192.0.2.11", &valid()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored_requests(&app).await, 3);
}

#[tokio::test]
async fn test_disabled_signup_returns_service_unavailable() {
    let mut config = TomlConfig::default();
    config.signup.enabled = false;
    let app = test_app_with_config(config, None).await;

    let (status, body) = submit(&app, "192.0.2.20", &valid()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_code(&body), "SIGNUP_DISABLED");
    assert_eq!(stored_requests(&app).await, 0);
}
