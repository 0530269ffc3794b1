//! Project event feed

mod helpers;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use helpers::{test_app, OWNER};
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Read SSE frames until `needle` shows up, returning everything read
async fn read_until(body: &mut Body, needle: &str) -> String {
    let mut text = String::new();
    while !text.contains(needle) {
        let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
            .await
            .unwrap_or_else(|_| panic!("no '{}' in stream:\n{}", needle, text))
            .expect("stream ended early")
            .unwrap();
        if let Ok(data) = frame.into_data() {
            text.push_str(&String::from_utf8_lossy(&data));
        }
    }
    text
}

#[tokio::test]
async fn test_project_feed_carries_only_its_project() {
    let app = test_app(None).await;
    let watched = app.create_project(OWNER, "Watched").await;
    let other = app.create_project(OWNER, "Other").await;
    let watched_phase = app.create_phase(watched, "Screening").await;
    let other_phase = app.create_phase(other, "Screening").await;

    let request = Request::builder()
        .uri(format!("/api/projects/{}/events", watched))
        .header("x-user-id", OWNER)
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body();

    // The other project's change is published first; it must not appear
    let (status, _) = app.set_phase_status(other, other_phase, "active").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.set_phase_status(watched, watched_phase, "active").await;
    assert_eq!(status, StatusCode::OK);

    let text = read_until(&mut body, &watched_phase.to_string()).await;
    assert!(text.contains("event: ConnectionStatus"), "{}", text);
    assert!(text.contains("event: PhaseStatusChanged"), "{}", text);
    assert!(text.contains("\"new_status\":\"active\""), "{}", text);
    assert!(!text.contains(&other.to_string()), "{}", text);
    assert!(!text.contains(&other_phase.to_string()), "{}", text);
}

#[tokio::test]
async fn test_project_feed_is_hidden_from_non_members() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Private").await;

    let (status, _) = app
        .get(&format!("/api/projects/{}/events", project_id), "stranger")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call("GET", &format!("/api/projects/{}/events", project_id), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
