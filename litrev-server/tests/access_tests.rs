//! Identity, membership and permission checks

mod helpers;

use axum::http::StatusCode;
use helpers::{error_code, test_app, OWNER};
use serde_json::json;

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = test_app(None).await;

    let (status, body) = app.call("GET", "/api/projects", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(error_code(&body), "UNAUTHORIZED");

    let (status, _) = app.call("GET", "/api/projects", Some("   "), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_creator_becomes_owner_with_seeded_roles() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Sleep and memory").await;

    let (status, body) = app.get(&format!("/api/projects/{}/roles", project_id), OWNER).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|role| role["name"].as_str().unwrap())
        .collect();
    for expected in ["Owner", "Editor", "Viewer"] {
        assert!(names.contains(&expected), "missing role {}", expected);
    }

    let (_, body) = app.get(&format!("/api/projects/{}/members", project_id), OWNER).await;
    let members = body["data"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["user_id"], OWNER);
    assert_eq!(members[0]["role_name"], "Owner");
    assert_eq!(members[0]["permissions"]["can_manage_members"], true);

    let (_, body) = app.get("/api/projects", OWNER).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_members_cannot_see_project() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Private").await;

    let (status, body) = app.get(&format!("/api/projects/{}", project_id), "stranger").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    let (_, body) = app.get("/api/projects", "stranger").await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_viewer_lacks_write_permissions() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Shared").await;
    app.add_member(project_id, "viewer", "Viewer").await;

    let (status, _) = app.get(&format!("/api/projects/{}", project_id), "viewer").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(
            &format!("/api/projects/{}/phases", project_id),
            "viewer",
            json!({ "name": "Screening" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");

    let (status, _) = app
        .patch(&format!("/api/projects/{}", project_id), "viewer", json!({ "name": "Mine" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_last_manager_cannot_leave_or_be_demoted() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Solo").await;

    let (status, body) = app
        .delete(&format!("/api/projects/{}/members/{}", project_id, OWNER), OWNER)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "LAST_MANAGER");

    let viewer_role = app.role_id(project_id, OWNER, "Viewer").await;
    let (status, body) = app
        .patch(
            &format!("/api/projects/{}/members/{}", project_id, OWNER),
            OWNER,
            json!({ "role_id": viewer_role }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "LAST_MANAGER");

    let owner_role = app.role_id(project_id, OWNER, "Owner").await;
    let (status, body) = app
        .patch(
            &format!("/api/projects/{}/roles/{}", project_id, owner_role),
            OWNER,
            json!({ "can_manage_members": false }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "LAST_MANAGER");
}

#[tokio::test]
async fn test_manager_can_leave_once_another_exists() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Handover").await;
    app.add_member(project_id, "successor", "Owner").await;

    let (status, _) = app
        .delete(&format!("/api/projects/{}/members/{}", project_id, OWNER), OWNER)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/projects/{}", project_id), OWNER).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_member_admin_conflicts() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Roles").await;
    app.add_member(project_id, "editor", "Editor").await;

    let editor_role = app.role_id(project_id, OWNER, "Editor").await;
    let (status, body) = app
        .post(
            &format!("/api/projects/{}/members", project_id),
            OWNER,
            json!({ "user_id": "editor", "role_id": editor_role }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let (status, _) = app
        .delete(&format!("/api/projects/{}/roles/{}", project_id, editor_role), OWNER)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post(
            &format!("/api/projects/{}/roles", project_id),
            OWNER,
            json!({ "name": "Editor" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .post(
            &format!("/api/projects/{}/roles", project_id),
            OWNER,
            json!({ "name": "Annotator", "can_write_notes": true }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["can_write_notes"], true);
    assert_eq!(body["data"]["can_manage_phases"], false);
}

#[tokio::test]
async fn test_malformed_json_uses_error_envelope() {
    let app = test_app(None).await;
    let (status, body) = app
        .call("POST", "/api/projects", Some(OWNER), Some(json!({ "description": "no name" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(error_code(&body), "BAD_REQUEST");
}

#[tokio::test]
async fn test_health_reports_ai_configuration() {
    let app = test_app(None).await;
    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["ai_configured"], false);
}
