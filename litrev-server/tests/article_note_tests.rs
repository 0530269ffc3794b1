//! Article library and notes

mod helpers;

use axum::http::StatusCode;
use helpers::{error_code, id_of, test_app, OWNER};
use serde_json::json;

#[tokio::test]
async fn test_import_skips_duplicate_dois() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Import").await;
    let uri = format!("/api/projects/{}/articles/import", project_id);

    let (status, body) = app
        .post(
            &uri,
            OWNER,
            json!([
                { "title": "One", "doi": "10.1000/ABC" },
                { "title": "Two", "doi": "https://doi.org/10.1000/abc" },
                { "title": "Three" },
            ]),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["imported"], 2);
    assert_eq!(body["data"]["skipped_duplicates"], 1);

    let (_, body) = app
        .post(&uri, OWNER, json!([{ "title": "Again", "doi": "doi:10.1000/abc" }]))
        .await;
    assert_eq!(body["data"]["imported"], 0);
    assert_eq!(body["data"]["skipped_duplicates"], 1);

    let (status, body) = app
        .post(
            &format!("/api/projects/{}/articles", project_id),
            OWNER,
            json!({ "title": "Single", "doi": "10.1000/abc" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CONFLICT");
}

#[tokio::test]
async fn test_bare_doi_prefix_is_stored_as_no_doi() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Empty DOIs").await;

    let (status, body) = app
        .post(
            &format!("/api/projects/{}/articles/import", project_id),
            OWNER,
            json!([
                { "title": "One", "doi": "doi:" },
                { "title": "Two", "doi": "https://doi.org/" },
            ]),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["imported"], 2);
    assert_eq!(body["data"]["skipped_duplicates"], 0);

    let (status, body) = app
        .post(
            &format!("/api/projects/{}/articles", project_id),
            OWNER,
            json!({ "title": "Three", "doi": "doi:" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert!(body["data"]["doi"].is_null(), "{}", body);
}

#[tokio::test]
async fn test_import_rejects_invalid_items_with_positions() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Invalid import").await;
    let uri = format!("/api/projects/{}/articles/import", project_id);

    let (status, body) = app
        .post(&uri, OWNER, json!([{ "title": "Fine" }, { "title": "  " }]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("item 1"), "{}", body);

    let (status, _) = app.post(&uri, OWNER, json!([])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let too_many: Vec<_> = (0..1001).map(|n| json!({ "title": format!("A{}", n) })).collect();
    let (status, _) = app.post(&uri, OWNER, json!(too_many)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get(&format!("/api/projects/{}/articles", project_id), OWNER).await;
    assert_eq!(body["data"]["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_listing_pages_and_searches_titles() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Library").await;

    let items: Vec<_> = (0..150)
        .map(|n| {
            let title = if n % 10 == 0 { format!("Sleep study {}", n) } else { format!("Other {}", n) };
            json!({ "title": title })
        })
        .collect();
    let (status, _) = app
        .post(&format!("/api/projects/{}/articles/import", project_id), OWNER, json!(items))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/api/projects/{}/articles?page=2", project_id), OWNER).await;
    assert_eq!(body["data"]["articles"].as_array().unwrap().len(), 50);
    assert_eq!(body["data"]["pagination"]["page"], 2);
    assert_eq!(body["data"]["pagination"]["total_pages"], 2);
    assert_eq!(body["data"]["pagination"]["total"], 150);

    let (_, body) = app
        .get(&format!("/api/projects/{}/articles?search=SLEEP", project_id), OWNER)
        .await;
    assert_eq!(body["data"]["pagination"]["total"], 15);
}

#[tokio::test]
async fn test_editing_source_text_clears_translation() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Edits").await;
    let article = app.create_article(project_id, "Titel", Some("Text")).await;

    sqlx::query("UPDATE articles SET title_translated = 'Title', abstract_translated = 'Text' WHERE id = ?")
        .bind(article.to_string())
        .execute(&app.state.db)
        .await
        .unwrap();

    let uri = format!("/api/projects/{}/articles/{}", project_id, article);
    let (status, body) = app.patch(&uri, OWNER, json!({ "journal": "Sleep" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title_translated"], "Title");

    let (status, body) = app.patch(&uri, OWNER, json!({ "title": "Neuer Titel" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["title_translated"].is_null());
    assert!(body["data"]["abstract_translated"].is_null());
}

#[tokio::test]
async fn test_articles_in_open_batches_cannot_be_deleted() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Deletion").await;
    let phase = app.create_phase(project_id, "Screening").await;
    app.set_phase_status(project_id, phase, "active").await;
    let article = app.create_article(project_id, "Batched", None).await;
    let batch = app.create_batch(project_id, phase, &[article]).await;

    let uri = format!("/api/projects/{}/articles/{}", project_id, article);
    let (status, _) = app.delete(&uri, OWNER).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.post(
        &format!("/api/projects/{}/batches/{}/status", project_id, batch),
        OWNER,
        json!({ "status": "discarded" }),
    )
    .await;
    let (status, _) = app.delete(&uri, OWNER).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&uri, OWNER).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notes_are_editable_by_author_or_manager() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Notes").await;
    app.add_member(project_id, "editor", "Editor").await;
    app.add_member(project_id, "viewer", "Viewer").await;
    let article = app.create_article(project_id, "Annotated", None).await;
    let uri = format!("/api/projects/{}/notes", project_id);

    let (status, _) = app.post(&uri, "viewer", json!({ "title": "Hi" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(&uri, "editor", json!({ "title": "Method", "content": "Check blinding", "article_id": article }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let note = id_of(&body["data"]);
    assert_eq!(body["data"]["author_id"], "editor");

    app.post(&uri, OWNER, json!({ "title": "General" })).await;

    let (_, body) = app.get(&format!("{}?article_id={}", uri, article), "viewer").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    let (_, body) = app.get(&uri, "viewer").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let note_uri = format!("{}/{}", uri, note);
    let (status, _) = app.patch(&note_uri, "viewer", json!({ "title": "Mine" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.patch(&note_uri, "editor", json!({ "content": "Blinding ok" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "Blinding ok");

    let (status, _) = app.delete(&note_uri, OWNER).await;
    assert_eq!(status, StatusCode::OK);

    let other = app.create_project(OWNER, "Other").await;
    let foreign = app.create_article(other, "Foreign", None).await;
    let (status, _) = app
        .post(&uri, "editor", json!({ "title": "Wrong", "article_id": foreign }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_project_deletion_removes_everything() {
    let app = test_app(None).await;
    let project_id = app.create_project(OWNER, "Short lived").await;
    app.create_article(project_id, "Gone soon", None).await;

    let (status, _) = app.delete(&format!("/api/projects/{}", project_id), OWNER).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/projects/{}", project_id), OWNER).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
        .fetch_one(&app.state.db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
