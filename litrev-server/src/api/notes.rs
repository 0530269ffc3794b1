//! Note endpoints
//!
//! Notes belong to a project and may point at one of its articles. Authors
//! edit their own notes; project managers may edit or delete any note.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::{deleted, ApiJson};
use crate::auth::{require_member, require_permission, CurrentUser};
use crate::db;
use crate::error::{ok, ApiError, ApiResult, Success};
use crate::models::note::{MAX_NOTE_CONTENT_LEN, MAX_NOTE_TITLE_LEN};
use crate::models::{optional_text, require_text, Member, Note, Permission};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub article_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoteListQuery {
    #[serde(default)]
    pub article_id: Option<Uuid>,
}

fn validate_content(content: Option<&str>) -> ApiResult<String> {
    Ok(optional_text("content", content, MAX_NOTE_CONTENT_LEN)
        .map_err(ApiError::BadRequest)?
        .unwrap_or_default())
}

async fn load_note(state: &AppState, project_id: Uuid, note_id: Uuid) -> ApiResult<Note> {
    db::notes::get_note(&state.db, project_id, note_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Note {}", note_id)))
}

fn ensure_can_edit(member: &Member, note: &Note) -> ApiResult<()> {
    if note.author_id == member.user_id || member.permissions.allows(Permission::ManageProject) {
        return Ok(());
    }
    Err(ApiError::Forbidden(format!(
        "Only the author or a member with {} may change this note",
        Permission::ManageProject
    )))
}

/// GET /api/projects/:project_id/notes?article_id=
pub async fn list_notes(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    Query(query): Query<NoteListQuery>,
) -> ApiResult<Json<Success<Vec<Note>>>> {
    require_member(&state.db, project_id, &user).await?;
    Ok(ok(db::notes::list_notes(&state.db, project_id, query.article_id).await?))
}

/// POST /api/projects/:project_id/notes
pub async fn create_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    ApiJson(request): ApiJson<CreateNoteRequest>,
) -> ApiResult<(StatusCode, Json<Success<Note>>)> {
    require_permission(&state.db, project_id, &user, Permission::WriteNotes).await?;
    let title = require_text("title", &request.title, MAX_NOTE_TITLE_LEN).map_err(ApiError::BadRequest)?;
    let content = validate_content(request.content.as_deref())?;

    if let Some(article_id) = request.article_id {
        if db::articles::get_article(&state.db, project_id, article_id).await?.is_none() {
            return Err(ApiError::BadRequest(format!(
                "Article {} does not belong to this project",
                article_id
            )));
        }
    }

    let note = db::notes::create_note(&state.db, project_id, request.article_id, user.id(), &title, &content).await?;
    Ok((StatusCode::CREATED, ok(note)))
}

/// GET /api/projects/:project_id/notes/:note_id
pub async fn get_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, note_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Success<Note>>> {
    require_member(&state.db, project_id, &user).await?;
    Ok(ok(load_note(&state, project_id, note_id).await?))
}

/// PATCH /api/projects/:project_id/notes/:note_id
pub async fn update_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, note_id)): Path<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<UpdateNoteRequest>,
) -> ApiResult<Json<Success<Note>>> {
    let member = require_member(&state.db, project_id, &user).await?;
    let mut note = load_note(&state, project_id, note_id).await?;
    ensure_can_edit(&member, &note)?;

    if let Some(title) = &request.title {
        note.title = require_text("title", title, MAX_NOTE_TITLE_LEN).map_err(ApiError::BadRequest)?;
    }
    if let Some(content) = &request.content {
        note.content = validate_content(Some(content))?;
    }

    db::notes::update_note(&state.db, &note).await?;
    Ok(ok(load_note(&state, project_id, note_id).await?))
}

/// DELETE /api/projects/:project_id/notes/:note_id
pub async fn delete_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, note_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Success<Value>>> {
    let member = require_member(&state.db, project_id, &user).await?;
    let note = load_note(&state, project_id, note_id).await?;
    ensure_can_edit(&member, &note)?;

    db::notes::delete_note(&state.db, note.id).await?;
    Ok(ok(deleted()))
}

pub fn note_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects/:project_id/notes", get(list_notes).post(create_note))
        .route(
            "/api/projects/:project_id/notes/:note_id",
            get(get_note).patch(update_note).delete(delete_note),
        )
}
