//! Article endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{deleted, ApiJson};
use crate::auth::{require_member, require_permission, CurrentUser};
use crate::db;
use crate::db::articles::ImportCounts;
use crate::error::{ok, ApiError, ApiResult, Success};
use crate::models::{Article, ArticleInput, ArticleUpdate, Permission};
use crate::pagination::{calculate_pagination, Pagination, PAGE_SIZE};
use crate::AppState;

pub const MAX_IMPORT_ITEMS: usize = 1000;
const MAX_REPORTED_ERRORS: usize = 20;
const MAX_SEARCH_LEN: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ArticleListQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ArticlePage {
    pub articles: Vec<Article>,
    pub pagination: Pagination,
}

/// GET /api/projects/:project_id/articles?page=&search=
pub async fn list_articles(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ArticleListQuery>,
) -> ApiResult<Json<Success<ArticlePage>>> {
    require_member(&state.db, project_id, &user).await?;

    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if search.is_some_and(|s| s.chars().count() > MAX_SEARCH_LEN) {
        return Err(ApiError::BadRequest(format!(
            "search must be at most {} characters",
            MAX_SEARCH_LEN
        )));
    }

    let total = db::articles::count_articles(&state.db, project_id, search).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1));
    let articles =
        db::articles::list_articles(&state.db, project_id, search, PAGE_SIZE, pagination.offset).await?;

    Ok(ok(ArticlePage { articles, pagination }))
}

/// POST /api/projects/:project_id/articles
pub async fn create_article(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    ApiJson(input): ApiJson<ArticleInput>,
) -> ApiResult<(StatusCode, Json<Success<Article>>)> {
    require_permission(&state.db, project_id, &user, Permission::ManageArticles).await?;
    let input = input.validate().map_err(ApiError::BadRequest)?;

    if let Some(doi) = &input.doi {
        if db::articles::doi_exists(&state.db, project_id, doi, None).await? {
            return Err(ApiError::Conflict(format!("An article with DOI {} already exists", doi)));
        }
    }

    let article = db::articles::create_article(&state.db, project_id, &input).await?;
    Ok((StatusCode::CREATED, ok(article)))
}

/// POST /api/projects/:project_id/articles/import
///
/// Body is a JSON array of articles. Nothing is written unless every item
/// validates; duplicate DOIs are skipped and counted.
pub async fn import_articles(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    ApiJson(items): ApiJson<Vec<ArticleInput>>,
) -> ApiResult<Json<Success<ImportCounts>>> {
    require_permission(&state.db, project_id, &user, Permission::ManageArticles).await?;

    if items.is_empty() {
        return Err(ApiError::BadRequest("Import must contain at least one article".to_string()));
    }
    if items.len() > MAX_IMPORT_ITEMS {
        return Err(ApiError::BadRequest(format!(
            "Import is limited to {} articles (got {})",
            MAX_IMPORT_ITEMS,
            items.len()
        )));
    }

    let mut valid = Vec::with_capacity(items.len());
    let mut errors = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match item.validate() {
            Ok(input) => valid.push(input),
            Err(msg) => errors.push(format!("item {}: {}", index, msg)),
        }
    }
    if !errors.is_empty() {
        let total = errors.len();
        errors.truncate(MAX_REPORTED_ERRORS);
        let mut message = errors.join("; ");
        if total > MAX_REPORTED_ERRORS {
            message.push_str(&format!(" (and {} more)", total - MAX_REPORTED_ERRORS));
        }
        return Err(ApiError::BadRequest(message));
    }

    let counts = db::articles::import_articles(&state.db, project_id, &valid).await?;
    tracing::info!(
        %project_id,
        imported = counts.imported,
        skipped = counts.skipped_duplicates,
        "Imported articles"
    );
    Ok(ok(counts))
}

async fn load_article(state: &AppState, project_id: Uuid, article_id: Uuid) -> ApiResult<Article> {
    db::articles::get_article(&state.db, project_id, article_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Article {}", article_id)))
}

/// GET /api/projects/:project_id/articles/:article_id
pub async fn get_article(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, article_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Success<Article>>> {
    require_member(&state.db, project_id, &user).await?;
    Ok(ok(load_article(&state, project_id, article_id).await?))
}

/// PATCH /api/projects/:project_id/articles/:article_id
///
/// Changing the title or abstract drops stored translations.
pub async fn update_article(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, article_id)): Path<(Uuid, Uuid)>,
    ApiJson(update): ApiJson<ArticleUpdate>,
) -> ApiResult<Json<Success<Article>>> {
    require_permission(&state.db, project_id, &user, Permission::ManageArticles).await?;
    let mut article = load_article(&state, project_id, article_id).await?;
    let previous_doi = article.doi.clone();

    let source_changed = update.apply_to(&mut article).map_err(ApiError::BadRequest)?;

    if let Some(doi) = &article.doi {
        if article.doi != previous_doi
            && db::articles::doi_exists(&state.db, project_id, doi, Some(article.id)).await?
        {
            return Err(ApiError::Conflict(format!("An article with DOI {} already exists", doi)));
        }
    }

    db::articles::save_article(&state.db, &article).await?;
    if source_changed {
        tracing::debug!(article_id = %article.id, "Source text changed, translations cleared");
    }
    Ok(ok(load_article(&state, project_id, article_id).await?))
}

/// DELETE /api/projects/:project_id/articles/:article_id
pub async fn delete_article(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, article_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Success<Value>>> {
    require_permission(&state.db, project_id, &user, Permission::ManageArticles).await?;
    let article = load_article(&state, project_id, article_id).await?;

    let open = db::articles::count_open_batches_for_article(&state.db, article.id).await?;
    if open > 0 {
        return Err(ApiError::Conflict(format!(
            "Article is part of {} open batch(es)",
            open
        )));
    }

    db::articles::delete_article(&state.db, article.id).await?;
    Ok(ok(deleted()))
}

pub fn article_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects/:project_id/articles",
            get(list_articles).post(create_article),
        )
        .route("/api/projects/:project_id/articles/import", post(import_articles))
        .route(
            "/api/projects/:project_id/articles/:article_id",
            get(get_article).patch(update_article).delete(delete_article),
        )
}
