//! HTTP API handlers
//!
//! Every JSON response is a tagged result object: `{"success": true,
//! "data": ...}` or `{"success": false, "error": {...}}`. Change feeds are
//! Server-Sent Events.

pub mod articles;
pub mod batches;
pub mod health;
pub mod jobs;
pub mod members;
pub mod notes;
pub mod phases;
pub mod projects;
pub mod signup;
pub mod sse;

pub use articles::article_routes;
pub use batches::batch_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use members::member_routes;
pub use notes::note_routes;
pub use phases::phase_routes;
pub use projects::project_routes;
pub use signup::signup_routes;
pub use sse::event_routes;

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde_json::{json, Value};

use crate::error::ApiError;

/// JSON body extractor whose rejections use the API error envelope
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}

/// Payload returned by delete endpoints
pub(crate) fn deleted() -> Value {
    json!({ "deleted": true })
}
