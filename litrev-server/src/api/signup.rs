//! Public sign-up request endpoint

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::ApiJson;
use crate::db;
use crate::error::{ok, ApiError, ApiResult, Success};
use crate::models::SignupSubmission;
use crate::services::signup_limiter::{client_key, hash_client_key};
use crate::AppState;

/// POST /api/signup-request
///
/// Checks run in order: sign-ups enabled, client under quota, payload valid.
pub async fn submit_signup_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<ApiJson<SignupSubmission>, ApiError>,
) -> ApiResult<Json<Success<Value>>> {
    if !state.config.signup.enabled {
        return Err(ApiError::SignupDisabled("Sign-up requests are currently closed".to_string()));
    }

    let client = client_key(&headers);
    if !state.signup_limiter.check(&client) {
        warn!("Sign-up rate limit exceeded");
        return Err(ApiError::RateLimited(
            "Too many sign-up requests; try again later".to_string(),
        ));
    }

    let ApiJson(submission) = payload?;
    let request = submission.validate().map_err(ApiError::BadRequest)?;

    db::signup::insert_signup_request(&state.db, &request, &hash_client_key(&client))
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to store sign-up request");
            ApiError::Internal("Could not store the sign-up request".to_string())
        })?;

    info!("Sign-up request received");
    Ok(ok(json!({ "status": "received" })))
}

pub fn signup_routes() -> Router<AppState> {
    Router::new().route("/api/signup-request", post(submit_signup_request))
}
