//! litrev-server library interface
//!
//! HTTP API for collaborative literature review projects. Exposed as a
//! library so integration tests can drive the router directly.

pub mod api;
pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use litrev_common::config::TomlConfig;
use litrev_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::{JobTracker, LanguageModel, SignupLimiter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Change events for SSE subscribers
    pub event_bus: EventBus,
    /// Language model; `None` when no API key is configured
    pub ai: Option<Arc<dyn LanguageModel>>,
    /// Running job claims and cancellation tokens
    pub jobs: JobTracker,
    pub signup_limiter: Arc<SignupLimiter>,
    pub config: Arc<TomlConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        config: TomlConfig,
        ai: Option<Arc<dyn LanguageModel>>,
    ) -> Self {
        Self {
            db,
            event_bus,
            ai,
            jobs: JobTracker::new(),
            signup_limiter: Arc::new(SignupLimiter::from_config(&config.signup)),
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::signup_routes())
        .merge(api::project_routes())
        .merge(api::member_routes())
        .merge(api::phase_routes())
        .merge(api::batch_routes())
        .merge(api::job_routes())
        .merge(api::article_routes())
        .merge(api::note_routes())
        .merge(api::event_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
