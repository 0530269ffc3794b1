//! Shared integration test harness
//!
//! Builds the router over an in-memory database and drives it with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use litrev_common::config::TomlConfig;
use litrev_common::events::EventBus;
use litrev_server::models::{Article, Dimension, DimensionKind};
use litrev_server::services::ai_client::Judgment;
use litrev_server::services::{AiError, LanguageModel};
use litrev_server::{build_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const OWNER: &str = "owner@example.org";

/// Deterministic language model
///
/// Translations are prefixed with the target language; classification
/// answers `yes`, the first option, or a fixed summary per dimension kind.
#[derive(Default)]
pub struct MockModel {
    /// Fail every call at or after this call number (1-based)
    pub fail_from_call: Option<usize>,
    /// Sleep before answering, to keep a job running
    pub delay: Duration,
    calls: AtomicUsize,
}

impl MockModel {
    pub fn working() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_from(call: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_from_call: Some(call),
            ..Default::default()
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next_call(&self) -> Result<(), AiError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.fail_from_call {
            Some(limit) if call >= limit => Err(AiError::Api(500, "mock outage".to_string())),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, AiError> {
        self.next_call().await?;
        Ok(format!("[{}] {}", target_language, text))
    }

    async fn classify(&self, _article: &Article, dimensions: &[Dimension]) -> Result<Vec<Judgment>, AiError> {
        self.next_call().await?;
        Ok(dimensions
            .iter()
            .map(|dimension| Judgment {
                dimension_id: dimension.id,
                value: match dimension.kind {
                    DimensionKind::Boolean => "yes".to_string(),
                    DimensionKind::Categorical => dimension.options.first().cloned().unwrap_or_default(),
                    DimensionKind::Text => "mock summary".to_string(),
                },
                confidence: 0.9,
                rationale: Some("mock".to_string()),
            })
            .collect())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub async fn test_app(ai: Option<Arc<dyn LanguageModel>>) -> TestApp {
    test_app_with_config(TomlConfig::default(), ai).await
}

pub async fn test_app_with_config(config: TomlConfig, ai: Option<Arc<dyn LanguageModel>>) -> TestApp {
    let db = litrev_common::db::init_in_memory_database().await.unwrap();
    let state = AppState::new(db, EventBus::new(256), config, ai);
    TestApp {
        router: build_router(state.clone()),
        state,
    }
}

impl TestApp {
    /// Send a request and decode the JSON body (`Value::Null` when empty)
    pub async fn call(&self, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, user: &str) -> (StatusCode, Value) {
        self.call("GET", uri, Some(user), None).await
    }

    pub async fn post(&self, uri: &str, user: &str, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, Some(user), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, user: &str, body: Value) -> (StatusCode, Value) {
        self.call("PATCH", uri, Some(user), Some(body)).await
    }

    pub async fn put(&self, uri: &str, user: &str, body: Value) -> (StatusCode, Value) {
        self.call("PUT", uri, Some(user), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: &str) -> (StatusCode, Value) {
        self.call("DELETE", uri, Some(user), None).await
    }

    pub async fn create_project(&self, owner: &str, name: &str) -> Uuid {
        let (status, body) = self.post("/api/projects", owner, json!({ "name": name })).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        id_of(&body["data"])
    }

    pub async fn role_id(&self, project_id: Uuid, user: &str, role_name: &str) -> Uuid {
        let (_, body) = self.get(&format!("/api/projects/{}/roles", project_id), user).await;
        let role = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .find(|role| role["name"] == role_name)
            .unwrap_or_else(|| panic!("no role named {}", role_name));
        id_of(role)
    }

    pub async fn add_member(&self, project_id: Uuid, user_id: &str, role_name: &str) {
        let role_id = self.role_id(project_id, OWNER, role_name).await;
        let (status, body) = self
            .post(
                &format!("/api/projects/{}/members", project_id),
                OWNER,
                json!({ "user_id": user_id, "role_id": role_id }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }

    pub async fn create_phase(&self, project_id: Uuid, name: &str) -> Uuid {
        let (status, body) = self
            .post(
                &format!("/api/projects/{}/phases", project_id),
                OWNER,
                json!({ "name": name }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        id_of(&body["data"])
    }

    pub async fn set_phase_status(&self, project_id: Uuid, phase_id: Uuid, status: &str) -> (StatusCode, Value) {
        self.post(
            &format!("/api/projects/{}/phases/{}/status", project_id, phase_id),
            OWNER,
            json!({ "status": status }),
        )
        .await
    }

    pub async fn create_article(&self, project_id: Uuid, title: &str, abstract_text: Option<&str>) -> Uuid {
        let (status, body) = self
            .post(
                &format!("/api/projects/{}/articles", project_id),
                OWNER,
                json!({ "title": title, "abstract": abstract_text }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        id_of(&body["data"])
    }

    pub async fn create_batch(&self, project_id: Uuid, phase_id: Uuid, article_ids: &[Uuid]) -> Uuid {
        let (status, body) = self
            .post(
                &format!("/api/projects/{}/phases/{}/batches", project_id, phase_id),
                OWNER,
                json!({ "article_ids": article_ids }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        id_of(&body["data"])
    }

    pub async fn create_dimension(&self, project_id: Uuid, phase_id: Uuid, body: Value) -> Uuid {
        let (status, body) = self
            .post(
                &format!("/api/projects/{}/phases/{}/dimensions", project_id, phase_id),
                OWNER,
                body,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        id_of(&body["data"])
    }

    pub async fn batch(&self, project_id: Uuid, batch_id: Uuid) -> Value {
        let (status, body) = self
            .get(&format!("/api/projects/{}/batches/{}", project_id, batch_id), OWNER)
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["data"].clone()
    }

    pub async fn submit_job(&self, project_id: Uuid, batch_id: Uuid, job_type: &str) -> (StatusCode, Value) {
        self.post(
            &format!("/api/projects/{}/batches/{}/jobs", project_id, batch_id),
            OWNER,
            json!({ "job_type": job_type }),
        )
        .await
    }

    /// Poll a job until it reaches a terminal status
    pub async fn wait_for_job(&self, job_id: Uuid) -> Value {
        for _ in 0..500 {
            let (status, body) = self.get(&format!("/api/jobs/{}", job_id), OWNER).await;
            assert_eq!(status, StatusCode::OK, "{}", body);
            let job = &body["data"];
            if job["status"] == "completed" || job["status"] == "failed" {
                return job.clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", job_id);
    }

    /// Wait until the runner released its claim on the batch
    pub async fn wait_for_release(&self, batch_id: Uuid) {
        for _ in 0..500 {
            if !self.state.jobs.is_claimed(batch_id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("batch {} still claimed", batch_id);
    }
}

pub fn id_of(value: &Value) -> Uuid {
    Uuid::parse_str(value["id"].as_str().unwrap()).unwrap()
}

pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}
