#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use ignite_backend::config::{AuthConfig, Config};
use ignite_backend::db::models::{
    ContentItem, Learner, NewContentItem, NewLearner, NewTeacher, Submission, Teacher, WatchRecord,
};
use ignite_backend::db::{LearningStore, SqliteStore, StoreError, StoreResult, StoreTotals};
use ignite_backend::services::notifier::{Channel, DispatchError, GuardianNotifier};
use ignite_backend::state::AppState;

/// Records every guardian message instead of delivering it. Addresses listed
/// in `reject` fail with a dispatch error.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Channel, String, String)>>,
    pub reject: Vec<String>,
}

#[async_trait]
impl GuardianNotifier for RecordingNotifier {
    async fn send(
        &self,
        channel: Channel,
        address: &str,
        _subject: &str,
        body: &str,
    ) -> Result<(), DispatchError> {
        if self.reject.iter().any(|r| r == address) {
            return Err(DispatchError::Rejected(format!("{address} bounced")));
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel, address.to_string(), body.to_string()));
        Ok(())
    }
}

pub const BROKEN_STORE_REASON: &str = "disk image is malformed";

/// A store whose every call fails, standing in for a corrupted database.
pub struct BrokenStore;

fn broken<T>(table: &'static str) -> StoreResult<T> {
    Err(StoreError::InvalidRecord {
        table,
        id: "*".to_string(),
        reason: BROKEN_STORE_REASON.to_string(),
    })
}

#[async_trait]
impl LearningStore for BrokenStore {
    async fn ping(&self) -> StoreResult<()> {
        broken("_db_metadata")
    }
    async fn insert_learner(&self, _learner: NewLearner) -> StoreResult<Learner> {
        broken("learners")
    }
    async fn find_learner_by_username(&self, _username: &str) -> StoreResult<Option<Learner>> {
        broken("learners")
    }
    async fn list_learners(&self) -> StoreResult<Vec<Learner>> {
        broken("learners")
    }
    async fn insert_teacher(&self, _teacher: NewTeacher) -> StoreResult<Teacher> {
        broken("teachers")
    }
    async fn find_teacher_by_username(&self, _username: &str) -> StoreResult<Option<Teacher>> {
        broken("teachers")
    }
    async fn username_exists(&self, _username: &str) -> StoreResult<bool> {
        broken("learners")
    }
    async fn mobile_number_exists(&self, _mobile_number: &str) -> StoreResult<bool> {
        broken("learners")
    }
    async fn insert_content_item(&self, _item: NewContentItem) -> StoreResult<ContentItem> {
        broken("content_items")
    }
    async fn list_content_items(&self) -> StoreResult<Vec<ContentItem>> {
        broken("content_items")
    }
    async fn find_content_item(&self, _id: &str) -> StoreResult<Option<ContentItem>> {
        broken("content_items")
    }
    async fn append_submission(&self, _submission: &Submission) -> StoreResult<()> {
        broken("submissions")
    }
    async fn submissions_for_learner(&self, _learner_id: &str) -> StoreResult<Vec<Submission>> {
        broken("submissions")
    }
    async fn upsert_watch_record(
        &self,
        _learner_id: &str,
        _content_item_id: &str,
        _watch_seconds: f64,
        _at: DateTime<Utc>,
    ) -> StoreResult<WatchRecord> {
        broken("watch_records")
    }
    async fn learners_active_since(&self, _since: DateTime<Utc>) -> StoreResult<HashSet<String>> {
        broken("watch_records")
    }
    async fn totals(&self) -> StoreResult<StoreTotals> {
        broken("learners")
    }
}

pub fn test_config() -> Config {
    Config {
        auth: AuthConfig {
            jwt_secret: Some("test-secret".to_string()),
            jwt_expires_in: "1h".to_string(),
            bcrypt_cost: 4,
        },
        ..Config::default()
    }
}

pub async fn create_test_app_with(notifier: Arc<RecordingNotifier>) -> Router {
    let store = SqliteStore::in_memory()
        .await
        .expect("in-memory store should open");
    let state = AppState::new(test_config(), Arc::new(store), notifier);
    ignite_backend::create_app(state)
}

pub fn create_broken_store_app(notifier: Arc<RecordingNotifier>) -> Router {
    let state = AppState::new(test_config(), Arc::new(BrokenStore), notifier);
    ignite_backend::create_app(state)
}

pub async fn create_test_app() -> Router {
    create_test_app_with(Arc::new(RecordingNotifier::default())).await
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
