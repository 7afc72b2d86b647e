pub mod models;
pub mod schema;

mod sqlite;

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::models::{
    ContentItem, Learner, NewContentItem, NewLearner, NewTeacher, Submission, Teacher, WatchRecord,
};

pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("invalid {table} record {id}: {reason}")]
    InvalidRecord {
        table: &'static str,
        id: String,
        reason: String,
    },
    #[error("duplicate {table}.{column}")]
    Duplicate {
        table: &'static str,
        column: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreTotals {
    pub content_items: i64,
    pub learners: i64,
    pub watch_seconds: f64,
    pub submissions: i64,
    pub correct_submissions: i64,
}

/// Data-access contract for everything the request handlers and batch jobs read
/// or write. Handlers receive it through `AppState`; nothing reaches the
/// database through globals.
#[async_trait]
pub trait LearningStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    async fn insert_learner(&self, learner: NewLearner) -> StoreResult<Learner>;
    async fn find_learner_by_username(&self, username: &str) -> StoreResult<Option<Learner>>;
    /// All learners in registration order.
    async fn list_learners(&self) -> StoreResult<Vec<Learner>>;

    async fn insert_teacher(&self, teacher: NewTeacher) -> StoreResult<Teacher>;
    async fn find_teacher_by_username(&self, username: &str) -> StoreResult<Option<Teacher>>;

    /// Usernames are unique across learners and teachers.
    async fn username_exists(&self, username: &str) -> StoreResult<bool>;
    /// Mobile numbers are unique across learners and teachers.
    async fn mobile_number_exists(&self, mobile_number: &str) -> StoreResult<bool>;

    async fn insert_content_item(&self, item: NewContentItem) -> StoreResult<ContentItem>;
    /// Newest upload first.
    async fn list_content_items(&self) -> StoreResult<Vec<ContentItem>>;
    async fn find_content_item(&self, id: &str) -> StoreResult<Option<ContentItem>>;

    async fn append_submission(&self, submission: &Submission) -> StoreResult<()>;
    /// Every submission the learner made, across all content items.
    async fn submissions_for_learner(&self, learner_id: &str) -> StoreResult<Vec<Submission>>;

    async fn upsert_watch_record(
        &self,
        learner_id: &str,
        content_item_id: &str,
        watch_seconds: f64,
        at: DateTime<Utc>,
    ) -> StoreResult<WatchRecord>;
    /// Distinct learner ids with a watch record at or after `since`.
    async fn learners_active_since(&self, since: DateTime<Utc>) -> StoreResult<HashSet<String>>;

    async fn totals(&self) -> StoreResult<StoreTotals>;
}

pub fn default_sqlite_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ignite")
        .join("ignite.db")
}
