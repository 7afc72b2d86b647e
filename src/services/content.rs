use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::{serialize_iso_millis, ContentItem, NewContentItem, Score, Submission, WatchRecord};
use crate::db::{LearningStore, StoreError};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{0}")]
    Validation(String),
    #[error("Video not found")]
    NotFound,
    #[error("This video has no assignment")]
    NoAssessment,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Grade labels arrive either as a JSON array or as a JSON-encoded string of one,
/// the latter being what multipart form clients send.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ClassList {
    List(Vec<String>),
    Encoded(String),
}

impl ClassList {
    fn into_vec(self) -> Result<Vec<String>, ContentError> {
        match self {
            ClassList::List(list) => Ok(list),
            ClassList::Encoded(raw) => serde_json::from_str(&raw)
                .map_err(|_| ContentError::Validation("classes must be a list".to_string())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentUpload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub classes: Option<ClassList>,
    pub video_url: Option<String>,
    pub assignment: Option<String>,
    pub assignment_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentAnswer {
    pub student_id: Option<String>,
    pub answer: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPing {
    pub student_id: Option<String>,
    pub watch_time: Option<f64>,
}

/// Public view of a content item; the expected answer is never exposed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItemView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub language: String,
    pub classes: Vec<String>,
    pub video_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<String>,
    pub has_assessment: bool,
    pub submission_count: i64,
    #[serde(serialize_with = "serialize_iso_millis")]
    pub uploaded_at: DateTime<Utc>,
}

impl From<ContentItem> for ContentItemView {
    fn from(item: ContentItem) -> Self {
        Self {
            has_assessment: item.has_assessment(),
            id: item.id,
            title: item.title,
            description: item.description,
            language: item.language,
            classes: item.classes,
            video_url: item.video_url,
            assignment: item.assignment,
            submission_count: item.submission_count,
            uploaded_at: item.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOverview {
    pub total_videos: i64,
    pub total_learners: i64,
    pub total_watch_seconds: f64,
    pub total_submissions: i64,
    pub average_score_percentage: f64,
}

pub async fn create_content_item(
    store: &dyn LearningStore,
    upload: ContentUpload,
) -> Result<ContentItem, ContentError> {
    let title = required("title", upload.title)?;
    let description = required("description", upload.description)?;
    let language = required("language", upload.language)?;
    let video_url = required("videoUrl", upload.video_url)?;
    let classes = upload
        .classes
        .ok_or_else(|| ContentError::Validation("classes is required".to_string()))?
        .into_vec()?;

    let assignment_answer = upload.assignment_answer.filter(|a| !a.is_empty());
    let assignment = upload
        .assignment
        .filter(|a| !a.trim().is_empty())
        .filter(|_| assignment_answer.is_some());

    let item = store
        .insert_content_item(NewContentItem {
            title,
            description,
            language,
            classes,
            video_url,
            assignment,
            assignment_answer,
        })
        .await?;

    tracing::info!(content_id = %item.id, has_assessment = item.has_assessment(), "content item created");
    Ok(item)
}

pub async fn get_content_item(
    store: &dyn LearningStore,
    id: &str,
) -> Result<ContentItem, ContentError> {
    store.find_content_item(id).await?.ok_or(ContentError::NotFound)
}

/// Grades the answer against the item's expected answer and appends the
/// submission to the item.
pub async fn submit_assignment(
    store: &dyn LearningStore,
    content_id: &str,
    input: AssignmentAnswer,
) -> Result<Score, ContentError> {
    let item = get_content_item(store, content_id).await?;

    let learner_id = required("studentId", input.student_id)?;
    let answer = input
        .answer
        .ok_or_else(|| ContentError::Validation("answer is required".to_string()))?;
    let expected = item.assignment_answer.as_deref().ok_or(ContentError::NoAssessment)?;

    let score = Score::grade(expected, &answer);
    store
        .append_submission(&Submission {
            content_item_id: item.id.clone(),
            learner_id,
            answer,
            score,
            submitted_at: Utc::now(),
        })
        .await?;

    Ok(score)
}

pub async fn track_progress(
    store: &dyn LearningStore,
    content_id: &str,
    ping: ProgressPing,
    now: DateTime<Utc>,
) -> Result<WatchRecord, ContentError> {
    let learner_id = required("studentId", ping.student_id)?;
    let watch_seconds = ping
        .watch_time
        .filter(|t| t.is_finite() && *t >= 0.0)
        .ok_or_else(|| {
            ContentError::Validation("watchTime must be a non-negative number".to_string())
        })?;

    get_content_item(store, content_id).await?;

    let record = store
        .upsert_watch_record(&learner_id, content_id, watch_seconds, now)
        .await?;
    Ok(record)
}

pub async fn analytics_overview(store: &dyn LearningStore) -> Result<AnalyticsOverview, ContentError> {
    let totals = store.totals().await?;
    let average_score_percentage = if totals.submissions > 0 {
        totals.correct_submissions as f64 / totals.submissions as f64 * 100.0
    } else {
        0.0
    };

    Ok(AnalyticsOverview {
        total_videos: totals.content_items,
        total_learners: totals.learners,
        total_watch_seconds: totals.watch_seconds,
        total_submissions: totals.submissions,
        average_score_percentage,
    })
}

fn required(field: &str, value: Option<String>) -> Result<String, ContentError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ContentError::Validation(format!("{field} is required")))
}
