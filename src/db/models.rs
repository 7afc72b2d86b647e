use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Serialize, Serializer};

/// A registered student account. The password hash never leaves the store layer
/// in serialized form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Learner {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub mobile_number: String,
    pub school_name: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "class")]
    pub grade: Option<String>,
    pub preferred_language: Option<String>,
    pub profile_picture: Option<String>,
    pub guardian_email: Option<String>,
    pub guardian_phone: Option<String>,
    #[serde(serialize_with = "serialize_iso_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_iso_millis")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLearner {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub mobile_number: String,
    pub school_name: Option<String>,
    pub state: Option<String>,
    pub grade: Option<String>,
    pub preferred_language: Option<String>,
    pub profile_picture: Option<String>,
    pub guardian_email: Option<String>,
    pub guardian_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub mobile_number: Option<String>,
    pub school_name: String,
    pub state: String,
    pub subjects: Vec<String>,
    pub classes: Vec<String>,
    pub preferred_languages: Vec<String>,
    pub profile_picture: Option<String>,
    #[serde(serialize_with = "serialize_iso_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_iso_millis")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTeacher {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub mobile_number: Option<String>,
    pub school_name: String,
    pub state: String,
    pub subjects: Vec<String>,
    pub classes: Vec<String>,
    pub preferred_languages: Vec<String>,
    pub profile_picture: Option<String>,
}

/// A video-like learning unit with an optional single-question assessment.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub language: String,
    pub classes: Vec<String>,
    pub video_url: String,
    pub assignment: Option<String>,
    pub assignment_answer: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub submission_count: i64,
}

impl ContentItem {
    pub fn has_assessment(&self) -> bool {
        self.assignment_answer.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewContentItem {
    pub title: String,
    pub description: String,
    pub language: String,
    pub classes: Vec<String>,
    pub video_url: String,
    pub assignment: Option<String>,
    pub assignment_answer: Option<String>,
}

/// Binary assessment score. Only `0` and `1` are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum Score {
    Incorrect,
    Correct,
}

impl Score {
    /// Exact, case-sensitive comparison against the expected answer.
    pub fn grade(expected: &str, answer: &str) -> Self {
        if expected == answer {
            Score::Correct
        } else {
            Score::Incorrect
        }
    }

    pub fn points(self) -> u8 {
        match self {
            Score::Incorrect => 0,
            Score::Correct => 1,
        }
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.points()
    }
}

impl TryFrom<i64> for Score {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Score::Incorrect),
            1 => Ok(Score::Correct),
            other => Err(format!("score must be 0 or 1, got {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub content_item_id: String,
    pub learner_id: String,
    pub answer: String,
    pub score: Score,
    #[serde(serialize_with = "serialize_iso_millis")]
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchRecord {
    pub id: String,
    pub learner_id: String,
    pub content_item_id: String,
    pub watch_seconds: f64,
    #[serde(serialize_with = "serialize_iso_millis")]
    pub last_watched_at: DateTime<Utc>,
}

pub fn to_millis(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub fn from_millis(value: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(value).single()
}

pub fn format_iso_millis(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn serialize_iso_millis<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_iso_millis(*value))
}
