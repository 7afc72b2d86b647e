use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::db::models::{
    from_millis, to_millis, ContentItem, Learner, NewContentItem, NewLearner, NewTeacher, Score,
    Submission, Teacher, WatchRecord,
};
use crate::db::schema::run_migrations;
use crate::db::{DbInitError, LearningStore, StoreError, StoreResult, StoreTotals};

const LEARNER_COLUMNS: &str = r#""id", "username", "passwordHash", "fullName", "mobileNumber",
    "schoolName", "state", "grade", "preferredLanguage", "profilePicture",
    "guardianEmail", "guardianPhone", "createdAt", "updatedAt""#;

const TEACHER_COLUMNS: &str = r#""id", "username", "passwordHash", "fullName", "mobileNumber",
    "schoolName", "state", "subjects", "classes", "preferredLanguages", "profilePicture",
    "createdAt", "updatedAt""#;

const CONTENT_COLUMNS: &str = r#"c."id", c."title", c."description", c."language", c."classes",
    c."videoUrl", c."assignment", c."assignmentAnswer", c."uploadedAt",
    (SELECT COUNT(*) FROM "submissions" s WHERE s."contentItemId" = c."id") AS "submissionCount""#;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `url` and applies the schema.
    pub async fn connect(url: &str) -> Result<Self, DbInitError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DbInitError::Config(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn open_file(path: &Path) -> Result<Self, DbInitError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DbInitError::Io(e.to_string()))?;
        }
        Self::connect(&format!("sqlite:{}?mode=rwc", path.display())).await
    }

    /// Single-connection in-memory database; every connection to `:memory:`
    /// would otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self, DbInitError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DbInitError::Config(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, DbInitError> {
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl LearningStore for SqliteStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_learner(&self, learner: NewLearner) -> StoreResult<Learner> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = to_millis(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO "learners" (
                "id", "username", "passwordHash", "fullName", "mobileNumber",
                "schoolName", "state", "grade", "preferredLanguage", "profilePicture",
                "guardianEmail", "guardianPhone", "createdAt", "updatedAt"
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&learner.username)
        .bind(&learner.password_hash)
        .bind(&learner.full_name)
        .bind(&learner.mobile_number)
        .bind(&learner.school_name)
        .bind(&learner.state)
        .bind(&learner.grade)
        .bind(&learner.preferred_language)
        .bind(&learner.profile_picture)
        .bind(&learner.guardian_email)
        .bind(&learner.guardian_phone)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation("learners", e))?;

        let row = sqlx::query(&format!(
            r#"SELECT {LEARNER_COLUMNS} FROM "learners" WHERE "id" = ?"#
        ))
        .bind(&id)
        .fetch_one(&self.pool)
        .await?;

        learner_from_row(&row)
    }

    async fn find_learner_by_username(&self, username: &str) -> StoreResult<Option<Learner>> {
        let row = sqlx::query(&format!(
            r#"SELECT {LEARNER_COLUMNS} FROM "learners" WHERE "username" = ?"#
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(learner_from_row).transpose()
    }

    async fn list_learners(&self) -> StoreResult<Vec<Learner>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {LEARNER_COLUMNS} FROM "learners" ORDER BY "createdAt" ASC, rowid ASC"#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(learner_from_row).collect()
    }

    async fn insert_teacher(&self, teacher: NewTeacher) -> StoreResult<Teacher> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = to_millis(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO "teachers" (
                "id", "username", "passwordHash", "fullName", "mobileNumber",
                "schoolName", "state", "subjects", "classes", "preferredLanguages",
                "profilePicture", "createdAt", "updatedAt"
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&teacher.username)
        .bind(&teacher.password_hash)
        .bind(&teacher.full_name)
        .bind(&teacher.mobile_number)
        .bind(&teacher.school_name)
        .bind(&teacher.state)
        .bind(encode_list(&teacher.subjects))
        .bind(encode_list(&teacher.classes))
        .bind(encode_list(&teacher.preferred_languages))
        .bind(&teacher.profile_picture)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation("teachers", e))?;

        let row = sqlx::query(&format!(
            r#"SELECT {TEACHER_COLUMNS} FROM "teachers" WHERE "id" = ?"#
        ))
        .bind(&id)
        .fetch_one(&self.pool)
        .await?;

        teacher_from_row(&row)
    }

    async fn find_teacher_by_username(&self, username: &str) -> StoreResult<Option<Teacher>> {
        let row = sqlx::query(&format!(
            r#"SELECT {TEACHER_COLUMNS} FROM "teachers" WHERE "username" = ?"#
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(teacher_from_row).transpose()
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        let exists: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS(SELECT 1 FROM "learners" WHERE "username" = ?1)
                OR EXISTS(SELECT 1 FROM "teachers" WHERE "username" = ?1)
            "#,
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists != 0)
    }

    async fn mobile_number_exists(&self, mobile_number: &str) -> StoreResult<bool> {
        let exists: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS(SELECT 1 FROM "learners" WHERE "mobileNumber" = ?1)
                OR EXISTS(SELECT 1 FROM "teachers" WHERE "mobileNumber" = ?1)
            "#,
        )
        .bind(mobile_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists != 0)
    }

    async fn insert_content_item(&self, item: NewContentItem) -> StoreResult<ContentItem> {
        let id = uuid::Uuid::new_v4().to_string();
        let uploaded_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO "content_items" (
                "id", "title", "description", "language", "classes", "videoUrl",
                "assignment", "assignmentAnswer", "uploadedAt"
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.language)
        .bind(encode_list(&item.classes))
        .bind(&item.video_url)
        .bind(&item.assignment)
        .bind(&item.assignment_answer)
        .bind(to_millis(uploaded_at))
        .execute(&self.pool)
        .await?;

        self.find_content_item(&id).await?.ok_or_else(|| StoreError::InvalidRecord {
            table: "content_items",
            id,
            reason: "inserted row not readable".to_string(),
        })
    }

    async fn list_content_items(&self) -> StoreResult<Vec<ContentItem>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {CONTENT_COLUMNS} FROM "content_items" c ORDER BY c."uploadedAt" DESC, c.rowid DESC"#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(content_item_from_row).collect()
    }

    async fn find_content_item(&self, id: &str) -> StoreResult<Option<ContentItem>> {
        let row = sqlx::query(&format!(
            r#"SELECT {CONTENT_COLUMNS} FROM "content_items" c WHERE c."id" = ?"#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(content_item_from_row).transpose()
    }

    async fn append_submission(&self, submission: &Submission) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO "submissions" (
                "id", "contentItemId", "learnerId", "answer", "score", "submittedAt"
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&submission.content_item_id)
        .bind(&submission.learner_id)
        .bind(&submission.answer)
        .bind(i64::from(submission.score.points()))
        .bind(to_millis(submission.submitted_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn submissions_for_learner(&self, learner_id: &str) -> StoreResult<Vec<Submission>> {
        let rows = sqlx::query(
            r#"
            SELECT "id", "contentItemId", "learnerId", "answer", "score", "submittedAt"
            FROM "submissions"
            WHERE "learnerId" = ?
            ORDER BY "submittedAt" ASC, rowid ASC
            "#,
        )
        .bind(learner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(submission_from_row).collect()
    }

    async fn upsert_watch_record(
        &self,
        learner_id: &str,
        content_item_id: &str,
        watch_seconds: f64,
        at: DateTime<Utc>,
    ) -> StoreResult<WatchRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO "watch_records" ("id", "learnerId", "contentItemId", "watchSeconds", "lastWatchedAt")
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT ("learnerId", "contentItemId") DO UPDATE SET
                "watchSeconds" = excluded."watchSeconds",
                "lastWatchedAt" = excluded."lastWatchedAt"
            RETURNING "id", "learnerId", "contentItemId", "watchSeconds", "lastWatchedAt"
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(learner_id)
        .bind(content_item_id)
        .bind(watch_seconds)
        .bind(to_millis(at))
        .fetch_one(&self.pool)
        .await?;

        watch_record_from_row(&row)
    }

    async fn learners_active_since(&self, since: DateTime<Utc>) -> StoreResult<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"SELECT DISTINCT "learnerId" FROM "watch_records" WHERE "lastWatchedAt" >= ?"#,
        )
        .bind(to_millis(since))
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn totals(&self) -> StoreResult<StoreTotals> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM "content_items") AS "contentItems",
                (SELECT COUNT(*) FROM "learners") AS "learners",
                (SELECT COALESCE(SUM("watchSeconds"), 0.0) FROM "watch_records") AS "watchSeconds",
                (SELECT COUNT(*) FROM "submissions") AS "submissions",
                (SELECT COALESCE(SUM("score"), 0) FROM "submissions") AS "correctSubmissions"
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreTotals {
            content_items: row.try_get("contentItems")?,
            learners: row.try_get("learners")?,
            watch_seconds: row.try_get("watchSeconds")?,
            submissions: row.try_get("submissions")?,
            correct_submissions: row.try_get("correctSubmissions")?,
        })
    }
}

fn encode_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

fn decode_list(table: &'static str, id: &str, raw: &str) -> StoreResult<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| StoreError::InvalidRecord {
        table,
        id: id.to_string(),
        reason: format!("malformed list column: {e}"),
    })
}

fn timestamp(table: &'static str, id: &str, millis: i64) -> StoreResult<DateTime<Utc>> {
    from_millis(millis).ok_or_else(|| StoreError::InvalidRecord {
        table,
        id: id.to_string(),
        reason: format!("timestamp out of range: {millis}"),
    })
}

fn learner_from_row(row: &SqliteRow) -> StoreResult<Learner> {
    let id: String = row.try_get("id")?;
    Ok(Learner {
        username: row.try_get("username")?,
        password_hash: row.try_get("passwordHash")?,
        full_name: row.try_get("fullName")?,
        mobile_number: row.try_get("mobileNumber")?,
        school_name: row.try_get("schoolName")?,
        state: row.try_get("state")?,
        grade: row.try_get("grade")?,
        preferred_language: row.try_get("preferredLanguage")?,
        profile_picture: row.try_get("profilePicture")?,
        guardian_email: non_blank(row.try_get("guardianEmail")?),
        guardian_phone: non_blank(row.try_get("guardianPhone")?),
        created_at: timestamp("learners", &id, row.try_get("createdAt")?)?,
        updated_at: timestamp("learners", &id, row.try_get("updatedAt")?)?,
        id,
    })
}

fn teacher_from_row(row: &SqliteRow) -> StoreResult<Teacher> {
    let id: String = row.try_get("id")?;
    let subjects: String = row.try_get("subjects")?;
    let classes: String = row.try_get("classes")?;
    let languages: String = row.try_get("preferredLanguages")?;
    Ok(Teacher {
        username: row.try_get("username")?,
        password_hash: row.try_get("passwordHash")?,
        full_name: row.try_get("fullName")?,
        mobile_number: row.try_get("mobileNumber")?,
        school_name: row.try_get("schoolName")?,
        state: row.try_get("state")?,
        subjects: decode_list("teachers", &id, &subjects)?,
        classes: decode_list("teachers", &id, &classes)?,
        preferred_languages: decode_list("teachers", &id, &languages)?,
        profile_picture: row.try_get("profilePicture")?,
        created_at: timestamp("teachers", &id, row.try_get("createdAt")?)?,
        updated_at: timestamp("teachers", &id, row.try_get("updatedAt")?)?,
        id,
    })
}

fn content_item_from_row(row: &SqliteRow) -> StoreResult<ContentItem> {
    let id: String = row.try_get("id")?;
    let classes: String = row.try_get("classes")?;
    Ok(ContentItem {
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        language: row.try_get("language")?,
        classes: decode_list("content_items", &id, &classes)?,
        video_url: row.try_get("videoUrl")?,
        assignment: row.try_get("assignment")?,
        assignment_answer: row.try_get("assignmentAnswer")?,
        uploaded_at: timestamp("content_items", &id, row.try_get("uploadedAt")?)?,
        submission_count: row.try_get("submissionCount")?,
        id,
    })
}

fn submission_from_row(row: &SqliteRow) -> StoreResult<Submission> {
    let id: String = row.try_get("id")?;
    let raw_score: i64 = row.try_get("score")?;
    let score = Score::try_from(raw_score).map_err(|reason| StoreError::InvalidRecord {
        table: "submissions",
        id: id.clone(),
        reason,
    })?;
    Ok(Submission {
        content_item_id: row.try_get("contentItemId")?,
        learner_id: row.try_get("learnerId")?,
        answer: row.try_get("answer")?,
        score,
        submitted_at: timestamp("submissions", &id, row.try_get("submittedAt")?)?,
    })
}

fn watch_record_from_row(row: &SqliteRow) -> StoreResult<WatchRecord> {
    let id: String = row.try_get("id")?;
    Ok(WatchRecord {
        learner_id: row.try_get("learnerId")?,
        content_item_id: row.try_get("contentItemId")?,
        watch_seconds: row.try_get("watchSeconds")?,
        last_watched_at: timestamp("watch_records", &id, row.try_get("lastWatchedAt")?)?,
        id,
    })
}

/// SQLite names the failing column as `table.column` in the constraint message.
fn unique_violation(table: &'static str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let message = db_err.message();
            for column in ["username", "mobileNumber"] {
                if message.contains(&format!("{table}.{column}")) {
                    return StoreError::Duplicate { table, column };
                }
            }
        }
    }
    StoreError::Sqlx(err)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
