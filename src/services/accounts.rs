use serde::Deserialize;
use thiserror::Error;

use crate::auth::{self, AuthError, Role};
use crate::config::AuthConfig;
use crate::db::models::{Learner, NewLearner, NewTeacher, Teacher};
use crate::db::{LearningStore, StoreError};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Required fields missing")]
    MissingFields,
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Mobile number already exists")]
    MobileTaken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    InvalidField(&'static str),
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// UNIQUE violations that slip past `ensure_available` under concurrent
/// registration report the same errors as the up-front check.
impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate {
                column: "username", ..
            } => Self::UsernameTaken,
            StoreError::Duplicate {
                column: "mobileNumber",
                ..
            } => Self::MobileTaken,
            other => Self::Store(other),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerRegistration {
    pub username: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub mobile_number: Option<String>,
    pub school_name: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "class")]
    pub grade: Option<String>,
    pub preferred_language: Option<String>,
    pub profile_picture: Option<String>,
    #[serde(alias = "parentEmail")]
    pub guardian_email: Option<String>,
    #[serde(alias = "parentMobileNumber")]
    pub guardian_phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRegistration {
    pub username: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub mobile_number: Option<String>,
    pub school_name: Option<String>,
    pub state: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub preferred_languages: Vec<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub struct Authenticated<T> {
    pub token: String,
    pub user: T,
}

pub async fn register_learner(
    store: &dyn LearningStore,
    auth_config: &AuthConfig,
    input: LearnerRegistration,
) -> Result<Authenticated<Learner>, AccountError> {
    let (Some(username), Some(password), Some(full_name), Some(mobile_number)) = (
        required(input.username),
        required(input.password),
        required(input.full_name),
        required(input.mobile_number),
    ) else {
        return Err(AccountError::MissingFields);
    };
    let guardian_email = guardian_email(input.guardian_email)?;
    let guardian_phone = guardian_phone(input.guardian_phone)?;

    ensure_available(store, &username, Some(&mobile_number)).await?;

    let learner = store
        .insert_learner(NewLearner {
            username,
            password_hash: auth::hash_password(&password, auth_config.bcrypt_cost)?,
            full_name,
            mobile_number,
            school_name: optional(input.school_name),
            state: optional(input.state),
            grade: optional(input.grade),
            preferred_language: optional(input.preferred_language),
            profile_picture: optional(input.profile_picture),
            guardian_email,
            guardian_phone,
        })
        .await?;

    tracing::info!(learner_id = %learner.id, "learner registered");

    let token = auth::sign_token(auth_config, &learner.id, Role::Student)?;
    Ok(Authenticated { token, user: learner })
}

pub async fn register_teacher(
    store: &dyn LearningStore,
    auth_config: &AuthConfig,
    input: TeacherRegistration,
) -> Result<Authenticated<Teacher>, AccountError> {
    let (Some(username), Some(password), Some(full_name), Some(school_name), Some(state)) = (
        required(input.username),
        required(input.password),
        required(input.full_name),
        required(input.school_name),
        required(input.state),
    ) else {
        return Err(AccountError::MissingFields);
    };
    let mobile_number = optional(input.mobile_number);

    ensure_available(store, &username, mobile_number.as_deref()).await?;

    let teacher = store
        .insert_teacher(NewTeacher {
            username,
            password_hash: auth::hash_password(&password, auth_config.bcrypt_cost)?,
            full_name,
            mobile_number,
            school_name,
            state,
            subjects: input.subjects,
            classes: input.classes,
            preferred_languages: input.preferred_languages,
            profile_picture: optional(input.profile_picture),
        })
        .await?;

    tracing::info!(teacher_id = %teacher.id, "teacher registered");

    let token = auth::sign_token(auth_config, &teacher.id, Role::Teacher)?;
    Ok(Authenticated { token, user: teacher })
}

pub async fn login_learner(
    store: &dyn LearningStore,
    auth_config: &AuthConfig,
    credentials: Credentials,
) -> Result<Authenticated<Learner>, AccountError> {
    let learner = store
        .find_learner_by_username(&credentials.username)
        .await?
        .filter(|l| auth::verify_password(&credentials.password, &l.password_hash))
        .ok_or(AccountError::InvalidCredentials)?;

    let token = auth::sign_token(auth_config, &learner.id, Role::Student)?;
    Ok(Authenticated { token, user: learner })
}

pub async fn login_teacher(
    store: &dyn LearningStore,
    auth_config: &AuthConfig,
    credentials: Credentials,
) -> Result<Authenticated<Teacher>, AccountError> {
    let teacher = store
        .find_teacher_by_username(&credentials.username)
        .await?
        .filter(|t| auth::verify_password(&credentials.password, &t.password_hash))
        .ok_or(AccountError::InvalidCredentials)?;

    let token = auth::sign_token(auth_config, &teacher.id, Role::Teacher)?;
    Ok(Authenticated { token, user: teacher })
}

async fn ensure_available(
    store: &dyn LearningStore,
    username: &str,
    mobile_number: Option<&str>,
) -> Result<(), AccountError> {
    if store.username_exists(username).await? {
        return Err(AccountError::UsernameTaken);
    }
    if let Some(mobile_number) = mobile_number {
        if store.mobile_number_exists(mobile_number).await? {
            return Err(AccountError::MobileTaken);
        }
    }
    Ok(())
}

/// Guardian addresses end up in outbound message headers, so they must be a
/// single token with no control characters.
fn guardian_email(value: Option<String>) -> Result<Option<String>, AccountError> {
    let Some(email) = optional(value) else {
        return Ok(None);
    };
    let malformed = email
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || c == '<' || c == '>');
    let has_parts = matches!(
        email.split_once('@'),
        Some((local, domain)) if !local.is_empty() && !domain.is_empty()
    );
    if malformed || !has_parts {
        return Err(AccountError::InvalidField("parentEmail must be a valid email address"));
    }
    Ok(Some(email))
}

fn guardian_phone(value: Option<String>) -> Result<Option<String>, AccountError> {
    let Some(phone) = optional(value) else {
        return Ok(None);
    };
    if phone.chars().any(char::is_control) {
        return Err(AccountError::InvalidField("parentMobileNumber contains invalid characters"));
    }
    Ok(Some(phone))
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
