use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::db::models::Learner;
use crate::response::AppError;
use crate::services::accounts::{self, Credentials, LearnerRegistration};
use crate::services::inactivity::{run_inactivity_scan, InactivityReport};
use crate::services::scores::{aggregate_scores, ScoreSummary};
use crate::state::AppState;

#[derive(Serialize)]
pub struct AuthResponse<T> {
    pub token: String,
    pub user: T,
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<LearnerRegistration>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let store = state.store();
    let registered =
        accounts::register_learner(store.as_ref(), &state.config().auth, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: registered.token,
            user: registered.user,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<AuthResponse<Learner>>, AppError> {
    let Json(credentials) = payload?;
    let store = state.store();
    let session =
        accounts::login_learner(store.as_ref(), &state.config().auth, credentials).await?;

    Ok(Json(AuthResponse {
        token: session.token,
        user: session.user,
    }))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Learner>>, AppError> {
    let learners = state.store().list_learners().await?;
    Ok(Json(learners))
}

pub async fn scores(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
) -> Result<Json<ScoreSummary>, AppError> {
    let learner_id = learner_id.trim();
    if learner_id.is_empty() {
        return Err(AppError::validation("learner id is required"));
    }

    let store = state.store();
    let summary = aggregate_scores(store.as_ref(), learner_id).await?;
    Ok(Json(summary))
}

pub async fn inactivity_check(
    State(state): State<AppState>,
) -> Result<Json<InactivityReport>, AppError> {
    let store = state.store();
    let notifier = state.notifier();
    let report = run_inactivity_scan(
        store.as_ref(),
        notifier.as_ref(),
        state.config().inactivity.window(),
        Utc::now(),
    )
    .await?;
    Ok(Json(report))
}
