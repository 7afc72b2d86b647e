use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::db::models::{Score, WatchRecord};
use crate::response::AppError;
use crate::services::content::{
    self, AssignmentAnswer, ContentItemView, ContentUpload, ProgressPing,
};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct SubmissionResponse {
    message: &'static str,
    score: Score,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressResponse {
    message: &'static str,
    video_watch: WatchRecord,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_videos).post(create_video))
        .route("/:id", get(get_video))
        .route("/:id/submit", post(submit_assignment))
        .route("/:id/progress", post(track_progress))
}

async fn create_video(
    State(state): State<AppState>,
    payload: Result<Json<ContentUpload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(upload) = payload?;
    let store = state.store();
    let item = content::create_content_item(store.as_ref(), upload).await?;
    Ok(Json(ContentItemView::from(item)))
}

async fn list_videos(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let items = state.store().list_content_items().await?;
    let views: Vec<ContentItemView> = items.into_iter().map(ContentItemView::from).collect();
    Ok(Json(views))
}

async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store();
    let item = content::get_content_item(store.as_ref(), &id).await?;
    Ok(Json(ContentItemView::from(item)))
}

async fn submit_assignment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AssignmentAnswer>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let store = state.store();
    let score = content::submit_assignment(store.as_ref(), &id, input).await?;

    Ok(Json(SubmissionResponse {
        message: "Assignment submitted successfully",
        score,
    }))
}

async fn track_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ProgressPing>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(ping) = payload?;
    let store = state.store();
    let record = content::track_progress(store.as_ref(), &id, ping, Utc::now()).await?;

    Ok(Json(ProgressResponse {
        message: "Progress updated",
        video_watch: record,
    }))
}
