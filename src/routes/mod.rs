mod analytics;
mod health;
mod learners;
mod teachers;
mod videos;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::response::json_error;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/learners/:id/scores",
            get(learners::scores).fallback(fallback_handler),
        )
        .route(
            "/inactivity-check",
            post(learners::inactivity_check).fallback(fallback_handler),
        )
        .route(
            "/api/auth/student/:id/scores",
            get(learners::scores).fallback(fallback_handler),
        )
        .route(
            "/api/auth/student/check-inactivity",
            post(learners::inactivity_check).fallback(fallback_handler),
        )
        .route(
            "/api/auth/student/register",
            post(learners::register).fallback(fallback_handler),
        )
        .route(
            "/api/auth/student/login",
            post(learners::login).fallback(fallback_handler),
        )
        .route(
            "/api/auth/student/all",
            get(learners::list).fallback(fallback_handler),
        )
        .route(
            "/api/auth/teacher/register",
            post(teachers::register).fallback(fallback_handler),
        )
        .route(
            "/api/auth/teacher/login",
            post(teachers::login).fallback(fallback_handler),
        )
        .nest("/api/videos", videos::router())
        .nest("/api/analytics", analytics::router())
        .nest("/health", health::router())
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Route not found").into_response()
}
