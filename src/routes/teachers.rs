use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use super::learners::AuthResponse;
use crate::db::models::Teacher;
use crate::response::AppError;
use crate::services::accounts::{self, Credentials, TeacherRegistration};
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<TeacherRegistration>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let store = state.store();
    let registered =
        accounts::register_teacher(store.as_ref(), &state.config().auth, input).await?;

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
) -> Result<Json<AuthResponse<Teacher>>, AppError> {
    let Json(credentials) = payload?;
    let store = state.store();
    let session =
        accounts::login_teacher(store.as_ref(), &state.config().auth, credentials).await?;

    Ok(Json(AuthResponse {
        token: session.token,
        user: session.user,
    }))
}
