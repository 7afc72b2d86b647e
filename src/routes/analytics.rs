use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::response::AppError;
use crate::services::content::{analytics_overview, AnalyticsOverview};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/overview", get(overview))
}

async fn overview(State(state): State<AppState>) -> Result<Json<AnalyticsOverview>, AppError> {
    let store = state.store();
    Ok(Json(analytics_overview(store.as_ref()).await?))
}
