use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

const DATABASE_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/live", get(live))
        .route("/ready", get(ready))
}

#[derive(Serialize)]
struct CompatHealthResponse {
    status: &'static str,
    database: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
struct LivenessResponse {
    status: &'static str,
    timestamp: String,
    uptime: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadinessResponse {
    status: &'static str,
    timestamp: String,
    uptime: u64,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database_latency: Option<u64>,
}

enum DbCheckStatus {
    Connected { latency_ms: u64 },
    Timeout,
    Disconnected,
}

impl DbCheckStatus {
    fn label(&self) -> &'static str {
        match self {
            DbCheckStatus::Connected { .. } => "connected",
            DbCheckStatus::Timeout => "timeout",
            DbCheckStatus::Disconnected => "disconnected",
        }
    }
}

async fn root(State(state): State<AppState>) -> Response {
    let db_status = database_check(&state).await;
    let ok = matches!(db_status, DbCheckStatus::Connected { .. });

    let response = CompatHealthResponse {
        status: if ok { "ok" } else { "degraded" },
        database: db_status.label(),
        timestamp: now_iso(),
    };

    let status_code = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response)).into_response()
}

async fn live(State(state): State<AppState>) -> Response {
    Json(LivenessResponse {
        status: "healthy",
        timestamp: now_iso(),
        uptime: state.uptime_seconds(),
    })
    .into_response()
}

async fn ready(State(state): State<AppState>) -> Response {
    let db_check = database_check(&state).await;

    let (status, status_code) = match db_check {
        DbCheckStatus::Connected { .. } => ("healthy", StatusCode::OK),
        DbCheckStatus::Timeout => ("degraded", StatusCode::OK),
        DbCheckStatus::Disconnected => ("unhealthy", StatusCode::SERVICE_UNAVAILABLE),
    };
    let database_latency = match db_check {
        DbCheckStatus::Connected { latency_ms } => Some(latency_ms),
        _ => None,
    };

    let response = ReadinessResponse {
        status,
        timestamp: now_iso(),
        uptime: state.uptime_seconds(),
        database: db_check.label(),
        database_latency,
    };

    (status_code, Json(response)).into_response()
}

async fn database_check(state: &AppState) -> DbCheckStatus {
    let store = state.store();
    let started = Instant::now();

    match tokio::time::timeout(DATABASE_CHECK_TIMEOUT, store.ping()).await {
        Ok(Ok(())) => DbCheckStatus::Connected {
            latency_ms: started.elapsed().as_millis() as u64,
        },
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "health check: database ping failed");
            DbCheckStatus::Disconnected
        }
        Err(_) => DbCheckStatus::Timeout,
    }
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
