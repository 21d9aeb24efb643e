use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{response::ApiResponse, state::AppState};

#[derive(Serialize, ToSchema)]
pub struct HealthData {
    /// `ok`, or `degraded` when the database does not answer.
    pub status: String,
    pub database: bool,
    /// Whether the payment timeout sweep is alive.
    pub reconciler_running: bool,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database reachable", body = ApiResponse<HealthData>),
        (status = 503, description = "Database unreachable", body = ApiResponse<HealthData>),
    ),
    tag = "Health"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<HealthData>>) {
    let database = match state.orm.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(error = %err, "health check could not reach the database");
            false
        }
    };
    let (code, status) = if database {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let data = HealthData {
        status: status.to_string(),
        database,
        reconciler_running: state.reconciler.is_running(),
    };
    (code, Json(ApiResponse::ok("Health check", data)))
}
