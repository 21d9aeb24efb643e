use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::payments::{TimeoutOutcomeView, TimeoutStatus},
    error::AppResult,
    extract::AppPath,
    middleware::auth::AuthUser,
    response::{ApiResponse, ErrorResponse},
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(timeout_status))
        .route("/{payment_id}/expire", post(expire_payment))
}

#[utoipa::path(
    get,
    path = "/api/payment-timeouts/status",
    responses(
        (status = 200, description = "Reconciler state and backlog", body = ApiResponse<TimeoutStatus>),
        (status = 401, description = "Admin only", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn timeout_status(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<TimeoutStatus>>> {
    let resp = payment_service::timeout_status(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payment-timeouts/{payment_id}/expire",
    params(("payment_id" = String, Path, description = "Business payment id")),
    responses(
        (status = 200, description = "Payment expired, or reported as already finalized", body = ApiResponse<TimeoutOutcomeView>),
        (status = 401, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn expire_payment(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(payment_id): AppPath<String>,
) -> AppResult<Json<ApiResponse<TimeoutOutcomeView>>> {
    let resp = payment_service::expire_payment(&state, &user, &payment_id).await?;
    Ok(Json(resp))
}
