use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::payments::{ConfirmPaymentRequest, CreatePaymentRequest, PaymentList},
    error::{AppError, AppResult},
    extract::{AppJson, AppPath, AppQuery},
    middleware::auth::AuthUser,
    models::Payment,
    response::{ApiResponse, ErrorResponse},
    routes::params::{OrderIdsQuery, Pagination},
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_payment).get(list_payments))
        .route("/by-orders", get(get_payment_by_orders))
        .route("/{payment_id}", get(get_payment))
        .route("/{payment_id}/confirm", post(confirm_payment))
        .route("/{payment_id}/cancel", post(cancel_payment))
}

#[utoipa::path(
    post,
    path = "/api/payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 200, description = "Pending payment bound to the orders", body = ApiResponse<Payment>),
        (status = 400, description = "Invalid amount or method, amount mismatch, order not awaiting payment or already bound", body = ErrorResponse),
        (status = 401, description = "Order belongs to another buyer", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreatePaymentRequest>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let resp = payment_service::create_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments",
    params(Pagination),
    responses(
        (status = 200, description = "Caller's payments, newest first", body = ApiResponse<PaymentList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(pagination): AppQuery<Pagination>,
) -> AppResult<Json<ApiResponse<PaymentList>>> {
    let resp = payment_service::list_payments(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/by-orders",
    params(OrderIdsQuery),
    responses(
        (status = 200, description = "Most recent payment covering the orders", body = ApiResponse<Payment>),
        (status = 400, description = "Malformed order id list", body = ErrorResponse),
        (status = 404, description = "No such payment", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn get_payment_by_orders(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<OrderIdsQuery>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let order_ids = query
        .parse()
        .ok_or_else(|| AppError::invalid_params("order_ids must be a comma separated list of ids"))?;
    let resp = payment_service::get_payment_by_order_ids(&state, &user, order_ids).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/{payment_id}",
    params(("payment_id" = String, Path, description = "Business payment id")),
    responses(
        (status = 200, description = "Payment status", body = ApiResponse<Payment>),
        (status = 404, description = "Payment not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(payment_id): AppPath<String>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let resp = payment_service::get_payment_status(&state, &user, &payment_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/{payment_id}/confirm",
    params(("payment_id" = String, Path, description = "Business payment id")),
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Payment succeeded, orders awaiting shipment", body = ApiResponse<Payment>),
        (status = 400, description = "Already processed, wrong password or timed out", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(payment_id): AppPath<String>,
    AppJson(payload): AppJson<ConfirmPaymentRequest>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let resp = payment_service::process_payment(&state, &user, &payment_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/{payment_id}/cancel",
    params(("payment_id" = String, Path, description = "Business payment id")),
    responses(
        (status = 200, description = "Payment cancelled, orders cancelled", body = ApiResponse<Payment>),
        (status = 400, description = "Payment already processed", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn cancel_payment(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(payment_id): AppPath<String>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let resp = payment_service::cancel_payment(&state, &user, &payment_id).await?;
    Ok(Json(resp))
}
