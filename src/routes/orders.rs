use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::orders::{
        CreateOrderRequest, CreatedOrders, OrderList, ProcessReturnRequest, ReturnDecision,
        ReturnRequest,
    },
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    middleware::auth::AuthUser,
    models::Order,
    response::{ApiResponse, ErrorResponse},
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/{id}", get(get_order))
        .route("/{id}/ship", post(ship_order))
        .route("/{id}/confirm", post(confirm_receipt))
        .route("/{id}/return", post(apply_for_return))
        .route("/{id}/process-return", post(process_return))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Orders created at PENDING_PAYMENT", body = ApiResponse<CreatedOrders>),
        (status = 400, description = "Empty selection, own listing or product not on sale", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> AppResult<Json<ApiResponse<CreatedOrders>>> {
    let resp = order_service::create_order(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Caller's orders as buyer or seller", body = ApiResponse<OrderList>),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order detail", body = ApiResponse<Order>),
        (status = 401, description = "Caller is not a party to the order", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/ship",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order shipped", body = ApiResponse<Order>),
        (status = 400, description = "Order is not awaiting shipment", body = ErrorResponse),
        (status = 401, description = "Caller is not the seller", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn ship_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::ship_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/confirm",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Receipt confirmed, order completed", body = ApiResponse<Order>),
        (status = 400, description = "Order is not shipped", body = ErrorResponse),
        (status = 401, description = "Caller is not the buyer", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn confirm_receipt(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::confirm_receipt(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/return",
    params(("id" = i64, Path, description = "Order id")),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Return requested", body = ApiResponse<Order>),
        (status = 400, description = "Missing reason or order not shipped", body = ErrorResponse),
        (status = 401, description = "Caller is not the buyer", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn apply_for_return(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<ReturnRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::apply_for_return(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/process-return",
    params(("id" = i64, Path, description = "Order id")),
    request_body = ProcessReturnRequest,
    responses(
        (status = 200, description = "Return approved with its refund, or rejected", body = ApiResponse<ReturnDecision>),
        (status = 400, description = "No pending return request", body = ErrorResponse),
        (status = 401, description = "Caller is not the seller", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn process_return(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<ProcessReturnRequest>,
) -> AppResult<Json<ApiResponse<ReturnDecision>>> {
    let resp = order_service::process_return_request(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
