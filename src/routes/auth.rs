use axum::{
    Json, Router,
    extract::State,
    routing::{post, put},
};

use crate::{
    dto::auth::{LoginRequest, LoginResponse, PaymentPasswordRequest, RegisterRequest},
    error::AppResult,
    extract::AppJson,
    middleware::auth::AuthUser,
    models::User,
    response::{ApiResponse, ErrorResponse},
    services::auth_service::{login_user, register_user, set_payment_password},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/payment-password", put(payment_password))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Register user", body = ApiResponse<User>),
        (status = 400, description = "Invalid input or email taken", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = register_user(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login user", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = login_user(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/auth/payment-password",
    request_body = PaymentPasswordRequest,
    responses(
        (status = 200, description = "Payment password set", body = ApiResponse<User>),
        (status = 400, description = "Payment password must be 6 digits", body = ErrorResponse),
        (status = 401, description = "Wrong login password", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn payment_password(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<PaymentPasswordRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = set_payment_password(&state, &user, payload).await?;
    Ok(Json(resp))
}
