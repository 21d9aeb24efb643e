use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, Set};

use crate::{
    collaborators::{AuditEntry, audit::log_audit},
    dto::auth::{Claims, LoginRequest, LoginResponse, PaymentPasswordRequest, RegisterRequest},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult, ErrorCode},
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    state::AppState,
};

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let RegisterRequest {
        username,
        nickname,
        email,
        password,
        payment_password,
    } = payload;
    let username = username.trim().to_string();
    let email = email.trim().to_lowercase();
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::invalid_params(
            "username, email and password are required",
        ));
    }
    if let Some(secret) = &payment_password {
        validate_payment_password(secret)?;
    }

    let exist = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::bad_request(
            ErrorCode::EmailTaken,
            "Email is already taken",
        ));
    }
    let exist = Users::find()
        .filter(UserCol::Username.eq(username.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::invalid_params("Username is already taken"));
    }

    let password_hash = hash_secret(&password)?;
    let payment_password_hash = payment_password.as_deref().map(hash_secret).transpose()?;

    let user = UserActive {
        id: NotSet,
        username: Set(username),
        nickname: Set(nickname.filter(|n| !n.trim().is_empty())),
        email: Set(email),
        password_hash: Set(password_hash),
        payment_password_hash: Set(payment_password_hash),
        role: Set("user".into()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    log_audit(
        state,
        AuditEntry::success(Some(user.id), "user_register", "user", user.id),
    );
    Ok(ApiResponse::ok("User created", user_from_entity(user)))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let user = Users::find()
        .filter(UserCol::Email.eq(email.trim().to_lowercase()))
        .one(&state.orm)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_secret(&password, &user.password_hash)? {
        return Err(invalid_credentials());
    }

    let (claims, expires_at) = Claims::issue(user.id, &user.role, Utc::now())
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    log_audit(
        state,
        AuditEntry::success(Some(user.id), "user_login", "user", user.id),
    );

    Ok(ApiResponse::ok(
        "Logged in",
        LoginResponse {
            token: format!("Bearer {}", token),
            expires_at,
            user: user_from_entity(user),
        },
    ))
}

/// Sets or replaces the caller's payment password after re-checking the login password.
pub async fn set_payment_password(
    state: &AppState,
    user: &AuthUser,
    payload: PaymentPasswordRequest,
) -> AppResult<ApiResponse<User>> {
    validate_payment_password(&payload.payment_password)?;

    let account = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".into()))?;
    if !verify_secret(&payload.password, &account.password_hash)? {
        return Err(invalid_credentials());
    }

    let mut active: UserActive = account.into();
    active.payment_password_hash = Set(Some(hash_secret(&payload.payment_password)?));
    let account = active.update(&state.orm).await?;

    log_audit(
        state,
        AuditEntry::success(Some(user.user_id), "payment_password_set", "user", user.user_id),
    );
    Ok(ApiResponse::ok(
        "Payment password updated",
        user_from_entity(account),
    ))
}

/// Checks a payment credential against the payer's stored payment password. A payer without one
/// never passes.
pub async fn verify_payment_password(
    state: &AppState,
    user_id: i64,
    credential: &str,
) -> AppResult<bool> {
    let account = Users::find_by_id(user_id).one(&state.orm).await?;
    match account.and_then(|a| a.payment_password_hash) {
        Some(hash) => verify_secret(credential, &hash),
        None => Ok(false),
    }
}

/// Payment passwords are six digits.
fn validate_payment_password(secret: &str) -> AppResult<()> {
    if secret.len() != 6 || !secret.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::bad_request(
            ErrorCode::InvalidPaymentPassword,
            "payment password must be 6 digits",
        ));
    }
    Ok(())
}

pub fn hash_secret(secret: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn verify_secret(secret: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok())
}

fn invalid_credentials() -> AppError {
    AppError::permission_denied(ErrorCode::InvalidCredentials, "Invalid email or password")
}

pub fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        username: model.username,
        nickname: model.nickname,
        email: model.email,
        role: model.role,
        has_payment_password: model.payment_password_hash.is_some(),
        created_at: model.created_at.into(),
    }
}
