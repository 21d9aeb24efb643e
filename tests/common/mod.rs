#![allow(dead_code)]

use std::{str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use marketplace_trade::{
    config::{AppConfig, PaymentSettings},
    db::{create_orm_conn, run_migrations},
    entity::{
        orders::Model as OrderModel,
        payments::{ActiveModel as PaymentActive, Model as PaymentModel},
        products::ActiveModel as ProductActive,
        sea_orm_active_enums::ProductStatus,
        users::ActiveModel as UserActive,
    },
    error::{AppResult, ErrorCode},
    middleware::auth::AuthUser,
    services::auth_service::hash_secret,
    state::AppState,
    store,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, Set};

pub const JWT_SECRET: &str = "test-secret";
pub const PAYMENT_PASSWORD: &str = "123456";

pub async fn setup_state() -> anyhow::Result<AppState> {
    let database_url = "sqlite::memory:";
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    let config = AppConfig {
        database_url: database_url.into(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: JWT_SECRET.into(),
        payment: PaymentSettings::default(),
        reconciler_interval: Duration::from_secs(60),
        reconciler_enabled: false,
    };
    Ok(AppState::new(orm, config))
}

/// Inserts a user whose payment password is [`PAYMENT_PASSWORD`] unless `with_payment_password`
/// is false.
pub async fn create_user(
    state: &AppState,
    username: &str,
    role: &str,
    with_payment_password: bool,
) -> anyhow::Result<i64> {
    let payment_password_hash = if with_payment_password {
        Some(hash_secret(PAYMENT_PASSWORD).map_err(|e| anyhow::anyhow!(e.to_string()))?)
    } else {
        None
    };

    let user = UserActive {
        id: NotSet,
        username: Set(username.to_string()),
        nickname: Set(Some(format!("{username} nick"))),
        email: Set(format!("{username}@example.com")),
        password_hash: Set(hash_secret("password").map_err(|e| anyhow::anyhow!(e.to_string()))?),
        payment_password_hash: Set(payment_password_hash),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

pub async fn create_product(
    state: &AppState,
    seller_id: i64,
    title: &str,
    price: &str,
    status: ProductStatus,
) -> anyhow::Result<i64> {
    let now = Utc::now();
    let product = ProductActive {
        id: NotSet,
        seller_id: Set(seller_id),
        title: Set(title.to_string()),
        description: Set(Some(format!("{title} description"))),
        image_urls: Set(r#"["https://img.example.com/1.jpg"]"#.to_string()),
        price: Set(minor(price)),
        status: Set(status),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}

pub fn auth(user_id: i64) -> AuthUser {
    AuthUser {
        user_id,
        role: "user".into(),
    }
}

pub fn admin(user_id: i64) -> AuthUser {
    AuthUser {
        user_id,
        role: "admin".into(),
    }
}

pub fn dec(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}

pub fn minor(raw: &str) -> i64 {
    marketplace_trade::money::to_minor(dec(raw)).unwrap()
}

/// The error code of a failed call; panics if the call succeeded.
pub fn error_code<T>(result: AppResult<T>) -> ErrorCode {
    match result {
        Ok(_) => panic!("expected an error"),
        Err(err) => err.code(),
    }
}

pub async fn order(state: &AppState, id: i64) -> anyhow::Result<OrderModel> {
    store::orders::find_by_id(&state.orm, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("order {id} missing"))
}

pub async fn payment(state: &AppState, payment_id: &str) -> anyhow::Result<PaymentModel> {
    store::payments::find_by_payment_id(&state.orm, payment_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("payment {payment_id} missing"))
}

/// Moves a payment's deadline, e.g. into the past to simulate an abandoned checkout.
pub async fn set_expire_time(
    state: &AppState,
    payment_id: &str,
    expire_time: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mut active: PaymentActive = payment(state, payment_id).await?.into();
    active.expire_time = Set(expire_time.into());
    active.update(&state.orm).await?;
    Ok(())
}
