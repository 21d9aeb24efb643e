use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::entity::sea_orm_active_enums::{OrderStatus, PaymentMethod, PaymentStatus};

#[derive(Debug, Serialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub nickname: Option<String>,
    pub email: String,
    pub role: String,
    pub has_payment_password: bool,
    pub created_at: DateTime<Utc>,
}

/// Display fields of the other side of a trade.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PartyInfo {
    pub id: i64,
    pub username: Option<String>,
    pub nickname: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Order {
    pub id: i64,
    pub buyer: PartyInfo,
    pub seller: PartyInfo,
    pub product_id: i64,
    #[schema(value_type = String, example = "99.99")]
    pub price_at_purchase: Decimal,
    pub product_title: String,
    pub product_description: Option<String>,
    pub product_image_urls: Vec<String>,
    pub status: OrderStatus,
    pub status_text: String,
    pub review_eligible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Payment {
    pub payment_id: String,
    pub user_id: i64,
    pub order_ids: Vec<i64>,
    #[schema(value_type = String, example = "99.99")]
    pub payment_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_method_text: String,
    pub status: PaymentStatus,
    pub status_text: String,
    pub third_party_transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
    pub expire_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Refund {
    pub refund_id: String,
    pub order_id: i64,
    pub buyer_id: i64,
    #[schema(value_type = String, example = "99.99")]
    pub refund_amount: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}
