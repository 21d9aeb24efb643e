use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Payment;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub order_ids: Vec<i64>,
    #[schema(value_type = String, example = "99.99")]
    pub total_amount: Decimal,
    /// 1 alipay, 2 wechat pay, 3 bank card.
    pub payment_method: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    pub payment_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentList {
    pub items: Vec<Payment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TimeoutStatus {
    pub expired_pending_count: u64,
    pub running: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TimeoutOutcomeView {
    pub payment_id: String,
    /// `false` when the payment had already left PENDING.
    pub expired: bool,
}
