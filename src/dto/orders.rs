use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, Refund};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub product_ids: Vec<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedOrders {
    pub orders: Vec<Order>,
    /// What a payment for all of these orders must declare.
    #[schema(value_type = String, example = "99.99")]
    pub total_amount: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReturnRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProcessReturnRequest {
    pub approve: bool,
    pub reject_reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

/// Result of a seller's decision on a return request. `refund` is set only for an approval.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnDecision {
    pub order: Order,
    pub refund: Option<Refund>,
}
