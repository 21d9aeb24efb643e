use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, Set,
};

use crate::entity::refunds::{
    ActiveModel as RefundActive, Column as RefundCol, Entity as Refunds, Model as RefundModel,
};

#[derive(Debug, Clone)]
pub struct NewRefund {
    pub refund_id: String,
    pub order_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub amount: i64,
    pub reason: String,
}

/// Fails on a second refund for the same order (unique `order_id`).
pub async fn insert<C: ConnectionTrait>(conn: &C, refund: NewRefund) -> Result<RefundModel, DbErr> {
    RefundActive {
        id: NotSet,
        refund_id: Set(refund.refund_id),
        order_id: Set(refund.order_id),
        buyer_id: Set(refund.buyer_id),
        seller_id: Set(refund.seller_id),
        amount: Set(refund.amount),
        reason: Set(refund.reason),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await
}

pub async fn find_by_order_id<C: ConnectionTrait>(
    conn: &C,
    order_id: i64,
) -> Result<Option<RefundModel>, DbErr> {
    Refunds::find()
        .filter(RefundCol::OrderId.eq(order_id))
        .one(conn)
        .await
}
