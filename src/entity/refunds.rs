use sea_orm::entity::prelude::*;

/// Money returned to the buyer when a return is approved.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "refunds")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub refund_id: String,
    #[sea_orm(unique)]
    pub order_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    /// Minor units; always the order's `price_at_purchase`.
    pub amount: i64,
    pub reason: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
