use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::{PaymentMethod, PaymentStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Business id shown to clients.
    #[sea_orm(unique)]
    pub payment_id: String,
    pub user_id: i64,
    /// JSON array of `trade_orders.id`; there is no foreign key.
    #[sea_orm(column_type = "Text")]
    pub order_ids: String,
    /// Minor units (hundredths).
    pub payment_amount: i64,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub third_party_transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub payment_time: Option<DateTimeWithTimeZone>,
    pub expire_time: DateTimeWithTimeZone,
    pub is_deleted: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
