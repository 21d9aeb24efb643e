use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::OrderStatus;

/// One buyer/seller/product trade. Product fields and the price are copied at checkout and never
/// rewritten afterwards.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "trade_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub product_id: i64,
    /// Minor units (hundredths).
    pub price_at_purchase: i64,
    pub product_title_snapshot: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub product_description_snapshot: Option<String>,
    /// JSON array of image urls.
    #[sea_orm(column_type = "Text")]
    pub product_image_urls_snapshot: String,
    pub status: OrderStatus,
    pub is_deleted: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
