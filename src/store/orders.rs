use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::{Expr, LockType},
};

use crate::entity::{
    orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    sea_orm_active_enums::OrderStatus,
};

/// Which side of the trade an order listing is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Buyer,
    Seller,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub buyer_id: i64,
    pub seller_id: i64,
    pub product_id: i64,
    pub price_at_purchase: i64,
    pub title: String,
    pub description: Option<String>,
    pub image_urls: Vec<String>,
}

pub async fn insert<C: ConnectionTrait>(conn: &C, order: NewOrder) -> Result<OrderModel, DbErr> {
    let image_urls = serde_json::to_string(&order.image_urls)
        .map_err(|err| DbErr::Custom(format!("encode image urls: {err}")))?;
    let now = Utc::now();

    OrderActive {
        id: NotSet,
        buyer_id: Set(order.buyer_id),
        seller_id: Set(order.seller_id),
        product_id: Set(order.product_id),
        price_at_purchase: Set(order.price_at_purchase),
        product_title_snapshot: Set(order.title),
        product_description_snapshot: Set(order.description),
        product_image_urls_snapshot: Set(image_urls),
        status: Set(OrderStatus::PendingPayment),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(conn)
    .await
}

pub async fn find_by_id<C: ConnectionTrait>(conn: &C, id: i64) -> Result<Option<OrderModel>, DbErr> {
    Orders::find_by_id(id)
        .filter(OrderCol::IsDeleted.eq(false))
        .one(conn)
        .await
}

/// Loads the given orders holding row locks until the surrounding transaction ends.
pub async fn find_many_for_update<C: ConnectionTrait>(
    conn: &C,
    ids: &[i64],
) -> Result<Vec<OrderModel>, DbErr> {
    Orders::find()
        .filter(OrderCol::Id.is_in(ids.iter().copied()))
        .filter(OrderCol::IsDeleted.eq(false))
        .order_by_asc(OrderCol::Id)
        .lock(LockType::Update)
        .all(conn)
        .await
}

/// `UPDATE trade_orders SET status = to WHERE id = ? AND status = from`.
///
/// Returns `false` when the row was not in `from` (or does not exist).
pub async fn transition<C: ConnectionTrait>(
    conn: &C,
    id: i64,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<bool, DbErr> {
    let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
    let result = Orders::update_many()
        .col_expr(OrderCol::Status, Expr::value(to))
        .col_expr(OrderCol::UpdatedAt, Expr::value(now))
        .filter(OrderCol::Id.eq(id))
        .filter(OrderCol::Status.eq(from))
        .filter(OrderCol::IsDeleted.eq(false))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

/// One page of a party's orders, newest first, plus the total count.
pub async fn list_by_party<C: ConnectionTrait>(
    conn: &C,
    party: Party,
    user_id: i64,
    limit: u64,
    offset: u64,
) -> Result<(Vec<OrderModel>, u64), DbErr> {
    let party_col = match party {
        Party::Buyer => OrderCol::BuyerId,
        Party::Seller => OrderCol::SellerId,
    };
    let finder = Orders::find()
        .filter(party_col.eq(user_id))
        .filter(OrderCol::IsDeleted.eq(false))
        .order_by_desc(OrderCol::CreatedAt)
        .order_by_desc(OrderCol::Id);

    let total = finder.clone().count(conn).await?;
    let orders = finder.limit(limit).offset(offset).all(conn).await?;
    Ok((orders, total))
}

pub fn decode_image_urls(model: &OrderModel) -> Vec<String> {
    serde_json::from_str(&model.product_image_urls_snapshot).unwrap_or_default()
}
