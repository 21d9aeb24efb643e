use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, prelude::DateTimeWithTimeZone,
    sea_query::Expr,
};

use crate::entity::{
    payments::{
        ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments,
        Model as PaymentModel,
    },
    sea_orm_active_enums::{PaymentMethod, PaymentStatus},
};

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payment_id: String,
    pub user_id: i64,
    pub order_ids: Vec<i64>,
    pub amount: i64,
    pub method: PaymentMethod,
    pub expire_time: DateTime<Utc>,
}

/// Columns written alongside a status change. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct PaymentChanges {
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
}

pub async fn insert<C: ConnectionTrait>(
    conn: &C,
    payment: NewPayment,
) -> Result<PaymentModel, DbErr> {
    let order_ids = encode_order_ids(&payment.order_ids)?;
    let now = Utc::now();

    PaymentActive {
        id: NotSet,
        payment_id: Set(payment.payment_id),
        user_id: Set(payment.user_id),
        order_ids: Set(order_ids),
        payment_amount: Set(payment.amount),
        payment_method: Set(payment.method),
        status: Set(PaymentStatus::Pending),
        third_party_transaction_id: Set(None),
        failure_reason: Set(None),
        payment_time: Set(None),
        expire_time: Set(payment.expire_time.into()),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(conn)
    .await
}

pub async fn find_by_payment_id<C: ConnectionTrait>(
    conn: &C,
    payment_id: &str,
) -> Result<Option<PaymentModel>, DbErr> {
    Payments::find()
        .filter(PaymentCol::PaymentId.eq(payment_id))
        .filter(PaymentCol::IsDeleted.eq(false))
        .one(conn)
        .await
}

/// Compare-and-swap on the payment status; `true` when this call moved the row.
pub async fn transition<C: ConnectionTrait>(
    conn: &C,
    id: i64,
    from: PaymentStatus,
    to: PaymentStatus,
    changes: PaymentChanges,
) -> Result<bool, DbErr> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut update = Payments::update_many()
        .col_expr(PaymentCol::Status, Expr::value(to))
        .col_expr(PaymentCol::UpdatedAt, Expr::value(now));
    if let Some(transaction_id) = changes.transaction_id {
        update = update.col_expr(PaymentCol::ThirdPartyTransactionId, Expr::value(transaction_id));
    }
    if let Some(reason) = changes.failure_reason {
        update = update.col_expr(PaymentCol::FailureReason, Expr::value(reason));
    }
    if let Some(paid_at) = changes.payment_time {
        let paid_at: DateTimeWithTimeZone = paid_at.into();
        update = update.col_expr(PaymentCol::PaymentTime, Expr::value(paid_at));
    }

    let result = update
        .filter(PaymentCol::Id.eq(id))
        .filter(PaymentCol::Status.eq(from))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

pub async fn list_by_user<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
    limit: u64,
    offset: u64,
) -> Result<(Vec<PaymentModel>, u64), DbErr> {
    let finder = Payments::find()
        .filter(PaymentCol::UserId.eq(user_id))
        .filter(PaymentCol::IsDeleted.eq(false))
        .order_by_desc(PaymentCol::CreatedAt)
        .order_by_desc(PaymentCol::Id);

    let total = finder.clone().count(conn).await?;
    let payments = finder.limit(limit).offset(offset).all(conn).await?;
    Ok((payments, total))
}

/// All of a user's payments, newest first.
pub async fn list_all_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
) -> Result<Vec<PaymentModel>, DbErr> {
    Payments::find()
        .filter(PaymentCol::UserId.eq(user_id))
        .filter(PaymentCol::IsDeleted.eq(false))
        .order_by_desc(PaymentCol::CreatedAt)
        .order_by_desc(PaymentCol::Id)
        .all(conn)
        .await
}

pub async fn list_pending_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
) -> Result<Vec<PaymentModel>, DbErr> {
    Payments::find()
        .filter(PaymentCol::UserId.eq(user_id))
        .filter(PaymentCol::Status.eq(PaymentStatus::Pending))
        .filter(PaymentCol::IsDeleted.eq(false))
        .all(conn)
        .await
}

/// Pending payments whose `expire_time` is before `now`, oldest deadline first.
pub async fn list_expired_pending<C: ConnectionTrait>(
    conn: &C,
    now: DateTime<Utc>,
) -> Result<Vec<PaymentModel>, DbErr> {
    let now: DateTimeWithTimeZone = now.into();
    Payments::find()
        .filter(PaymentCol::Status.eq(PaymentStatus::Pending))
        .filter(PaymentCol::ExpireTime.lt(now))
        .filter(PaymentCol::IsDeleted.eq(false))
        .order_by_asc(PaymentCol::ExpireTime)
        .all(conn)
        .await
}

pub async fn count_expired_pending<C: ConnectionTrait>(
    conn: &C,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let now: DateTimeWithTimeZone = now.into();
    Payments::find()
        .filter(PaymentCol::Status.eq(PaymentStatus::Pending))
        .filter(PaymentCol::ExpireTime.lt(now))
        .filter(PaymentCol::IsDeleted.eq(false))
        .count(conn)
        .await
}

pub fn encode_order_ids(order_ids: &[i64]) -> Result<String, DbErr> {
    serde_json::to_string(order_ids).map_err(|err| DbErr::Custom(format!("encode order ids: {err}")))
}

pub fn decode_order_ids(model: &PaymentModel) -> Result<Vec<i64>, DbErr> {
    serde_json::from_str(&model.order_ids).map_err(|err| {
        DbErr::Custom(format!(
            "payment {} has unreadable order ids: {err}",
            model.payment_id
        ))
    })
}
