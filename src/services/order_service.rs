use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    collaborators::{
        AuditEntry, Notification, ProductCatalog, audit::log_audit,
        notification::send_notification,
    },
    dto::orders::{
        CreateOrderRequest, CreatedOrders, OrderList, ProcessReturnRequest, ReturnDecision,
        ReturnRequest,
    },
    entity::{
        orders::{Column as OrderCol, Entity as Orders, Model as OrderModel},
        refunds::Model as RefundModel,
        sea_orm_active_enums::OrderStatus,
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult, ErrorCode},
    middleware::auth::AuthUser,
    models::{Order, PartyInfo, Refund},
    money,
    response::ApiResponse,
    routes::params::OrderListQuery,
    state::AppState,
    store::{
        self,
        orders::{NewOrder, Party},
        refunds::NewRefund,
    },
};

const MAX_REASON_CHARS: usize = 500;

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<CreatedOrders>> {
    if payload.product_ids.is_empty() {
        return Err(AppError::bad_request(
            ErrorCode::EmptyProductList,
            "at least one product must be selected",
        ));
    }
    let mut seen = HashSet::new();
    if !payload.product_ids.iter().all(|id| seen.insert(*id)) {
        return Err(AppError::invalid_params("product ids must be unique"));
    }

    // Validate the whole selection before writing anything.
    let mut selection = Vec::with_capacity(payload.product_ids.len());
    for product_id in &payload.product_ids {
        let product = state
            .catalog
            .find_product(*product_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(
                    ErrorCode::ProductNotFound,
                    format!("product {product_id} does not exist"),
                )
            })?;
        if product.seller_id == user.user_id {
            return Err(AppError::bad_request(
                ErrorCode::CantBuyOwnProduct,
                "you cannot buy your own listing",
            ));
        }
        if !product.is_on_sale() {
            return Err(AppError::bad_request(
                ErrorCode::ProductNotAvailable,
                format!("product {product_id} is not on sale"),
            ));
        }
        selection.push(product);
    }

    let txn = state.orm.begin().await?;
    let mut created = Vec::with_capacity(selection.len());
    for product in selection {
        // Another checkout may have taken the listing since it was read.
        if !state.catalog.hold_product(&txn, product.id).await? {
            txn.rollback().await?;
            tracing::info!(
                product_id = product.id,
                buyer_id = user.user_id,
                "product taken by another checkout"
            );
            return Err(AppError::bad_request(
                ErrorCode::ProductNotAvailable,
                format!("product {} is not on sale", product.id),
            ));
        }
        let order = store::orders::insert(
            &txn,
            NewOrder {
                buyer_id: user.user_id,
                seller_id: product.seller_id,
                product_id: product.id,
                price_at_purchase: product.price,
                title: product.title,
                description: product.description,
                image_urls: product.image_urls,
            },
        )
        .await?;
        created.push(order);
    }
    txn.commit().await?;

    let total_minor = money::sum_minor(created.iter().map(|o| o.price_at_purchase))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order total overflowed")))?;

    for order in &created {
        tracing::info!(
            order_id = order.id,
            buyer_id = order.buyer_id,
            seller_id = order.seller_id,
            product_id = order.product_id,
            "order created"
        );
        log_audit(
            state,
            AuditEntry::success(Some(user.user_id), "order_create", "order", order.id)
                .with_metadata(serde_json::json!({ "product_id": order.product_id })),
        );
        send_notification(
            state,
            Notification {
                recipient_id: order.seller_id,
                title: "New order".into(),
                content: format!(
                    "Your listing \"{}\" was ordered and is awaiting payment.",
                    order.product_title_snapshot
                ),
                source_order_id: Some(order.id),
            },
        );
    }

    let parties = load_parties(&state.orm, &created).await?;
    let orders = created
        .into_iter()
        .map(|order| order_from_entity(order, &parties))
        .collect();

    Ok(ApiResponse::ok(
        "Order created",
        CreatedOrders {
            orders,
            total_amount: money::to_decimal(total_minor),
        },
    ))
}

pub async fn get_order(state: &AppState, user: &AuthUser, id: i64) -> AppResult<ApiResponse<Order>> {
    let order = load_order(state, id).await?;
    if order.buyer_id != user.user_id && order.seller_id != user.user_id {
        return Err(AppError::permission_denied(
            ErrorCode::PermissionDenied,
            "you are not a party to this order",
        ));
    }

    let parties = load_parties(&state.orm, std::slice::from_ref(&order)).await?;
    Ok(ApiResponse::ok(
        "Ok",
        order_from_entity(order, &parties),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let party = query.party();
    let (page, limit, offset) = query.pagination().normalize();

    let (orders, total) =
        store::orders::list_by_party(&state.orm, party, user.user_id, limit as u64, offset as u64)
            .await?;

    let parties = load_parties(&state.orm, &orders).await?;
    let items = orders
        .into_iter()
        .map(|order| order_from_entity(order, &parties))
        .collect();

    Ok(ApiResponse::paged("Ok", OrderList { items }, page, limit, total))
}

pub async fn ship_order(state: &AppState, user: &AuthUser, id: i64) -> AppResult<ApiResponse<Order>> {
    let order = load_order(state, id).await?;
    require_party(&order, user, Party::Seller)?;
    let txn = state.orm.begin().await?;
    let order = apply_transition(
        &txn,
        order,
        OrderStatus::AwaitingShipment,
        OrderStatus::Shipped,
        "order cannot be shipped",
    )
    .await?;
    txn.commit().await?;

    log_audit(
        state,
        AuditEntry::success(Some(user.user_id), "order_ship", "order", order.id),
    );
    notify_counterparty(state, &order, order.buyer_id, "Order shipped", "has been shipped");

    order_response(state, order, "Order shipped").await
}

pub async fn confirm_receipt(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<Order>> {
    let order = load_order(state, id).await?;
    require_party(&order, user, Party::Buyer)?;
    let txn = state.orm.begin().await?;
    let order = apply_transition(
        &txn,
        order,
        OrderStatus::Shipped,
        OrderStatus::Completed,
        "receipt can only be confirmed for shipped orders",
    )
    .await?;
    if !state.catalog.mark_sold(&txn, order.product_id).await? {
        tracing::warn!(
            order_id = order.id,
            product_id = order.product_id,
            "product was not held by this order; not marked sold"
        );
    }
    txn.commit().await?;

    log_audit(
        state,
        AuditEntry::success(Some(user.user_id), "order_confirm_receipt", "order", order.id),
    );
    notify_counterparty(
        state,
        &order,
        order.seller_id,
        "Order completed",
        "was received by the buyer",
    );

    order_response(state, order, "Receipt confirmed").await
}

pub async fn apply_for_return(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: ReturnRequest,
) -> AppResult<ApiResponse<Order>> {
    let reason = validate_reason(&payload.reason, "return reason")?;

    let order = load_order(state, id).await?;
    require_party(&order, user, Party::Buyer)?;
    let txn = state.orm.begin().await?;
    let order = apply_transition(
        &txn,
        order,
        OrderStatus::Shipped,
        OrderStatus::ReturnRequested,
        "a return can only be requested for shipped orders",
    )
    .await?;
    txn.commit().await?;

    log_audit(
        state,
        AuditEntry::success(Some(user.user_id), "order_return_request", "order", order.id)
            .with_metadata(serde_json::json!({ "reason": reason })),
    );
    send_notification(
        state,
        Notification {
            recipient_id: order.seller_id,
            title: "Return requested".into(),
            content: format!(
                "The buyer asked to return \"{}\": {reason}",
                order.product_title_snapshot
            ),
            source_order_id: Some(order.id),
        },
    );

    order_response(state, order, "Return requested").await
}

/// Approves or rejects a pending return. An approval refunds `price_at_purchase` to the buyer in the
/// same transaction as RETURN_REQUESTED -> RETURNED.
pub async fn process_return_request(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: ProcessReturnRequest,
) -> AppResult<ApiResponse<ReturnDecision>> {
    let reject_reason = if payload.approve {
        None
    } else {
        let raw = payload.reject_reason.as_deref().unwrap_or_default();
        Some(validate_reason(raw, "reject reason")?)
    };

    let order = load_order(state, id).await?;
    require_party(&order, user, Party::Seller)?;

    let target = if payload.approve {
        OrderStatus::Returned
    } else {
        OrderStatus::Shipped
    };
    let txn = state.orm.begin().await?;
    let order = apply_transition(
        &txn,
        order,
        OrderStatus::ReturnRequested,
        target,
        "order has no pending return request",
    )
    .await?;
    let refund = if payload.approve {
        Some(refund_order(&txn, &order).await?)
    } else {
        None
    };
    txn.commit().await?;

    let (action, title, content) = match (&reject_reason, &refund) {
        (Some(reason), _) => (
            "order_return_reject",
            "Return rejected",
            format!(
                "Your return of \"{}\" was rejected: {reason}",
                order.product_title_snapshot
            ),
        ),
        (None, Some(refund)) => (
            "order_return_approve",
            "Return approved",
            format!(
                "Your return of \"{}\" was approved and {} was refunded.",
                order.product_title_snapshot,
                money::to_decimal(refund.amount)
            ),
        ),
        (None, None) => (
            "order_return_approve",
            "Return approved",
            format!(
                "Your return of \"{}\" was approved.",
                order.product_title_snapshot
            ),
        ),
    };
    let mut entry = AuditEntry::success(Some(user.user_id), action, "order", order.id);
    if let Some(refund) = &refund {
        entry = entry.with_metadata(serde_json::json!({ "refund_id": refund.refund_id }));
    }
    log_audit(state, entry);
    send_notification(
        state,
        Notification {
            recipient_id: order.buyer_id,
            title: title.into(),
            content,
            source_order_id: Some(order.id),
        },
    );

    let message = if payload.approve {
        "Return approved"
    } else {
        "Return rejected"
    };
    let parties = load_parties(&state.orm, std::slice::from_ref(&order)).await?;
    Ok(ApiResponse::ok(
        message,
        ReturnDecision {
            order: order_from_entity(order, &parties),
            refund: refund.map(refund_from_entity),
        },
    ))
}

async fn refund_order(txn: &DatabaseTransaction, order: &OrderModel) -> Result<RefundModel, DbErr> {
    let refund = store::refunds::insert(
        txn,
        NewRefund {
            refund_id: generate_refund_id(),
            order_id: order.id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            amount: order.price_at_purchase,
            reason: "return approved by seller".into(),
        },
    )
    .await?;
    tracing::info!(
        order_id = order.id,
        refund_id = %refund.refund_id,
        amount = %money::to_decimal(refund.amount),
        "refund recorded"
    );
    Ok(refund)
}

/// `REFUND_<unix millis>_<8 upper-case hex>`.
fn generate_refund_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "REFUND_{}_{}",
        Utc::now().timestamp_millis(),
        random[..8].to_uppercase()
    )
}

pub fn refund_from_entity(model: RefundModel) -> Refund {
    Refund {
        refund_id: model.refund_id,
        order_id: model.order_id,
        buyer_id: model.buyer_id,
        refund_amount: money::to_decimal(model.amount),
        reason: model.reason,
        created_at: model.created_at.into(),
    }
}

/// Outcome of moving every order bound to a payment.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Orders that were moved, as they were before the move.
    pub applied: Vec<OrderModel>,
    pub skipped: Vec<i64>,
}

/// PENDING_PAYMENT -> AWAITING_SHIPMENT for each order of a successful payment.
///
/// An order that is no longer awaiting payment is logged and skipped; the payment stays
/// successful.
pub async fn advance_after_payment<C: ConnectionTrait>(
    conn: &C,
    order_ids: &[i64],
    payment_id: &str,
) -> Result<BatchOutcome, DbErr> {
    let outcome = transition_batch(
        conn,
        order_ids,
        OrderStatus::PendingPayment,
        OrderStatus::AwaitingShipment,
    )
    .await?;
    for order_id in &outcome.skipped {
        tracing::warn!(
            order_id,
            payment_id,
            "order was not awaiting payment when its payment succeeded; skipped"
        );
    }
    Ok(outcome)
}

/// PENDING_PAYMENT -> CANCELLED for each order of a cancelled or expired payment, putting each
/// cancelled order's product back on sale.
pub async fn cancel_after_payment_failure(
    txn: &DatabaseTransaction,
    catalog: &dyn ProductCatalog,
    order_ids: &[i64],
    reason: &str,
) -> Result<BatchOutcome, DbErr> {
    let outcome = transition_batch(
        txn,
        order_ids,
        OrderStatus::PendingPayment,
        OrderStatus::Cancelled,
    )
    .await?;
    for order_id in &outcome.skipped {
        tracing::warn!(order_id, reason, "order was not awaiting payment; not cancelled");
    }
    for order in &outcome.applied {
        if !catalog.release_product(txn, order.product_id).await? {
            tracing::warn!(
                order_id = order.id,
                product_id = order.product_id,
                "product was not held by this order; left as is"
            );
        }
    }
    Ok(outcome)
}

async fn transition_batch<C: ConnectionTrait>(
    conn: &C,
    order_ids: &[i64],
    from: OrderStatus,
    to: OrderStatus,
) -> Result<BatchOutcome, DbErr> {
    let orders: HashMap<i64, OrderModel> = Orders::find()
        .filter(OrderCol::Id.is_in(order_ids.iter().copied()))
        .all(conn)
        .await?
        .into_iter()
        .map(|order| (order.id, order))
        .collect();

    let mut outcome = BatchOutcome::default();
    for order_id in order_ids {
        let Some(order) = orders.get(order_id) else {
            outcome.skipped.push(*order_id);
            continue;
        };
        if store::orders::transition(conn, *order_id, from, to).await? {
            outcome.applied.push(order.clone());
        } else {
            outcome.skipped.push(*order_id);
        }
    }
    Ok(outcome)
}

async fn load_order(state: &AppState, id: i64) -> AppResult<OrderModel> {
    store::orders::find_by_id(&state.orm, id)
        .await?
        .ok_or_else(|| AppError::not_found(ErrorCode::OrderNotFound, format!("order {id} not found")))
}

fn require_party(order: &OrderModel, user: &AuthUser, party: Party) -> AppResult<()> {
    let (expected, role) = match party {
        Party::Buyer => (order.buyer_id, "buyer"),
        Party::Seller => (order.seller_id, "seller"),
    };
    if expected != user.user_id {
        return Err(AppError::permission_denied(
            ErrorCode::PermissionDenied,
            format!("only the {role} of this order can do that"),
        ));
    }
    Ok(())
}

/// Checks the current status, then performs the conditional update inside `txn`. A lost race is
/// reported with the status the competing writer left behind.
async fn apply_transition(
    txn: &DatabaseTransaction,
    order: OrderModel,
    from: OrderStatus,
    to: OrderStatus,
    message: &str,
) -> AppResult<OrderModel> {
    if order.status != from {
        return Err(invalid_order_state(message, order.status, from));
    }

    if !store::orders::transition(txn, order.id, from, to).await? {
        let current = store::orders::find_by_id(txn, order.id)
            .await?
            .map(|o| o.status)
            .unwrap_or(order.status);
        tracing::warn!(order_id = order.id, %from, %to, %current, "order transition lost a race");
        return Err(invalid_order_state(message, current, from));
    }

    tracing::info!(order_id = order.id, %from, %to, "order status changed");
    store::orders::find_by_id(txn, order.id)
        .await?
        .ok_or_else(|| AppError::not_found(ErrorCode::OrderNotFound, format!("order {} not found", order.id)))
}

fn invalid_order_state(message: &str, current: OrderStatus, expected: OrderStatus) -> AppError {
    AppError::InvalidState {
        code: ErrorCode::InvalidOrderState,
        message: message.to_string(),
        current: current.to_string(),
        expected: expected.to_string(),
    }
}

fn validate_reason(raw: &str, field: &str) -> AppResult<String> {
    let reason = raw.trim();
    if reason.is_empty() {
        return Err(AppError::invalid_params(format!("{field} is required")));
    }
    if reason.chars().count() > MAX_REASON_CHARS {
        return Err(AppError::invalid_params(format!(
            "{field} must be at most {MAX_REASON_CHARS} characters"
        )));
    }
    Ok(reason.to_string())
}

fn notify_counterparty(
    state: &AppState,
    order: &OrderModel,
    recipient_id: i64,
    title: &str,
    event: &str,
) {
    send_notification(
        state,
        Notification {
            recipient_id,
            title: title.to_string(),
            content: format!("Order for \"{}\" {event}.", order.product_title_snapshot),
            source_order_id: Some(order.id),
        },
    );
}

async fn order_response(
    state: &AppState,
    order: OrderModel,
    message: &str,
) -> AppResult<ApiResponse<Order>> {
    let parties = load_parties(&state.orm, std::slice::from_ref(&order)).await?;
    Ok(ApiResponse::ok(
        message,
        order_from_entity(order, &parties),
    ))
}

async fn load_parties<C: ConnectionTrait>(
    conn: &C,
    orders: &[OrderModel],
) -> Result<HashMap<i64, PartyInfo>, DbErr> {
    let ids: HashSet<i64> = orders
        .iter()
        .flat_map(|order| [order.buyer_id, order.seller_id])
        .collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let users = Users::find()
        .filter(UserCol::Id.is_in(ids))
        .all(conn)
        .await?;
    Ok(users
        .into_iter()
        .map(|user| {
            (
                user.id,
                PartyInfo {
                    id: user.id,
                    username: Some(user.username),
                    nickname: user.nickname,
                },
            )
        })
        .collect())
}

fn party(parties: &HashMap<i64, PartyInfo>, id: i64) -> PartyInfo {
    parties.get(&id).cloned().unwrap_or(PartyInfo {
        id,
        username: None,
        nickname: None,
    })
}

pub fn order_from_entity(model: OrderModel, parties: &HashMap<i64, PartyInfo>) -> Order {
    let image_urls = store::orders::decode_image_urls(&model);
    Order {
        id: model.id,
        buyer: party(parties, model.buyer_id),
        seller: party(parties, model.seller_id),
        product_id: model.product_id,
        price_at_purchase: money::to_decimal(model.price_at_purchase),
        product_title: model.product_title_snapshot,
        product_description: model.product_description_snapshot,
        product_image_urls: image_urls,
        status: model.status,
        status_text: model.status.label().to_string(),
        review_eligible: model.status.is_review_eligible(),
        created_at: model.created_at.into(),
        updated_at: model.updated_at.into(),
    }
}
