use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::TransactionTrait;
use uuid::Uuid;

use crate::{
    collaborators::{
        AuditEntry, Notification, audit::log_audit, notification::send_notification,
    },
    dto::payments::{
        ConfirmPaymentRequest, CreatePaymentRequest, PaymentList, TimeoutOutcomeView,
        TimeoutStatus,
    },
    entity::{
        payments::Model as PaymentModel,
        sea_orm_active_enums::{OrderStatus, PaymentMethod, PaymentStatus},
    },
    error::{AppError, AppResult, ErrorCode},
    middleware::auth::{AuthUser, ensure_admin},
    models::Payment,
    money,
    response::ApiResponse,
    routes::params::Pagination,
    services::{auth_service, order_service},
    state::AppState,
    store::{
        self,
        payments::{NewPayment, PaymentChanges},
    },
};

const REASON_WRONG_PASSWORD: &str = "payment password incorrect";
const REASON_CANCELLED: &str = "cancelled by buyer";
const REASON_TIMEOUT: &str = "payment timed out";

/// Result of trying to expire one payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutOutcome {
    Expired {
        cancelled_orders: usize,
        skipped_orders: usize,
    },
    /// The payment had already reached this terminal status.
    Skipped(PaymentStatus),
}

pub async fn create_payment(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    let CreatePaymentRequest {
        order_ids,
        total_amount,
        payment_method,
    } = payload;

    if order_ids.is_empty() {
        return Err(AppError::bad_request(
            ErrorCode::EmptyOrderList,
            "at least one order is required",
        ));
    }
    let mut seen = HashSet::new();
    if !order_ids.iter().all(|id| seen.insert(*id)) {
        return Err(AppError::invalid_params("order ids must be unique"));
    }
    if total_amount <= Decimal::ZERO {
        return Err(AppError::bad_request(
            ErrorCode::InvalidAmount,
            "payment amount must be positive",
        ));
    }
    let method = PaymentMethod::from_code(payment_method).ok_or_else(|| {
        AppError::bad_request(
            ErrorCode::InvalidPaymentMethod,
            format!("unsupported payment method {payment_method}"),
        )
    })?;

    let txn = state.orm.begin().await?;

    let orders: HashMap<i64, _> = store::orders::find_many_for_update(&txn, &order_ids)
        .await?
        .into_iter()
        .map(|order| (order.id, order))
        .collect();

    let mut prices = Vec::with_capacity(order_ids.len());
    for order_id in &order_ids {
        let order = orders.get(order_id).ok_or_else(|| {
            AppError::not_found(ErrorCode::OrderNotFound, format!("order {order_id} not found"))
        })?;
        if order.buyer_id != user.user_id {
            return Err(AppError::permission_denied(
                ErrorCode::OrderPermissionDenied,
                format!("order {order_id} does not belong to you"),
            ));
        }
        if order.status != OrderStatus::PendingPayment {
            return Err(AppError::InvalidState {
                code: ErrorCode::OrderStatusInvalid,
                message: format!("order {order_id} is not awaiting payment"),
                current: order.status.to_string(),
                expected: OrderStatus::PendingPayment.to_string(),
            });
        }
        prices.push(order.price_at_purchase);
    }

    for pending in store::payments::list_pending_for_user(&txn, user.user_id).await? {
        let bound = store::payments::decode_order_ids(&pending)?;
        if let Some(order_id) = order_ids.iter().find(|id| bound.contains(id)) {
            return Err(AppError::conflict(
                ErrorCode::OrderAlreadyBound,
                format!(
                    "order {order_id} is already bound to pending payment {}",
                    pending.payment_id
                ),
            ));
        }
    }

    let expected = money::sum_minor(prices)
        .ok_or_else(|| AppError::bad_request(ErrorCode::InvalidAmount, "order total overflowed"))?;
    if money::to_minor(total_amount) != Some(expected) {
        tracing::warn!(
            user_id = user.user_id,
            declared = %total_amount,
            expected = %money::to_decimal(expected),
            "payment amount does not match orders"
        );
        return Err(AppError::conflict(
            ErrorCode::OrderAmountMismatch,
            format!(
                "declared amount {total_amount} does not match order total {}",
                money::to_decimal(expected)
            ),
        ));
    }

    let expire_time = Utc::now() + state.config.payment.expire_after;
    let payment = store::payments::insert(
        &txn,
        NewPayment {
            payment_id: generate_business_id("PAY"),
            user_id: user.user_id,
            order_ids: order_ids.clone(),
            amount: expected,
            method,
            expire_time,
        },
    )
    .await?;
    txn.commit().await?;

    tracing::info!(
        payment_id = %payment.payment_id,
        user_id = user.user_id,
        amount = %money::to_decimal(payment.payment_amount),
        order_count = order_ids.len(),
        "payment created"
    );
    log_audit(
        state,
        AuditEntry::success(
            Some(user.user_id),
            "payment_create",
            "payment",
            &payment.payment_id,
        )
        .with_metadata(serde_json::json!({ "order_ids": order_ids })),
    );

    Ok(ApiResponse::ok(
        "Payment created",
        payment_from_entity(payment)?,
    ))
}

/// Confirms a pending payment with the payer's payment password.
pub async fn process_payment(
    state: &AppState,
    user: &AuthUser,
    payment_id: &str,
    payload: ConfirmPaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    if payload.payment_password.trim().is_empty() {
        return Err(AppError::bad_request(
            ErrorCode::InvalidPaymentPassword,
            "payment password is required",
        ));
    }

    let payment = load_owned_payment(state, user, payment_id).await?;
    confirm_loaded(state, user, payment, &payload.payment_password).await
}

/// Everything in [`process_payment`] after the payment has been read. Each write is conditional on
/// PENDING, so a snapshot that went stale in the meantime ends in `PAYMENT_ALREADY_PROCESSED`.
async fn confirm_loaded(
    state: &AppState,
    user: &AuthUser,
    payment: PaymentModel,
    credential: &str,
) -> AppResult<ApiResponse<Payment>> {
    let payment_id = payment.payment_id.as_str();
    if payment.status != PaymentStatus::Pending {
        return Err(already_finalized(payment_id, payment.status));
    }

    if payment.expire_time < Utc::now() {
        tracing::info!(payment_id, "payment confirmed after its deadline; expiring it");
        return match expire_loaded(state, &payment).await? {
            TimeoutOutcome::Expired { .. } => Err(AppError::bad_request(
                ErrorCode::PaymentTimeout,
                "payment has timed out",
            )),
            TimeoutOutcome::Skipped(status) => Err(already_finalized(payment_id, status)),
        };
    }

    if !auth_service::verify_payment_password(state, user.user_id, credential).await? {
        let failed = store::payments::transition(
            &state.orm,
            payment.id,
            PaymentStatus::Pending,
            PaymentStatus::Failed,
            PaymentChanges {
                failure_reason: Some(REASON_WRONG_PASSWORD.into()),
                ..Default::default()
            },
        )
        .await?;
        if !failed {
            return Err(current_finalized(state, payment_id).await);
        }

        tracing::info!(payment_id, user_id = user.user_id, "payment failed: wrong password");
        log_audit(
            state,
            AuditEntry {
                outcome: "failure",
                ..AuditEntry::success(Some(user.user_id), "payment_confirm", "payment", payment_id)
            }
            .with_metadata(serde_json::json!({ "reason": REASON_WRONG_PASSWORD })),
        );
        return Err(AppError::conflict(
            ErrorCode::PaymentPasswordError,
            "payment password is incorrect",
        ));
    }

    let order_ids = store::payments::decode_order_ids(&payment)?;
    let txn = state.orm.begin().await?;
    let applied = store::payments::transition(
        &txn,
        payment.id,
        PaymentStatus::Pending,
        PaymentStatus::Success,
        PaymentChanges {
            transaction_id: Some(generate_business_id("TXN")),
            payment_time: Some(Utc::now()),
            ..Default::default()
        },
    )
    .await?;
    if !applied {
        txn.rollback().await?;
        return Err(current_finalized(state, payment_id).await);
    }
    let outcome = order_service::advance_after_payment(&txn, &order_ids, payment_id).await?;
    txn.commit().await?;

    tracing::info!(
        payment_id,
        user_id = user.user_id,
        advanced = outcome.applied.len(),
        skipped = outcome.skipped.len(),
        "payment succeeded"
    );
    log_audit(
        state,
        AuditEntry::success(Some(user.user_id), "payment_confirm", "payment", payment_id)
            .with_metadata(serde_json::json!({ "skipped_orders": outcome.skipped })),
    );
    for order in &outcome.applied {
        send_notification(
            state,
            Notification {
                recipient_id: order.seller_id,
                title: "Order paid".into(),
                content: format!(
                    "\"{}\" has been paid and is waiting to be shipped.",
                    order.product_title_snapshot
                ),
                source_order_id: Some(order.id),
            },
        );
    }

    payment_response(state, payment_id, "Payment succeeded").await
}

pub async fn cancel_payment(
    state: &AppState,
    user: &AuthUser,
    payment_id: &str,
) -> AppResult<ApiResponse<Payment>> {
    let payment = load_owned_payment(state, user, payment_id).await?;
    if payment.status != PaymentStatus::Pending {
        return Err(already_finalized(&payment.payment_id, payment.status));
    }

    let Some(outcome) =
        finalize_and_cancel_orders(state, &payment, PaymentStatus::Cancelled, REASON_CANCELLED)
            .await?
    else {
        return Err(current_finalized(state, payment_id).await);
    };

    tracing::info!(
        payment_id,
        user_id = user.user_id,
        cancelled_orders = outcome.cancelled,
        skipped_orders = outcome.skipped,
        "payment cancelled"
    );
    log_audit(
        state,
        AuditEntry::success(Some(user.user_id), "payment_cancel", "payment", payment_id),
    );

    payment_response(state, payment_id, "Payment cancelled").await
}

/// PENDING -> EXPIRED for one payment, cancelling its orders.
///
/// Losing the race against a confirmation or cancellation is not an error: the payment is reported
/// as skipped with the status the other writer left.
pub async fn handle_payment_timeout(
    state: &AppState,
    payment_id: &str,
) -> AppResult<TimeoutOutcome> {
    let payment = store::payments::find_by_payment_id(&state.orm, payment_id)
        .await?
        .ok_or_else(payment_not_found)?;
    expire_loaded(state, &payment).await
}

async fn expire_loaded(state: &AppState, payment: &PaymentModel) -> AppResult<TimeoutOutcome> {
    let payment_id = payment.payment_id.as_str();
    if payment.status != PaymentStatus::Pending {
        tracing::debug!(payment_id, status = %payment.status, "payment already finalized; timeout skipped");
        return Ok(TimeoutOutcome::Skipped(payment.status));
    }

    let Some(outcome) =
        finalize_and_cancel_orders(state, payment, PaymentStatus::Expired, REASON_TIMEOUT).await?
    else {
        let status = store::payments::find_by_payment_id(&state.orm, payment_id)
            .await?
            .map(|p| p.status)
            .unwrap_or(payment.status);
        tracing::info!(payment_id, %status, "payment finalized concurrently; timeout skipped");
        return Ok(TimeoutOutcome::Skipped(status));
    };

    tracing::info!(
        payment_id,
        user_id = payment.user_id,
        cancelled_orders = outcome.cancelled,
        skipped_orders = outcome.skipped,
        "payment expired"
    );
    log_audit(
        state,
        AuditEntry::success(None, "payment_timeout", "payment", payment_id),
    );

    Ok(TimeoutOutcome::Expired {
        cancelled_orders: outcome.cancelled,
        skipped_orders: outcome.skipped,
    })
}

pub async fn get_payment_status(
    state: &AppState,
    user: &AuthUser,
    payment_id: &str,
) -> AppResult<ApiResponse<Payment>> {
    let payment = load_owned_payment(state, user, payment_id).await?;
    Ok(ApiResponse::ok(
        "Ok",
        payment_from_entity(payment)?,
    ))
}

pub async fn list_payments(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<PaymentList>> {
    let (page, limit, offset) = pagination.normalize();
    let (payments, total) =
        store::payments::list_by_user(&state.orm, user.user_id, limit as u64, offset as u64)
            .await?;

    let items = payments
        .into_iter()
        .map(payment_from_entity)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ApiResponse::paged("Ok", PaymentList { items }, page, limit, total))
}

/// The caller's most recent payment that covers every one of `order_ids`.
pub async fn get_payment_by_order_ids(
    state: &AppState,
    user: &AuthUser,
    order_ids: Vec<i64>,
) -> AppResult<ApiResponse<Payment>> {
    if order_ids.is_empty() {
        return Err(AppError::bad_request(
            ErrorCode::EmptyOrderList,
            "at least one order is required",
        ));
    }

    for payment in store::payments::list_all_for_user(&state.orm, user.user_id).await? {
        let bound = store::payments::decode_order_ids(&payment)?;
        if order_ids.iter().all(|id| bound.contains(id)) {
            return Ok(ApiResponse::ok(
                "Ok",
                payment_from_entity(payment)?,
            ));
        }
    }
    Err(payment_not_found())
}

pub async fn timeout_status(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<TimeoutStatus>> {
    ensure_admin(user)?;
    let expired_pending_count =
        store::payments::count_expired_pending(&state.orm, Utc::now()).await?;
    Ok(ApiResponse::ok(
        "Ok",
        TimeoutStatus {
            expired_pending_count,
            running: state.reconciler.is_running(),
        },
    ))
}

/// Administrative trigger for [`handle_payment_timeout`].
pub async fn expire_payment(
    state: &AppState,
    user: &AuthUser,
    payment_id: &str,
) -> AppResult<ApiResponse<TimeoutOutcomeView>> {
    ensure_admin(user)?;
    let outcome = handle_payment_timeout(state, payment_id).await?;
    log_audit(
        state,
        AuditEntry::success(Some(user.user_id), "payment_force_expire", "payment", payment_id),
    );

    let (message, expired) = match outcome {
        TimeoutOutcome::Expired { .. } => ("Payment expired", true),
        TimeoutOutcome::Skipped(_) => ("Payment was already finalized", false),
    };
    Ok(ApiResponse::ok(
        message,
        TimeoutOutcomeView {
            payment_id: payment_id.to_string(),
            expired,
        },
    ))
}

struct CancelSummary {
    cancelled: usize,
    skipped: usize,
}

/// Moves a pending payment to `to` and cancels its orders in one transaction. `None` when the
/// payment was no longer pending.
async fn finalize_and_cancel_orders(
    state: &AppState,
    payment: &PaymentModel,
    to: PaymentStatus,
    reason: &str,
) -> AppResult<Option<CancelSummary>> {
    let order_ids = store::payments::decode_order_ids(payment)?;

    let txn = state.orm.begin().await?;
    let applied = store::payments::transition(
        &txn,
        payment.id,
        PaymentStatus::Pending,
        to,
        PaymentChanges {
            failure_reason: Some(reason.to_string()),
            ..Default::default()
        },
    )
    .await?;
    if !applied {
        txn.rollback().await?;
        return Ok(None);
    }
    let outcome = order_service::cancel_after_payment_failure(
        &txn,
        state.catalog.as_ref(),
        &order_ids,
        reason,
    )
    .await?;
    txn.commit().await?;

    for order in &outcome.applied {
        send_notification(
            state,
            Notification {
                recipient_id: order.buyer_id,
                title: "Order cancelled".into(),
                content: format!(
                    "Your order for \"{}\" was cancelled: {reason}.",
                    order.product_title_snapshot
                ),
                source_order_id: Some(order.id),
            },
        );
    }

    Ok(Some(CancelSummary {
        cancelled: outcome.applied.len(),
        skipped: outcome.skipped.len(),
    }))
}

/// Someone else's payment is reported exactly like a missing one.
async fn load_owned_payment(
    state: &AppState,
    user: &AuthUser,
    payment_id: &str,
) -> AppResult<PaymentModel> {
    match store::payments::find_by_payment_id(&state.orm, payment_id).await? {
        Some(payment) if payment.user_id == user.user_id => Ok(payment),
        Some(_) => {
            tracing::warn!(payment_id, user_id = user.user_id, "payment accessed by non-owner");
            Err(payment_not_found())
        }
        None => Err(payment_not_found()),
    }
}

async fn payment_response(
    state: &AppState,
    payment_id: &str,
    message: &str,
) -> AppResult<ApiResponse<Payment>> {
    let payment = store::payments::find_by_payment_id(&state.orm, payment_id)
        .await?
        .ok_or_else(payment_not_found)?;
    Ok(ApiResponse::ok(
        message,
        payment_from_entity(payment)?,
    ))
}

/// Error for a conditional update that matched nothing, naming the status that won.
async fn current_finalized(state: &AppState, payment_id: &str) -> AppError {
    match store::payments::find_by_payment_id(&state.orm, payment_id).await {
        Ok(Some(payment)) => {
            tracing::info!(payment_id, status = %payment.status, "payment finalized concurrently");
            already_finalized(payment_id, payment.status)
        }
        Ok(None) => payment_not_found(),
        Err(err) => err.into(),
    }
}

fn already_finalized(payment_id: &str, status: PaymentStatus) -> AppError {
    AppError::AlreadyFinalized {
        payment_id: payment_id.to_string(),
        status: status.to_string(),
    }
}

fn payment_not_found() -> AppError {
    AppError::not_found(ErrorCode::PaymentNotFound, "payment not found")
}

/// `<prefix><unix millis><8 upper-case hex>`, e.g. `PAY1717243200000A1B2C3D4`.
pub fn generate_business_id(prefix: &str) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{prefix}{}{}",
        Utc::now().timestamp_millis(),
        random[..8].to_uppercase()
    )
}

pub fn payment_from_entity(model: PaymentModel) -> Result<Payment, sea_orm::DbErr> {
    let order_ids = store::payments::decode_order_ids(&model)?;
    Ok(Payment {
        payment_id: model.payment_id,
        user_id: model.user_id,
        order_ids,
        payment_amount: money::to_decimal(model.payment_amount),
        payment_method: model.payment_method,
        payment_method_text: model.payment_method.label().to_string(),
        status: model.status,
        status_text: model.status.label().to_string(),
        third_party_transaction_id: model.third_party_transaction_id,
        failure_reason: model.failure_reason,
        payment_time: model.payment_time.map(Into::into),
        expire_time: model.expire_time.into(),
        created_at: model.created_at.into(),
    })
}
