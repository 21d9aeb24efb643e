mod common;

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use common::{
    admin, auth, create_product, create_user, dec, error_code, order, payment, set_expire_time,
    setup_state, PAYMENT_PASSWORD,
};
use marketplace_trade::{
    dto::{
        orders::CreateOrderRequest,
        payments::{ConfirmPaymentRequest, CreatePaymentRequest},
    },
    entity::sea_orm_active_enums::{OrderStatus, PaymentStatus, ProductStatus},
    error::ErrorCode,
    middleware::auth::AuthUser,
    reconciler::{PaymentReconciler, SweepReport, sweep_expired_payments},
    services::{order_service, payment_service, payment_service::TimeoutOutcome},
    state::AppState,
};

/// A pending payment over one fresh order; returns `(payment_id, order_id)`.
async fn pending_payment(
    state: &AppState,
    buyer: &AuthUser,
    seller_id: i64,
    title: &str,
) -> anyhow::Result<(String, i64)> {
    let product_id = create_product(state, seller_id, title, "10.00", ProductStatus::OnSale).await?;
    let order_id = order_service::create_order(
        state,
        buyer,
        CreateOrderRequest {
            product_ids: vec![product_id],
        },
    )
    .await?
    .data
    .unwrap()
    .orders[0]
        .id;
    let payment = payment_service::create_payment(
        state,
        buyer,
        CreatePaymentRequest {
            order_ids: vec![order_id],
            total_amount: dec("10.00"),
            payment_method: 3,
        },
    )
    .await?
    .data
    .unwrap();
    Ok((payment.payment_id, order_id))
}

#[tokio::test]
async fn sweep_expires_only_overdue_payments_and_is_idempotent() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let seller_id = create_user(&state, "seller", "user", false).await?;
    let buyer_id = create_user(&state, "buyer", "user", true).await?;
    let buyer = auth(buyer_id);

    let (overdue, overdue_order) = pending_payment(&state, &buyer, seller_id, "Old").await?;
    let (fresh, fresh_order) = pending_payment(&state, &buyer, seller_id, "New").await?;
    set_expire_time(&state, &overdue, Utc::now() - Duration::minutes(5)).await?;

    let report = sweep_expired_payments(&state).await?;
    assert_eq!(
        report,
        SweepReport {
            scanned: 1,
            expired: 1,
            skipped: 0,
            failed: 0,
        }
    );

    let expired = payment(&state, &overdue).await?;
    assert_eq!(expired.status, PaymentStatus::Expired);
    assert!(expired.failure_reason.is_some());
    assert_eq!(order(&state, overdue_order).await?.status, OrderStatus::Cancelled);
    assert_eq!(payment(&state, &fresh).await?.status, PaymentStatus::Pending);
    assert_eq!(order(&state, fresh_order).await?.status, OrderStatus::PendingPayment);

    let again = sweep_expired_payments(&state).await?;
    assert_eq!(again, SweepReport::default());
    Ok(())
}

#[tokio::test]
async fn timeout_skips_payments_that_are_already_final() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let seller_id = create_user(&state, "seller", "user", false).await?;
    let buyer_id = create_user(&state, "buyer", "user", true).await?;
    let buyer = auth(buyer_id);

    let (payment_id, order_id) = pending_payment(&state, &buyer, seller_id, "Radio").await?;
    payment_service::process_payment(
        &state,
        &buyer,
        &payment_id,
        ConfirmPaymentRequest {
            payment_password: PAYMENT_PASSWORD.into(),
        },
    )
    .await?;

    let outcome = payment_service::handle_payment_timeout(&state, &payment_id).await?;
    assert_eq!(outcome, TimeoutOutcome::Skipped(PaymentStatus::Success));
    assert_eq!(order(&state, order_id).await?.status, OrderStatus::AwaitingShipment);

    assert_eq!(
        error_code(payment_service::handle_payment_timeout(&state, "PAY-unknown").await),
        ErrorCode::PaymentNotFound
    );
    Ok(())
}

#[tokio::test]
async fn confirmation_and_timeout_race_has_one_winner() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let seller_id = create_user(&state, "seller", "user", false).await?;
    let buyer_id = create_user(&state, "buyer", "user", true).await?;
    let buyer = auth(buyer_id);

    let (payment_id, order_id) = pending_payment(&state, &buyer, seller_id, "Clock").await?;

    let (confirmed, timed_out) = tokio::join!(
        payment_service::process_payment(
            &state,
            &buyer,
            &payment_id,
            ConfirmPaymentRequest {
                payment_password: PAYMENT_PASSWORD.into(),
            },
        ),
        payment_service::handle_payment_timeout(&state, &payment_id),
    );

    let final_payment = payment(&state, &payment_id).await?;
    let final_order = order(&state, order_id).await?;
    match timed_out? {
        TimeoutOutcome::Expired { cancelled_orders, .. } => {
            assert_eq!(cancelled_orders, 1);
            assert_eq!(error_code(confirmed), ErrorCode::PaymentAlreadyProcessed);
            assert_eq!(final_payment.status, PaymentStatus::Expired);
            assert_eq!(final_order.status, OrderStatus::Cancelled);
        }
        TimeoutOutcome::Skipped(status) => {
            assert_eq!(status, PaymentStatus::Success);
            assert!(confirmed.is_ok());
            assert_eq!(final_payment.status, PaymentStatus::Success);
            assert_eq!(final_order.status, OrderStatus::AwaitingShipment);
        }
    }
    Ok(())
}

#[tokio::test]
async fn background_loop_expires_payments_and_stops_on_shutdown() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let seller_id = create_user(&state, "seller", "user", false).await?;
    let buyer_id = create_user(&state, "buyer", "user", true).await?;
    let buyer = auth(buyer_id);

    let (payment_id, order_id) = pending_payment(&state, &buyer, seller_id, "Fan").await?;
    set_expire_time(&state, &payment_id, Utc::now() - Duration::seconds(1)).await?;

    let handle = PaymentReconciler::new(state.clone(), StdDuration::from_millis(20)).spawn();

    let mut status = PaymentStatus::Pending;
    for _ in 0..100 {
        status = payment(&state, &payment_id).await?.status;
        if status == PaymentStatus::Expired {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    assert_eq!(status, PaymentStatus::Expired);
    assert_eq!(order(&state, order_id).await?.status, OrderStatus::Cancelled);
    assert!(state.reconciler.is_running());

    handle.shutdown().await;
    assert!(!state.reconciler.is_running());
    Ok(())
}

#[tokio::test]
async fn admin_can_inspect_and_force_timeouts() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let seller_id = create_user(&state, "seller", "user", false).await?;
    let buyer_id = create_user(&state, "buyer", "user", true).await?;
    let admin_id = create_user(&state, "root", "admin", false).await?;
    let buyer = auth(buyer_id);
    let operator = admin(admin_id);

    let (overdue, _) = pending_payment(&state, &buyer, seller_id, "Desk").await?;
    let (fresh, fresh_order) = pending_payment(&state, &buyer, seller_id, "Stool").await?;
    set_expire_time(&state, &overdue, Utc::now() - Duration::minutes(1)).await?;

    assert_eq!(
        error_code(payment_service::timeout_status(&state, &buyer).await),
        ErrorCode::Forbidden
    );
    assert_eq!(
        error_code(payment_service::expire_payment(&state, &buyer, &fresh).await),
        ErrorCode::Forbidden
    );

    let status = payment_service::timeout_status(&state, &operator)
        .await?
        .data
        .unwrap();
    assert_eq!(status.expired_pending_count, 1);
    assert!(!status.running);

    // A forced expiry ignores the deadline.
    let forced = payment_service::expire_payment(&state, &operator, &fresh)
        .await?
        .data
        .unwrap();
    assert!(forced.expired);
    assert_eq!(order(&state, fresh_order).await?.status, OrderStatus::Cancelled);

    let repeated = payment_service::expire_payment(&state, &operator, &fresh)
        .await?
        .data
        .unwrap();
    assert!(!repeated.expired);
    Ok(())
}
