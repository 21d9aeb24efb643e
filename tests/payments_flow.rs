mod common;

use chrono::{Duration, Utc};
use common::{
    auth, create_product, create_user, dec, error_code, order, payment, set_expire_time,
    setup_state, PAYMENT_PASSWORD,
};
use marketplace_trade::{
    dto::{
        orders::CreateOrderRequest,
        payments::{ConfirmPaymentRequest, CreatePaymentRequest},
    },
    entity::sea_orm_active_enums::{OrderStatus, PaymentMethod, PaymentStatus, ProductStatus},
    error::ErrorCode,
    middleware::auth::AuthUser,
    routes::params::Pagination,
    services::{order_service, payment_service},
    state::AppState,
};

async fn orders_for(state: &AppState, buyer: &AuthUser, product_ids: Vec<i64>) -> anyhow::Result<Vec<i64>> {
    let created = order_service::create_order(state, buyer, CreateOrderRequest { product_ids })
        .await?
        .data
        .unwrap();
    Ok(created.orders.iter().map(|o| o.id).collect())
}

fn pay_request(order_ids: Vec<i64>, amount: &str) -> CreatePaymentRequest {
    CreatePaymentRequest {
        order_ids,
        total_amount: dec(amount),
        payment_method: 2,
    }
}

fn confirm(password: &str) -> ConfirmPaymentRequest {
    ConfirmPaymentRequest {
        payment_password: password.to_string(),
    }
}

#[tokio::test]
async fn paying_for_an_order_moves_it_to_awaiting_shipment() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let seller_id = create_user(&state, "seller", "user", false).await?;
    let buyer_id = create_user(&state, "buyer", "user", true).await?;
    let product_id =
        create_product(&state, seller_id, "Camera", "99.99", ProductStatus::OnSale).await?;
    let buyer = auth(buyer_id);

    let order_ids = orders_for(&state, &buyer, vec![product_id]).await?;
    let created = payment_service::create_payment(&state, &buyer, pay_request(order_ids.clone(), "99.99"))
        .await?
        .data
        .unwrap();
    assert_eq!(created.status, PaymentStatus::Pending);
    assert_eq!(created.payment_method, PaymentMethod::WechatPay);
    assert_eq!(created.payment_amount, dec("99.99"));
    assert!(created.payment_id.starts_with("PAY"));
    assert!(created.expire_time > Utc::now() + Duration::minutes(14));
    assert_eq!(order(&state, order_ids[0]).await?.status, OrderStatus::PendingPayment);

    let paid = payment_service::process_payment(&state, &buyer, &created.payment_id, confirm(PAYMENT_PASSWORD))
        .await?
        .data
        .unwrap();
    assert_eq!(paid.status, PaymentStatus::Success);
    assert!(paid.payment_time.is_some());
    assert!(paid.third_party_transaction_id.unwrap().starts_with("TXN"));
    assert_eq!(order(&state, order_ids[0]).await?.status, OrderStatus::AwaitingShipment);

    assert_eq!(
        error_code(
            payment_service::process_payment(&state, &buyer, &created.payment_id, confirm(PAYMENT_PASSWORD)).await
        ),
        ErrorCode::PaymentAlreadyProcessed
    );
    assert_eq!(
        error_code(payment_service::cancel_payment(&state, &buyer, &created.payment_id).await),
        ErrorCode::PaymentAlreadyProcessed
    );
    Ok(())
}

#[tokio::test]
async fn declared_amount_must_equal_the_exact_order_sum() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let seller_id = create_user(&state, "seller", "user", false).await?;
    let buyer_id = create_user(&state, "buyer", "user", true).await?;
    let first = create_product(&state, seller_id, "Chair", "50.00", ProductStatus::OnSale).await?;
    let second = create_product(&state, seller_id, "Table", "49.99", ProductStatus::OnSale).await?;
    let buyer = auth(buyer_id);
    let order_ids = orders_for(&state, &buyer, vec![first, second]).await?;

    for amount in ["100.00", "99.98", "99.991", "99.989"] {
        assert_eq!(
            error_code(
                payment_service::create_payment(&state, &buyer, pay_request(order_ids.clone(), amount)).await
            ),
            ErrorCode::OrderAmountMismatch,
            "amount {amount}"
        );
    }

    let accepted = payment_service::create_payment(&state, &buyer, pay_request(order_ids.clone(), "99.990"))
        .await?
        .data
        .unwrap();
    assert_eq!(accepted.payment_amount, dec("99.99"));
    assert_eq!(accepted.order_ids, order_ids);
    Ok(())
}

#[tokio::test]
async fn create_payment_validates_input_and_orders() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let seller_id = create_user(&state, "seller", "user", false).await?;
    let buyer_id = create_user(&state, "buyer", "user", true).await?;
    let other_id = create_user(&state, "other", "user", true).await?;
    let product_id = create_product(&state, seller_id, "Vase", "8.00", ProductStatus::OnSale).await?;
    let buyer = auth(buyer_id);
    let order_ids = orders_for(&state, &buyer, vec![product_id]).await?;

    assert_eq!(
        error_code(payment_service::create_payment(&state, &buyer, pay_request(vec![], "8.00")).await),
        ErrorCode::EmptyOrderList
    );
    assert_eq!(
        error_code(payment_service::create_payment(&state, &buyer, pay_request(order_ids.clone(), "0")).await),
        ErrorCode::InvalidAmount
    );
    assert_eq!(
        error_code(payment_service::create_payment(&state, &buyer, pay_request(order_ids.clone(), "-8.00")).await),
        ErrorCode::InvalidAmount
    );
    let mut bad_method = pay_request(order_ids.clone(), "8.00");
    bad_method.payment_method = 4;
    assert_eq!(
        error_code(payment_service::create_payment(&state, &buyer, bad_method).await),
        ErrorCode::InvalidPaymentMethod
    );
    assert_eq!(
        error_code(payment_service::create_payment(&state, &buyer, pay_request(vec![777], "8.00")).await),
        ErrorCode::OrderNotFound
    );
    assert_eq!(
        error_code(payment_service::create_payment(&state, &auth(other_id), pay_request(order_ids.clone(), "8.00")).await),
        ErrorCode::OrderPermissionDenied
    );

    let created = payment_service::create_payment(&state, &buyer, pay_request(order_ids.clone(), "8.00"))
        .await?
        .data
        .unwrap();
    payment_service::process_payment(&state, &buyer, &created.payment_id, confirm(PAYMENT_PASSWORD)).await?;
    assert_eq!(
        error_code(payment_service::create_payment(&state, &buyer, pay_request(order_ids, "8.00")).await),
        ErrorCode::OrderStatusInvalid
    );
    Ok(())
}

#[tokio::test]
async fn an_order_bound_to_a_pending_payment_cannot_be_bound_again() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let seller_id = create_user(&state, "seller", "user", false).await?;
    let buyer_id = create_user(&state, "buyer", "user", true).await?;
    let first = create_product(&state, seller_id, "Shelf", "30.00", ProductStatus::OnSale).await?;
    let second = create_product(&state, seller_id, "Rug", "20.00", ProductStatus::OnSale).await?;
    let buyer = auth(buyer_id);
    let order_ids = orders_for(&state, &buyer, vec![first, second]).await?;

    let pending = payment_service::create_payment(&state, &buyer, pay_request(vec![order_ids[0]], "30.00"))
        .await?
        .data
        .unwrap();
    assert_eq!(
        error_code(payment_service::create_payment(&state, &buyer, pay_request(order_ids.clone(), "50.00")).await),
        ErrorCode::OrderAlreadyBound
    );
    // The unbound order is still free.
    payment_service::create_payment(&state, &buyer, pay_request(vec![order_ids[1]], "20.00")).await?;

    // A wrong password fails the payment and releases the order for a new attempt.
    assert_eq!(
        error_code(payment_service::process_payment(&state, &buyer, &pending.payment_id, confirm("000000")).await),
        ErrorCode::PaymentPasswordError
    );
    let failed = payment(&state, &pending.payment_id).await?;
    assert_eq!(failed.status, PaymentStatus::Failed);
    assert!(failed.failure_reason.is_some());
    assert_eq!(order(&state, order_ids[0]).await?.status, OrderStatus::PendingPayment);

    let retry = payment_service::create_payment(&state, &buyer, pay_request(vec![order_ids[0]], "30.00"))
        .await?
        .data
        .unwrap();
    payment_service::process_payment(&state, &buyer, &retry.payment_id, confirm(PAYMENT_PASSWORD)).await?;
    assert_eq!(order(&state, order_ids[0]).await?.status, OrderStatus::AwaitingShipment);
    Ok(())
}

#[tokio::test]
async fn confirming_after_the_deadline_expires_the_payment() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let seller_id = create_user(&state, "seller", "user", false).await?;
    let buyer_id = create_user(&state, "buyer", "user", true).await?;
    let product_id = create_product(&state, seller_id, "Tent", "120.00", ProductStatus::OnSale).await?;
    let buyer = auth(buyer_id);
    let order_ids = orders_for(&state, &buyer, vec![product_id]).await?;

    let created = payment_service::create_payment(&state, &buyer, pay_request(order_ids.clone(), "120.00"))
        .await?
        .data
        .unwrap();
    set_expire_time(&state, &created.payment_id, Utc::now() - Duration::minutes(1)).await?;

    assert_eq!(
        error_code(payment_service::process_payment(&state, &buyer, &created.payment_id, confirm(PAYMENT_PASSWORD)).await),
        ErrorCode::PaymentTimeout
    );
    assert_eq!(payment(&state, &created.payment_id).await?.status, PaymentStatus::Expired);
    assert_eq!(order(&state, order_ids[0]).await?.status, OrderStatus::Cancelled);
    Ok(())
}

#[tokio::test]
async fn credential_and_ownership_checks() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let seller_id = create_user(&state, "seller", "user", false).await?;
    let buyer_id = create_user(&state, "buyer", "user", false).await?;
    let other_id = create_user(&state, "other", "user", true).await?;
    let product_id = create_product(&state, seller_id, "Drone", "300.00", ProductStatus::OnSale).await?;
    let buyer = auth(buyer_id);
    let order_ids = orders_for(&state, &buyer, vec![product_id]).await?;

    let created = payment_service::create_payment(&state, &buyer, pay_request(order_ids, "300.00"))
        .await?
        .data
        .unwrap();

    assert_eq!(
        error_code(payment_service::process_payment(&state, &buyer, &created.payment_id, confirm("   ")).await),
        ErrorCode::InvalidPaymentPassword
    );
    assert_eq!(
        error_code(payment_service::process_payment(&state, &auth(other_id), &created.payment_id, confirm(PAYMENT_PASSWORD)).await),
        ErrorCode::PaymentNotFound
    );
    assert_eq!(
        error_code(payment_service::get_payment_status(&state, &auth(other_id), &created.payment_id).await),
        ErrorCode::PaymentNotFound
    );
    assert_eq!(
        error_code(payment_service::cancel_payment(&state, &buyer, "PAY-missing").await),
        ErrorCode::PaymentNotFound
    );
    assert_eq!(payment(&state, &created.payment_id).await?.status, PaymentStatus::Pending);

    // No payment password on file: any credential fails.
    assert_eq!(
        error_code(payment_service::process_payment(&state, &buyer, &created.payment_id, confirm(PAYMENT_PASSWORD)).await),
        ErrorCode::PaymentPasswordError
    );
    assert_eq!(payment(&state, &created.payment_id).await?.status, PaymentStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn cancelling_a_payment_cancels_its_orders() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let seller_id = create_user(&state, "seller", "user", false).await?;
    let buyer_id = create_user(&state, "buyer", "user", true).await?;
    let first = create_product(&state, seller_id, "Kettle", "15.00", ProductStatus::OnSale).await?;
    let second = create_product(&state, seller_id, "Toaster", "25.00", ProductStatus::OnSale).await?;
    let buyer = auth(buyer_id);
    let order_ids = orders_for(&state, &buyer, vec![first, second]).await?;

    let created = payment_service::create_payment(&state, &buyer, pay_request(order_ids.clone(), "40.00"))
        .await?
        .data
        .unwrap();
    let cancelled = payment_service::cancel_payment(&state, &buyer, &created.payment_id)
        .await?
        .data
        .unwrap();
    assert_eq!(cancelled.status, PaymentStatus::Cancelled);
    for id in &order_ids {
        assert_eq!(order(&state, *id).await?.status, OrderStatus::Cancelled);
    }

    assert_eq!(
        error_code(payment_service::cancel_payment(&state, &buyer, &created.payment_id).await),
        ErrorCode::PaymentAlreadyProcessed
    );
    assert_eq!(
        error_code(payment_service::create_payment(&state, &buyer, pay_request(order_ids, "40.00")).await),
        ErrorCode::OrderStatusInvalid
    );
    Ok(())
}

#[tokio::test]
async fn payments_can_be_listed_and_found_by_orders() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let seller_id = create_user(&state, "seller", "user", false).await?;
    let buyer_id = create_user(&state, "buyer", "user", true).await?;
    let first = create_product(&state, seller_id, "Plant", "7.25", ProductStatus::OnSale).await?;
    let second = create_product(&state, seller_id, "Pot", "2.75", ProductStatus::OnSale).await?;
    let buyer = auth(buyer_id);
    let order_ids = orders_for(&state, &buyer, vec![first, second]).await?;

    let created = payment_service::create_payment(&state, &buyer, pay_request(order_ids.clone(), "10.00"))
        .await?
        .data
        .unwrap();

    let found = payment_service::get_payment_by_order_ids(&state, &buyer, vec![order_ids[1]])
        .await?
        .data
        .unwrap();
    assert_eq!(found.payment_id, created.payment_id);
    assert_eq!(
        error_code(payment_service::get_payment_by_order_ids(&state, &buyer, vec![order_ids[0], 999]).await),
        ErrorCode::PaymentNotFound
    );

    let listed = payment_service::list_payments(&state, &buyer, Pagination::default()).await?;
    assert_eq!(listed.meta.unwrap().total, 1);
    let items = listed.data.unwrap().items;
    assert_eq!(items[0].status_text, "Awaiting payment");
    assert_eq!(items[0].payment_method_text, "WeChat Pay");

    let status = payment_service::get_payment_status(&state, &buyer, &created.payment_id)
        .await?
        .data
        .unwrap();
    assert_eq!(status.order_ids, order_ids);
    Ok(())
}
