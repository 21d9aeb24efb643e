mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use common::{create_product, create_user, setup_state};
use marketplace_trade::{build_app, entity::sea_orm_active_enums::ProductStatus};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<&str>,
) -> anyhow::Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, token);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

async fn login(app: &Router, username: &str) -> anyhow::Result<String> {
    let body = json!({ "email": format!("{username}@example.com"), "password": "password" });
    let (status, value) = call(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(&body.to_string()),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{value}");
    Ok(value["data"]["token"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("no token in {value}"))?
        .to_string())
}

#[tokio::test]
async fn checkout_over_http() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let seller_id = create_user(&state, "seller", "user", false).await?;
    create_user(&state, "buyer", "user", true).await?;
    let product_id =
        create_product(&state, seller_id, "Guitar", "99.99", ProductStatus::OnSale).await?;
    let app = build_app(state);
    let buyer = login(&app, "buyer").await?;
    let seller = login(&app, "seller").await?;

    let (status, created) = call(
        &app,
        Method::POST,
        "/api/orders",
        Some(&buyer),
        Some(&json!({ "product_ids": [product_id] }).to_string()),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{created}");
    assert_eq!(created["success"], true);
    assert_eq!(created["data"]["total_amount"], "99.99");
    let order_id = created["data"]["orders"][0]["id"].as_i64().unwrap();
    assert_eq!(created["data"]["orders"][0]["status"], "PENDING_PAYMENT");

    let (status, payment) = call(
        &app,
        Method::POST,
        "/api/payments",
        Some(&buyer),
        Some(&json!({ "order_ids": [order_id], "total_amount": "99.99", "payment_method": 1 }).to_string()),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{payment}");
    let payment_id = payment["data"]["payment_id"].as_str().unwrap().to_string();
    assert_eq!(payment["data"]["status"], "PENDING");

    let (status, confirmed) = call(
        &app,
        Method::POST,
        &format!("/api/payments/{payment_id}/confirm"),
        Some(&buyer),
        Some(&json!({ "payment_password": "123456" }).to_string()),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{confirmed}");
    assert_eq!(confirmed["data"]["status"], "SUCCESS");

    let (status, again) = call(
        &app,
        Method::POST,
        &format!("/api/payments/{payment_id}/confirm"),
        Some(&buyer),
        Some(&json!({ "payment_password": "123456" }).to_string()),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(again["success"], false);
    assert_eq!(again["code"], "PAYMENT_ALREADY_PROCESSED");

    let (status, by_orders) = call(
        &app,
        Method::GET,
        &format!("/api/payments/by-orders?order_ids={order_id}"),
        Some(&buyer),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{by_orders}");
    assert_eq!(by_orders["data"]["payment_id"], payment_id.as_str());

    let (status, shipped) = call(
        &app,
        Method::POST,
        &format!("/api/orders/{order_id}/ship"),
        Some(&seller),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{shipped}");
    assert_eq!(shipped["data"]["status"], "SHIPPED");

    let (status, listed) = call(
        &app,
        Method::GET,
        "/api/orders?type=seller&page=1&per_page=10",
        Some(&seller),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{listed}");
    assert_eq!(listed["meta"]["total"], 1);
    assert_eq!(listed["data"]["items"][0]["id"], order_id);
    Ok(())
}

#[tokio::test]
async fn requests_without_a_valid_token_are_rejected() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let app = build_app(state);

    let (status, body) = call(&app, Method::GET, "/api/orders", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, body) = call(
        &app,
        Method::GET,
        "/api/payments",
        Some("Bearer not-a-jwt"),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(&json!({ "email": "ghost@example.com", "password": "x" }).to_string()),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
    Ok(())
}

#[tokio::test]
async fn malformed_input_and_unknown_routes_use_the_error_envelope() -> anyhow::Result<()> {
    let state = setup_state().await?;
    create_user(&state, "buyer", "user", true).await?;
    let app = build_app(state);
    let buyer = login(&app, "buyer").await?;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/orders",
        Some(&buyer),
        Some("{\"product_ids\": "),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PARAMS");

    let (status, body) = call(&app, Method::GET, "/api/orders/abc", Some(&buyer), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PARAMS");

    let (status, body) = call(&app, Method::GET, "/api/orders?type=courier", Some(&buyer), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PARAMS");

    let (status, body) = call(&app, Method::GET, "/api/orders/9999", Some(&buyer), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ORDER_NOT_FOUND");

    let (status, body) = call(&app, Method::GET, "/api/nowhere", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = call(&app, Method::GET, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    Ok(())
}
