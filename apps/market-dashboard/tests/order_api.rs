//! Order API Integration Tests
//!
//! Drives the full router in-process: prices, accounts, order submission and
//! listing, and the error envelope.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use market_dashboard::{AppContext, DashboardConfig, router};

fn app_with(config: &DashboardConfig) -> Router {
    let mut config = config.clone();
    config.auth.password_cost = 4 /* bcrypt minimum cost */;
    router(AppContext::from_config(&config, CancellationToken::new()))
}

fn app() -> Router {
    app_with(&DashboardConfig::default())
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn login_demo(app: &Router) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({"username": "demo", "password": "demo123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

fn order(symbol: &str, side: &str, quantity: i64, price: f64) -> Value {
    json!({"symbol": symbol, "side": side, "quantity": quantity, "price": price})
}

// =============================================================================
// Prices
// =============================================================================

#[tokio::test]
async fn prices_list_every_stock_sorted_by_symbol() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/prices", None, None).await;

    assert_eq!(status, StatusCode::OK);
    let symbols: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|stock| stock["symbol"].as_str().unwrap())
        .collect();
    assert_eq!(symbols, vec!["AAPL", "AMZN", "INFY", "TCS", "TSLA"]);
    assert_eq!(body[0]["price"], json!(175.5));
    assert_eq!(body[0]["change"], json!(0.0));
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn first_order_gets_id_one() {
    let app = app();
    let token = login_demo(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(order("AAPL", "buy", 10, 150.25)),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], 1);
    assert_eq!(body["username"], "demo");
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["side"], "buy");
    assert_eq!(body["quantity"], 10);
    assert_eq!(body["price"], json!(150.25));
    assert!(body["time"].is_string());

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(order("TSLA", "sell", 1, 700.0)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], 2);
}

#[tokio::test]
async fn order_owner_comes_from_token_not_body() {
    let app = app();
    let token = login_demo(&app).await;

    let mut payload = order("AAPL", "buy", 10, 175.5);
    payload["username"] = json!("mallory");
    let (status, body) =
        call(&app, Method::POST, "/api/orders", Some(&token), Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "demo");

    let (_, mine) = call(&app, Method::GET, "/api/orders", Some(&token), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["username"], "demo");

    let (_, all) = call(&app, Method::GET, "/api/orders/all", None, None).await;
    let owners: Vec<&str> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["username"].as_str().unwrap())
        .collect();
    assert_eq!(owners, vec!["demo"]);
}

#[tokio::test]
async fn unknown_symbol_is_rejected_with_code() {
    let app = app();
    let token = login_demo(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(order("FAKE", "buy", 10, 1.0)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_SYMBOL");

    let (_, orders) = call(&app, Method::GET, "/api/orders/all", None, None).await;
    assert_eq!(orders.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn invalid_fields_map_to_distinct_codes() {
    let app = app();
    let token = login_demo(&app).await;

    for (payload, code) in [
        (order("AAPL", "hold", 1, 1.0), "INVALID_SIDE"),
        (order("AAPL", "BUY", 1, 1.0), "INVALID_SIDE"),
        (order("AAPL", "buy", 0, 1.0), "INVALID_QUANTITY"),
        (order("AAPL", "sell", -5, 1.0), "INVALID_QUANTITY"),
        (order("AAPL", "buy", 1, 0.0), "INVALID_PRICE"),
    ] {
        let (status, body) =
            call(&app, Method::POST, "/api/orders", Some(&token), Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], code);
    }
}

#[tokio::test]
async fn malformed_body_uses_error_envelope() {
    let app = app();
    let token = login_demo(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(json!({"symbol": "AAPL"})),
    )
    .await;

    assert!(status.is_client_error());
    assert_eq!(body["error"], "BAD_REQUEST");
}

#[tokio::test]
async fn orders_require_a_token() {
    let app = app();

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/orders",
        None,
        Some(order("AAPL", "buy", 1, 1.0)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHORIZED");

    let (status, _) = call(&app, Method::GET, "/api/orders", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn order_listing_is_scoped_to_caller() {
    let app = app();
    let demo = login_demo(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/register",
        None,
        Some(json!({"username": "alice", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let alice = body["token"].as_str().unwrap().to_string();

    call(&app, Method::POST, "/api/orders", Some(&demo), Some(order("AAPL", "buy", 1, 1.0))).await;
    call(&app, Method::POST, "/api/orders", Some(&alice), Some(order("INFY", "sell", 2, 2.0))).await;
    call(&app, Method::POST, "/api/orders", Some(&demo), Some(order("TSLA", "buy", 3, 3.0))).await;

    let (_, mine) = call(&app, Method::GET, "/api/orders", Some(&demo), None).await;
    let ids: Vec<u64> = mine
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 3]);

    let (_, all) = call(&app, Method::GET, "/api/orders/all", None, None).await;
    assert_eq!(all.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn full_listing_requires_operator_key_when_configured() {
    let mut config = DashboardConfig::default();
    config.auth = config.auth.with_operator_key("ops-key");
    let app = app_with(&config);

    let (status, _) = call(&app, Method::GET, "/api/orders/all", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/orders/all")
        .header("x-operator-key", "wrong")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let request = Request::builder()
        .uri("/api/orders/all")
        .header("x-operator-key", "ops-key")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Accounts
// =============================================================================

#[tokio::test]
async fn register_login_and_profile() {
    let app = app();

    let credentials = json!({"username": "bob", "password": "hunter22"});
    let (status, body) =
        call(&app, Method::POST, "/api/register", None, Some(credentials.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "bob");
    assert_eq!(body["message"], "Registration successful");

    let (status, _) = call(&app, Method::POST, "/api/register", None, Some(credentials.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&app, Method::POST, "/api/login", None, Some(credentials)).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = call(&app, Method::GET, "/api/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "bob");
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let app = app();

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({"username": "demo", "password": "nope-nope"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn short_registration_fields_are_bad_requests() {
    let app = app();

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/register",
        None,
        Some(json!({"username": "al", "password": "secret1"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BAD_REQUEST");
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_reports_degraded_before_first_tick() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["prices"]["symbols"], 5);
}
