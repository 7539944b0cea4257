//! HTTP Controller (Driver Adapter)
//!
//! Axum handlers that delegate to the price store, the order ledger and the
//! account directory held by [`AppContext`].

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, WebSocketUpgrade, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::extract::{AuthenticatedSubject, OperatorAccess};
use super::request::{CredentialsRequest, SubmitOrderRequest};
use super::response::{ProfileResponse, TokenResponse};
use super::ApiError;
use crate::application::ports::AuthError;
use crate::domain::ledger::Order;
use crate::domain::pricing::Stock;
use crate::infrastructure::auth::UserDirectory;
use crate::infrastructure::config::AppContext;
use crate::infrastructure::metrics;
use crate::infrastructure::websocket::SubscriberSession;

// =============================================================================
// Prices
// =============================================================================

/// `GET /api/prices`: every stock in catalog order.
pub async fn list_prices(State(ctx): State<AppContext>) -> Json<Vec<Stock>> {
    Json(ctx.store().snapshot().to_vec())
}

/// `GET /ws`: upgrade to a price stream.
pub async fn stream_prices(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> Response {
    let session = SubscriberSession::new(ctx.hub().clone(), ctx.shutdown().child_token());
    ws.on_upgrade(move |socket| async move {
        let report = session.serve(socket).await;
        tracing::debug!(
            subscriber_id = report.subscriber_id,
            was_active = report.was_active,
            reason = ?report.reason,
            "Stream session finished"
        );
    })
}

// =============================================================================
// Orders
// =============================================================================

/// `POST /api/orders`: validate and record an order for the caller.
pub async fn submit_order(
    State(ctx): State<AppContext>,
    AuthenticatedSubject(subject_id): AuthenticatedSubject,
    body: Result<Json<SubmitOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(request) = body?;

    match ctx.ledger().append(request.into_candidate(subject_id)) {
        Ok(order) => {
            metrics::record_order_accepted(order.side.as_str());
            tracing::info!(
                order_id = order.id,
                username = %order.subject_id,
                symbol = %order.symbol,
                side = %order.side,
                quantity = order.quantity,
                price = %order.price,
                "Order recorded"
            );
            Ok((StatusCode::CREATED, Json(order)))
        }
        Err(e) => {
            metrics::record_order_rejected(e.code());
            tracing::debug!(error = %e, "Order rejected");
            Err(e.into())
        }
    }
}

/// `GET /api/orders`: the caller's orders in submission order.
pub async fn list_my_orders(
    State(ctx): State<AppContext>,
    AuthenticatedSubject(subject_id): AuthenticatedSubject,
) -> Json<Vec<Order>> {
    Json(ctx.ledger().list_by_subject(&subject_id))
}

/// `GET /api/orders/all`: every order, operator only.
pub async fn list_all_orders(
    State(ctx): State<AppContext>,
    _operator: OperatorAccess,
) -> Json<Vec<Order>> {
    Json(ctx.ledger().list_all())
}

// =============================================================================
// Accounts
// =============================================================================

/// `POST /api/register`: create an account and sign the caller in.
pub async fn register(
    State(ctx): State<AppContext>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let Json(request) = body?;

    let (username, password) = (request.username.clone(), request.password);
    with_users(&ctx, move |users| users.register(&username, &password)).await?;
    let token = ctx.authenticator().issue(&request.username)?;

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            token,
            username: request.username,
            message: "Registration successful".to_string(),
        }),
    ))
}

/// `POST /api/login`: exchange credentials for a bearer token.
pub async fn login(
    State(ctx): State<AppContext>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = body?;

    let (username, password) = (request.username.clone(), request.password);
    if let Err(e) = with_users(&ctx, move |users| users.verify(&username, &password)).await {
        tracing::debug!(username = %request.username, "Login rejected");
        return Err(e);
    }
    let token = ctx.authenticator().issue(&request.username)?;

    Ok(Json(TokenResponse {
        token,
        username: request.username,
        message: "Login successful".to_string(),
    }))
}

/// `GET /api/profile`: echo the caller's identity.
pub async fn profile(AuthenticatedSubject(username): AuthenticatedSubject) -> impl IntoResponse {
    Json(ProfileResponse {
        username,
        message: "Profile retrieved successfully".to_string(),
    })
}

/// Run a password operation on the blocking pool; bcrypt is CPU-bound.
async fn with_users<F>(ctx: &AppContext, op: F) -> Result<(), ApiError>
where
    F: FnOnce(&UserDirectory) -> Result<(), AuthError> + Send + 'static,
{
    let users = Arc::clone(ctx.users());
    tokio::task::spawn_blocking(move || op(&users))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .map_err(ApiError::from)
}
