//! HTTP/REST API adapter.
//!
//! Inbound adapter serving the dashboard API, the price stream upgrade and the
//! health routes from a single listener.
//!
//! # Endpoints
//!
//! - `GET /api/prices` - Current price of every stock
//! - `POST /api/orders` - Record an order for the caller
//! - `GET /api/orders` - The caller's orders
//! - `GET /api/orders/all` - Every order (operator key)
//! - `POST /api/register` / `POST /api/login` - Obtain a bearer token
//! - `GET /api/profile` - Caller identity
//! - `GET /ws` - Price stream (WebSocket)

mod controller;
mod error;
mod extract;
mod request;
mod response;

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use extract::{AuthenticatedSubject, OPERATOR_KEY_HEADER, OperatorAccess};
pub use request::{CredentialsRequest, SubmitOrderRequest};
pub use response::{ErrorResponse, ProfileResponse, TokenResponse};

use crate::infrastructure::config::AppContext;
use crate::infrastructure::health;

/// Build the full router over a context.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/api/prices", get(controller::list_prices))
        .route(
            "/api/orders",
            get(controller::list_my_orders).post(controller::submit_order),
        )
        .route("/api/orders/all", get(controller::list_all_orders))
        .route("/api/register", post(controller::register))
        .route("/api/login", post(controller::login))
        .route("/api/profile", get(controller::profile))
        .route("/ws", get(controller::stream_prices))
        .merge(health::routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(ctx)
}

// =============================================================================
// Server
// =============================================================================

/// Dashboard HTTP server.
pub struct HttpServer {
    port: u16,
    ctx: AppContext,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, ctx: AppContext, cancel: CancellationToken) -> Self {
        Self { port, ctx, cancel }
    }

    /// Bind `0.0.0.0:port` and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HttpServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(self.port, e.to_string()))?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError::ServerFailed` on a fatal server error.
    pub async fn serve(self, listener: TcpListener) -> Result<(), HttpServerError> {
        let port = listener.local_addr().map_or(self.port, |addr| addr.port());
        tracing::info!(port, "HTTP server listening");

        axum::serve(listener, router(self.ctx))
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}
