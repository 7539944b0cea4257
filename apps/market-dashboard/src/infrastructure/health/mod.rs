//! Health Check and Metrics Endpoints
//!
//! Health, liveness and Prometheus routes mounted on the main HTTP router.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Liveness check (simple OK)
//! - `GET /readyz` - Readiness check (hub accepting subscribers)
//! - `GET /metrics` - Prometheus metrics in text format

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::infrastructure::config::AppContext;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Price engine status.
    pub prices: PriceStatus,
    /// Streaming status.
    pub stream: StreamStatus,
    /// Recorded orders.
    pub orders: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Prices are ticking and the hub is open.
    Healthy,
    /// Serving, but no tick has happened yet.
    Degraded,
    /// Hub has shut down.
    Unhealthy,
}

/// Price engine status.
#[derive(Debug, Clone, Serialize)]
pub struct PriceStatus {
    /// Tracked symbols.
    pub symbols: usize,
    /// Current tick sequence.
    pub sequence: u64,
}

/// Streaming status.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    /// Live subscribers.
    pub subscribers: usize,
    /// Sequence of the last snapshot published.
    pub last_published: u64,
    /// Subscribers evicted since start.
    pub evictions: u64,
}

// =============================================================================
// Routes
// =============================================================================

/// Health and metrics routes.
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
}

async fn health_handler(State(ctx): State<AppContext>) -> impl IntoResponse {
    let response = build_health_response(&ctx);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(ctx): State<AppContext>) -> impl IntoResponse {
    if ctx.hub().is_closed() {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    } else {
        (StatusCode::OK, "READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(ctx: &AppContext) -> HealthResponse {
    let sequence = ctx.store().sequence();
    let hub_closed = ctx.hub().is_closed();
    let stats = ctx.hub().stats();

    HealthResponse {
        status: determine_health_status(sequence, hub_closed),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: ctx.started_at().elapsed().as_secs(),
        current_time: Utc::now(),
        prices: PriceStatus {
            symbols: ctx.store().len(),
            sequence,
        },
        stream: StreamStatus {
            subscribers: stats.subscribers,
            last_published: stats.last_sequence,
            evictions: stats.evictions,
        },
        orders: ctx.ledger().len(),
    }
}

const fn determine_health_status(sequence: u64, hub_closed: bool) -> HealthStatus {
    if hub_closed {
        HealthStatus::Unhealthy
    } else if sequence == 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

// =============================================================================
// Tests
// =============================================================================
