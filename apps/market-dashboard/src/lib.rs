#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Market Dashboard - Price Engine and Live Stream Backend
//!
//! An HTTP/WebSocket service that keeps a small catalog of simulated stock
//! prices, perturbs them on a fixed tick, fans every new snapshot out to live
//! subscribers and records buy/sell orders in memory.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types and invariants
//!   - `pricing`: Stocks, snapshots, the price store and perturbation policy
//!   - `ledger`: Order validation and the append-only order ledger
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Subscriber transport and authenticator interfaces
//!   - `services`: Periodic price mutation
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `broadcast`: Snapshot fan-out with eviction
//!   - `websocket`: Stream transport and subscriber sessions
//!   - `http`: REST API and server
//!   - `auth`: Bearer tokens and accounts
//!   - `config`: Configuration and dependency injection
//!   - `health`: Health, liveness and metrics routes
//!
//! # Data Flow
//!
//! ```text
//! PriceMutator ──tick──► PriceStore
//!       │
//!       └──latest snapshot──► BroadcastHub ──► Subscriber 1
//!                                  │       ──► Subscriber 2
//!                                  │       ──► Subscriber N
//! HTTP ──► OrderLedger             └─ evicts failed or stalled subscribers
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core pricing and ledger types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::ledger::{Order, OrderCandidate, OrderLedger, Side, SubjectId, ValidationError};
pub use domain::pricing::{PricePolicy, PriceSnapshot, PriceStore, Stock, Symbol, UniformDrift};

// Application
pub use application::services::PriceMutator;

// Infrastructure config
pub use infrastructure::config::{
    AppContext, AuthSettings, BackgroundTasks, BroadcastSettings, ConfigError, DashboardConfig,
    PricingSettings, ServerSettings,
};

// Broadcast hub (for integration tests)
pub use infrastructure::broadcast::{
    BroadcastConfig, BroadcastHub, BroadcastStats, PublishReport, SharedBroadcastHub,
};

// HTTP server
pub use infrastructure::http::{HttpServer, HttpServerError, router};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
