//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Bearer tokens and the account directory.
pub mod auth;

/// Snapshot fan-out to stream subscribers.
pub mod broadcast;

/// Configuration and dependency injection.
pub mod config;

/// Health check and metrics routes.
pub mod health;

/// REST API and HTTP server.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// WebSocket transport and subscriber sessions.
pub mod websocket;
