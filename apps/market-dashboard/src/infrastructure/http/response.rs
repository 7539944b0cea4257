//! HTTP response DTOs.

use serde::{Deserialize, Serialize};

/// Returned by register and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer token.
    pub token: String,
    /// Account name.
    pub username: String,
    /// Human-readable outcome.
    pub message: String,
}

/// Returned by `GET /api/profile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    /// Account name.
    pub username: String,
    /// Human-readable outcome.
    pub message: String,
}

/// Error envelope used by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code.
    pub error: String,
    /// Human-readable detail.
    pub message: String,
}
