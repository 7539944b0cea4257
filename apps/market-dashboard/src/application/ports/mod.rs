//! Port Interfaces
//!
//! Contracts between the application core and its adapters.
//!
//! ## Driven Ports (Outbound)
//!
//! - `SubscriberTransport`: push channel to one live subscriber
//!
//! ## Driver Ports (Inbound)
//!
//! - `Authenticator`: resolves a bearer credential to a subject

use async_trait::async_trait;

use crate::domain::ledger::SubjectId;
use crate::domain::pricing::PriceSnapshot;

// =============================================================================
// Subscriber Transport
// =============================================================================

/// Errors raised while pushing to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Peer is gone.
    #[error("transport closed")]
    Closed,
    /// Send did not complete within the configured bound.
    #[error("send timed out")]
    Timeout,
    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(String),
    /// Snapshot could not be encoded.
    #[error("failed to encode snapshot: {0}")]
    Encode(String),
}

impl TransportError {
    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Timeout => "timeout",
            Self::Io(_) => "io",
            Self::Encode(_) => "encode",
        }
    }
}

/// A single live subscriber connection.
///
/// Implementations must tolerate `close` being called after the peer has
/// already gone away.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriberTransport: Send + Sync {
    /// Push one snapshot.
    async fn send(&self, snapshot: &PriceSnapshot) -> Result<(), TransportError>;

    /// Release the connection.
    async fn close(&self);
}

// =============================================================================
// Authentication
// =============================================================================

/// Authentication and registration failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Missing, malformed, expired or forged credential.
    #[error("authentication required")]
    Unauthenticated,
    /// Username/password pair did not match.
    #[error("invalid username or password")]
    InvalidCredentials,
    /// Registration with a username already in use.
    #[error("username '{0}' is already taken")]
    UsernameTaken(String),
    /// Registration fields failed validation.
    #[error("{0}")]
    InvalidRegistration(String),
    /// Token could not be produced.
    #[error("failed to issue token: {0}")]
    TokenIssue(String),
    /// Password could not be hashed.
    #[error("failed to hash password: {0}")]
    Hashing(String),
}

/// Resolves a bearer credential to the caller's identity.
pub trait Authenticator: Send + Sync {
    /// Verify `bearer_token` (the value after `Bearer `).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` when the token is absent or
    /// cannot be verified.
    fn authenticate(&self, bearer_token: Option<&str>) -> Result<SubjectId, AuthError>;
}
