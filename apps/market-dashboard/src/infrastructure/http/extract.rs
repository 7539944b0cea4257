//! Request extractors for caller identity.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::ApiError;
use crate::application::ports::Authenticator;
use crate::domain::ledger::SubjectId;
use crate::infrastructure::config::AppContext;

/// Header carrying the operator key.
pub const OPERATOR_KEY_HEADER: &str = "x-operator-key";

/// Caller identity resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSubject(pub SubjectId);

impl FromRequestParts<AppContext> for AuthenticatedSubject {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, ctx: &AppContext) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        ctx.authenticator()
            .authenticate(token)
            .map(Self)
            .map_err(ApiError::from)
    }
}

/// Proof that the caller may read every subject's orders.
///
/// When no operator key is configured every caller qualifies.
#[derive(Debug, Clone, Copy)]
pub struct OperatorAccess;

impl FromRequestParts<AppContext> for OperatorAccess {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, ctx: &AppContext) -> Result<Self, Self::Rejection> {
        let Some(expected) = ctx.operator_key() else {
            return Ok(Self);
        };

        let presented = parts
            .headers
            .get(OPERATOR_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        match presented {
            Some(key) if keys_match(key, expected) => Ok(Self),
            Some(_) => Err(ApiError::Forbidden("operator key rejected".to_string())),
            None => Err(ApiError::Unauthorized("operator key required".to_string())),
        }
    }
}

/// Constant-time key comparison. Both sides are hashed first so neither the
/// content nor the length of the expected key leaks through timing.
fn keys_match(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented.ct_eq(&expected).into()
}
