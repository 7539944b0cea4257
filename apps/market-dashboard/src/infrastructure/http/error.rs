//! HTTP error mapping.
//!
//! Every failure leaves the API as `{"error": CODE, "message": text}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::response::ErrorResponse;
use crate::application::ports::AuthError;
use crate::domain::ledger::ValidationError;

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Order failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Request body or fields are unusable.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Credential is valid but lacks access.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unexpected failure.
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code placed in the envelope.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code(),
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Unauthenticated | AuthError::InvalidCredentials => {
                Self::Unauthorized(error.to_string())
            }
            AuthError::UsernameTaken(_) => Self::Conflict(error.to_string()),
            AuthError::InvalidRegistration(msg) => Self::BadRequest(msg),
            AuthError::TokenIssue(msg) | AuthError::Hashing(msg) => {
                Self::Internal(anyhow::anyhow!(msg))
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Internal(e) => {
                tracing::error!(error = %e, "Request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: self.code().to_string(),
            message,
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use test_case::test_case;

    use super::*;

    #[test_case(AuthError::Unauthenticated, StatusCode::UNAUTHORIZED ; "missing token")]
    #[test_case(AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED ; "bad password")]
    #[test_case(AuthError::UsernameTaken("demo".into()), StatusCode::CONFLICT ; "taken")]
    #[test_case(AuthError::InvalidRegistration("short".into()), StatusCode::BAD_REQUEST ; "short fields")]
    #[test_case(AuthError::TokenIssue("boom".into()), StatusCode::INTERNAL_SERVER_ERROR ; "signing failed")]
    #[test_case(AuthError::Hashing("bad cost".into()), StatusCode::INTERNAL_SERVER_ERROR ; "hashing failed")]
    fn auth_errors_map_to_status(error: AuthError, status: StatusCode) {
        assert_eq!(ApiError::from(error).status(), status);
    }

    #[tokio::test]
    async fn validation_error_uses_envelope() {
        let response =
            ApiError::from(ValidationError::InvalidSymbol("FAKE".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "INVALID_SYMBOL");
        assert_eq!(json["message"], "unknown symbol: FAKE");
    }

    #[tokio::test]
    async fn internal_error_hides_detail() {
        let response = ApiError::Internal(anyhow::anyhow!("db password leaked")).into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "INTERNAL_ERROR");
        assert_eq!(json["message"], "Internal server error");
    }
}
