//! HTTP request DTOs.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::ledger::{OrderCandidate, SubjectId};

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitOrderRequest {
    /// Symbol to trade.
    pub symbol: String,
    /// `buy` or `sell`.
    pub side: String,
    /// Number of shares.
    pub quantity: i64,
    /// Limit price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl SubmitOrderRequest {
    /// Attach the caller's identity.
    #[must_use]
    pub fn into_candidate(self, subject_id: SubjectId) -> OrderCandidate {
        OrderCandidate {
            subject_id,
            symbol: self.symbol,
            side: self.side,
            quantity: self.quantity,
            price: self.price,
        }
    }
}

/// Body of `POST /api/register` and `POST /api/login`.
#[derive(Clone, Deserialize)]
pub struct CredentialsRequest {
    /// Account name.
    pub username: String,
    /// Plain-text password.
    pub password: String,
}

impl std::fmt::Debug for CredentialsRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_request_accepts_numeric_price() {
        let request: SubmitOrderRequest = serde_json::from_str(
            r#"{"symbol":"AAPL","side":"buy","quantity":10,"price":175.5}"#,
        )
        .unwrap();

        let candidate = request.into_candidate("demo".to_string());
        assert_eq!(candidate.subject_id, "demo");
        assert_eq!(candidate.price, Decimal::new(1755, 1));
        assert_eq!(candidate.quantity, 10);
    }

    #[test]
    fn order_request_requires_every_field() {
        let result: Result<SubmitOrderRequest, _> =
            serde_json::from_str(r#"{"symbol":"AAPL","side":"buy","price":1.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let request = CredentialsRequest {
            username: "demo".to_string(),
            password: "demo123".to_string(),
        };
        assert!(!format!("{request:?}").contains("demo123"));
    }
}
