//! Order Ledger
//!
//! Append-only, in-memory record of submitted buy/sell orders.
//!
//! Orders are validated against the tracked symbols before they are accepted.
//! Ids and timestamps are assigned inside the same write section as the push,
//! so id order always matches insertion order.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::pricing::{Symbol, SymbolDirectory};

/// Identity of the caller that submitted an order.
pub type SubjectId = String;

// =============================================================================
// Value Objects
// =============================================================================

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl Side {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = ValidationError;

    /// Case-sensitive: only `buy` and `sell` are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(ValidationError::InvalidSide(other.to_string())),
        }
    }
}

/// Unvalidated order as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCandidate {
    /// Caller identity, taken from the credential rather than the payload.
    pub subject_id: SubjectId,
    /// Requested symbol.
    pub symbol: Symbol,
    /// Requested side, still a raw string.
    pub side: String,
    /// Requested quantity; may be zero or negative until validated.
    pub quantity: i64,
    /// Requested price.
    pub price: Decimal,
}

/// An accepted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Ledger-assigned id, starting at 1.
    pub id: u64,
    /// Submitting subject.
    #[serde(rename = "username")]
    pub subject_id: SubjectId,
    /// Traded symbol.
    pub symbol: Symbol,
    /// Order side.
    pub side: Side,
    /// Quantity, always positive.
    pub quantity: u64,
    /// Limit price, always positive.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Time the ledger accepted the order.
    #[serde(rename = "time")]
    pub submitted_at: DateTime<Utc>,
}

/// Reasons an order candidate is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Symbol is not tracked by the price store.
    #[error("unknown symbol: {0}")]
    InvalidSymbol(Symbol),
    /// Side is not `buy` or `sell`.
    #[error("side must be 'buy' or 'sell', got '{0}'")]
    InvalidSide(String),
    /// Quantity is zero or negative.
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i64),
    /// Price is zero or negative.
    #[error("price must be positive, got {0}")]
    InvalidPrice(Decimal),
}

impl ValidationError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSymbol(_) => "INVALID_SYMBOL",
            Self::InvalidSide(_) => "INVALID_SIDE",
            Self::InvalidQuantity(_) => "INVALID_QUANTITY",
            Self::InvalidPrice(_) => "INVALID_PRICE",
        }
    }
}

// =============================================================================
// Ledger
// =============================================================================

#[derive(Debug)]
struct LedgerState {
    next_id: u64,
    orders: Vec<Order>,
}

/// Concurrent-safe append-only order store.
pub struct OrderLedger {
    symbols: Arc<dyn SymbolDirectory>,
    state: RwLock<LedgerState>,
}

impl fmt::Debug for OrderLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderLedger")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl OrderLedger {
    /// Create an empty ledger validating symbols against `symbols`.
    #[must_use]
    pub fn new(symbols: Arc<dyn SymbolDirectory>) -> Self {
        Self {
            symbols,
            state: RwLock::new(LedgerState {
                next_id: 1,
                orders: Vec::new(),
            }),
        }
    }

    /// Validate and record an order.
    ///
    /// Checks run in order: symbol, side, quantity, price. Nothing is written
    /// when a check fails.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` encountered.
    pub fn append(&self, candidate: OrderCandidate) -> Result<Order, ValidationError> {
        let OrderCandidate {
            subject_id,
            symbol,
            side,
            quantity,
            price,
        } = candidate;

        if !self.symbols.exists(&symbol) {
            return Err(ValidationError::InvalidSymbol(symbol));
        }
        let side = side.parse::<Side>()?;
        let quantity = u64::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(ValidationError::InvalidQuantity(quantity))?;
        if price <= Decimal::ZERO {
            return Err(ValidationError::InvalidPrice(price));
        }

        let mut state = self.state.write();
        let order = Order {
            id: state.next_id,
            subject_id,
            symbol,
            side,
            quantity,
            price,
            submitted_at: Utc::now(),
        };
        state.next_id += 1;
        state.orders.push(order.clone());

        Ok(order)
    }

    /// Every order in insertion order.
    #[must_use]
    pub fn list_all(&self) -> Vec<Order> {
        self.state.read().orders.clone()
    }

    /// Orders submitted by `subject_id`, in insertion order.
    #[must_use]
    pub fn list_by_subject(&self, subject_id: &str) -> Vec<Order> {
        self.state
            .read()
            .orders
            .iter()
            .filter(|order| order.subject_id == subject_id)
            .cloned()
            .collect()
    }

    /// Number of recorded orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().orders.len()
    }

    /// Whether no orders have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().orders.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
