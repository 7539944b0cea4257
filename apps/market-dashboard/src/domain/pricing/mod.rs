//! Price State Engine
//!
//! Domain types for the simulated price table: the `Stock` record, immutable
//! `PriceSnapshot` values, the perturbation policy seam, and the `PriceStore`
//! that owns the live table.
//!
//! # Design
//!
//! The store keeps every symbol behind a single `RwLock` so a tick is applied
//! to the whole table in one exclusive pass. Readers either see the table
//! before the tick or after it, never a mix. Snapshots are built from fresh
//! copies of the rows and carry the store's tick sequence, which lets
//! downstream consumers discard anything older than what they already have.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize, Serializer};

// =============================================================================
// Types
// =============================================================================

/// A ticker symbol (e.g. `AAPL`).
pub type Symbol = String;

/// Number of decimal places kept on prices.
pub const PRICE_SCALE: u32 = 2;

/// Number of decimal places kept on the change percentage.
pub const CHANGE_SCALE: u32 = 4;

/// Floor applied when a perturbation would produce a non-positive price.
pub const MIN_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, PRICE_SCALE);

/// Symbols seeded at startup, as `(symbol, price in cents)`.
pub const DEFAULT_WATCHLIST: &[(&str, i64)] = &[
    ("AAPL", 17_550),
    ("TSLA", 24_280),
    ("AMZN", 14_530),
    ("INFY", 1_875),
    ("TCS", 364_520),
];

/// A tracked stock and its latest simulated price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Last price, always strictly positive.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Percentage change applied by the most recent tick.
    #[serde(rename = "change", with = "rust_decimal::serde::float")]
    pub change_percent: Decimal,
}

impl Stock {
    /// Create a stock with no recorded change.
    #[must_use]
    pub fn new(symbol: impl Into<Symbol>, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change_percent: Decimal::ZERO,
        }
    }
}

// =============================================================================
// Price Snapshot
// =============================================================================

/// Immutable point-in-time copy of the whole price table.
///
/// Cloning is cheap; the rows are shared behind an `Arc` and never mutated.
/// Serializes as the bare `{symbol: Stock}` object streamed to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSnapshot {
    sequence: u64,
    taken_at: DateTime<Utc>,
    stocks: Arc<BTreeMap<Symbol, Stock>>,
}

impl PriceSnapshot {
    /// Build a snapshot from a set of rows.
    #[must_use]
    pub fn new(sequence: u64, stocks: BTreeMap<Symbol, Stock>) -> Self {
        Self {
            sequence,
            taken_at: Utc::now(),
            stocks: Arc::new(stocks),
        }
    }

    /// Tick counter of the store when this snapshot was taken.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Wall-clock time the snapshot was taken.
    #[must_use]
    pub const fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// All rows keyed by symbol.
    #[must_use]
    pub fn stocks(&self) -> &BTreeMap<Symbol, Stock> {
        &self.stocks
    }

    /// Look up a single row.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<&Stock> {
        self.stocks.get(symbol)
    }

    /// Number of symbols in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    /// Whether the snapshot holds no symbols.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }

    /// Rows as a list in symbol order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Stock> {
        self.stocks.values().cloned().collect()
    }

    /// Encode the `{symbol: Stock}` object sent to streaming clients.
    ///
    /// # Errors
    ///
    /// Returns an error if a row cannot be encoded.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Serialize for PriceSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.stocks.as_ref().serialize(serializer)
    }
}

// =============================================================================
// Perturbation Policy
// =============================================================================

/// Source of per-tick relative price changes.
///
/// Returns the fraction to apply (`0.01` means +1%). Any closure
/// `Fn(&Stock) -> Decimal` is a policy, which keeps tests deterministic.
pub trait PricePolicy: Send + Sync {
    /// Relative change for the next tick of `stock`.
    fn next_change(&self, stock: &Stock) -> Decimal;
}

impl<F> PricePolicy for F
where
    F: Fn(&Stock) -> Decimal + Send + Sync,
{
    fn next_change(&self, stock: &Stock) -> Decimal {
        self(stock)
    }
}

/// Uniform random walk bounded to `±max_change_bps` basis points.
#[derive(Debug, Clone, Copy)]
pub struct UniformDrift {
    bound: f64,
}

impl UniformDrift {
    /// Default bound: 200 bps (±2%).
    pub const DEFAULT_MAX_CHANGE_BPS: u32 = 200;

    /// Create a drift bounded to `max_change_bps` basis points either way.
    #[must_use]
    pub fn new(max_change_bps: u32) -> Self {
        Self {
            bound: f64::from(max_change_bps) / 10_000.0,
        }
    }

    /// Bound as a fraction (`0.02` for 200 bps).
    #[must_use]
    pub const fn bound(&self) -> f64 {
        self.bound
    }
}

impl Default for UniformDrift {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_CHANGE_BPS)
    }
}

impl PricePolicy for UniformDrift {
    fn next_change(&self, _stock: &Stock) -> Decimal {
        let draw: f64 = rand::rng().random_range(-self.bound..=self.bound);
        Decimal::try_from(draw).unwrap_or(Decimal::ZERO)
    }
}

/// Apply a relative change to `price`, truncating toward zero at two
/// decimals and clamping degenerate results to [`MIN_PRICE`].
#[must_use]
pub fn next_price(price: Decimal, change: Decimal) -> Decimal {
    let candidate = (Decimal::ONE + change)
        .checked_mul(price)
        .map_or(price, |p| {
            p.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::ToZero)
        });

    if candidate <= Decimal::ZERO {
        MIN_PRICE
    } else {
        candidate
    }
}

/// Realised change `(new / old - 1) * 100` at [`CHANGE_SCALE`] decimals.
#[must_use]
pub fn change_percent(old: Decimal, new: Decimal) -> Decimal {
    if old <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((new / old - Decimal::ONE) * Decimal::ONE_HUNDRED).round_dp(CHANGE_SCALE)
}

// =============================================================================
// Symbol Directory
// =============================================================================

/// Read-only membership check over the tracked symbols.
pub trait SymbolDirectory: Send + Sync {
    /// Whether `symbol` is tracked.
    fn exists(&self, symbol: &str) -> bool;
}

// =============================================================================
// Price Store
// =============================================================================

#[derive(Debug, Default)]
struct PriceTable {
    sequence: u64,
    stocks: BTreeMap<Symbol, Stock>,
}

impl PriceTable {
    fn snapshot(&self) -> PriceSnapshot {
        PriceSnapshot::new(self.sequence, self.stocks.clone())
    }
}

/// Owner of the live price table.
///
/// # Example
///
/// ```rust
/// use market_dashboard::domain::pricing::{PriceStore, Stock};
/// use rust_decimal::Decimal;
///
/// let store = PriceStore::with_default_watchlist();
/// assert!(store.exists("AAPL"));
///
/// // Flat policy: +1% on every symbol
/// let snapshot = store.apply_changes(&|_: &Stock| Decimal::new(1, 2));
/// assert_eq!(snapshot.sequence(), 1);
/// assert_eq!(snapshot.get("AAPL").unwrap().price, Decimal::new(17725, 2));
/// ```
#[derive(Debug)]
pub struct PriceStore {
    table: RwLock<PriceTable>,
}

impl PriceStore {
    /// Create a store seeded with `(symbol, price)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `PricingError` if a seed price is not strictly positive or a
    /// symbol appears twice.
    pub fn new<I, S>(seed: I) -> Result<Self, PricingError>
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<Symbol>,
    {
        let mut stocks = BTreeMap::new();
        for (symbol, price) in seed {
            let symbol = symbol.into();
            if price <= Decimal::ZERO {
                return Err(PricingError::NonPositivePrice { symbol, price });
            }
            if stocks.contains_key(&symbol) {
                return Err(PricingError::DuplicateSymbol(symbol));
            }
            stocks.insert(symbol.clone(), Stock::new(symbol, price));
        }

        Ok(Self {
            table: RwLock::new(PriceTable {
                sequence: 0,
                stocks,
            }),
        })
    }

    /// Create a store seeded with [`DEFAULT_WATCHLIST`].
    #[must_use]
    pub fn with_default_watchlist() -> Self {
        let stocks = DEFAULT_WATCHLIST
            .iter()
            .map(|(symbol, cents)| {
                let symbol = (*symbol).to_string();
                (symbol.clone(), Stock::new(symbol, Decimal::new(*cents, PRICE_SCALE)))
            })
            .collect();

        Self {
            table: RwLock::new(PriceTable {
                sequence: 0,
                stocks,
            }),
        }
    }

    /// Consistent copy of every row.
    #[must_use]
    pub fn snapshot(&self) -> PriceSnapshot {
        self.table.read().snapshot()
    }

    /// Apply one tick of `policy` to every symbol.
    ///
    /// Holds the write lock for the whole pass. Prices are truncated to two
    /// decimals and never drop below [`MIN_PRICE`], whatever the policy
    /// returns.
    pub fn apply_changes(&self, policy: &dyn PricePolicy) -> PriceSnapshot {
        let mut table = self.table.write();

        for stock in table.stocks.values_mut() {
            let change = policy.next_change(stock);
            let price = next_price(stock.price, change);
            stock.change_percent = change_percent(stock.price, price);
            stock.price = price;
        }
        table.sequence += 1;

        table.snapshot()
    }

    /// Whether `symbol` is tracked.
    #[must_use]
    pub fn exists(&self, symbol: &str) -> bool {
        self.table.read().stocks.contains_key(symbol)
    }

    /// Current tick sequence (0 before the first tick).
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.table.read().sequence
    }

    /// Tracked symbols in sorted order.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        self.table.read().stocks.keys().cloned().collect()
    }

    /// Number of tracked symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().stocks.len()
    }

    /// Whether no symbols are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.read().stocks.is_empty()
    }
}

impl SymbolDirectory for PriceStore {
    fn exists(&self, symbol: &str) -> bool {
        Self::exists(self, symbol)
    }
}

/// Errors raised while seeding the store.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    /// Seed price was zero or negative.
    #[error("seed price for {symbol} must be positive, got {price}")]
    NonPositivePrice {
        /// Offending symbol.
        symbol: Symbol,
        /// Offending price.
        price: Decimal,
    },
    /// Symbol listed more than once.
    #[error("duplicate seed symbol: {0}")]
    DuplicateSymbol(Symbol),
}

// =============================================================================
// Tests
// =============================================================================
