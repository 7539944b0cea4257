//! Domain Layer - Price state and order records.
//!
//! Pure in-process types with no I/O. Locks are `parking_lot` and are never
//! held across an `.await`.

/// Price table, snapshots and the perturbation policy.
pub mod pricing;

/// Append-only order ledger and order validation.
pub mod ledger;
