//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the background services that drive the domain and
//! the port interfaces that adapters implement.

/// Port interfaces for subscriber transports and authentication.
pub mod ports;

/// Application services (price mutation).
pub mod services;
