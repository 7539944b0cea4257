//! Configuration Module
//!
//! Configuration loading and dependency wiring for the dashboard service.

mod container;
mod settings;

pub use container::{AppContext, BackgroundTasks};
pub use settings::{
    AuthSettings, BroadcastSettings, ConfigError, DashboardConfig, PricingSettings,
    ServerSettings,
};
