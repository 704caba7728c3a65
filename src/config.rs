//! Configuration module for wattwatch.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (port, bind address)
//! - Data settings (device log directory, recent-window length)
//! - Billing settings (default unit price, price bound, currency label)
//! - Dashboard settings (advertised refresh interval)

mod app;
mod validation;

pub use app::{AppConfig, BillingConfig, DashboardConfig, DataConfig, ServerConfig};
pub use validation::{
    ConfigError, check_unit_price, check_window_size, expand_env_vars, parse_duration,
};

// Re-export constants
pub use app::{
    DEFAULT_MAX_UNIT_PRICE, DEFAULT_REFRESH_INTERVAL, DEFAULT_UNIT_PRICE, MAX_REFRESH_INTERVAL,
    MIN_REFRESH_INTERVAL,
};
