//! Application configuration structures.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::{DEFAULT_CURRENCY, DEFAULT_WINDOW_SIZE};

use super::validation::{ConfigError, check_unit_price, check_window_size, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default price per kWh.
pub const DEFAULT_UNIT_PRICE: f64 = 7.5;

/// Default upper bound for a caller-supplied price per kWh.
pub const DEFAULT_MAX_UNIT_PRICE: f64 = 50.0;

/// Default refresh interval advertised to dashboards (5 seconds).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Minimum refresh interval (1 second).
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Maximum refresh interval (5 minutes).
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

fn default_data_dir() -> String {
    "data/".to_string()
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_unit_price() -> f64 {
    DEFAULT_UNIT_PRICE
}

fn default_max_unit_price() -> f64 {
    DEFAULT_MAX_UNIT_PRICE
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_refresh_interval() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 8080).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

// =============================================================================
// Data Configuration
// =============================================================================

/// Device log location and live-view settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding one `<device>.csv` log per device (default: "data/").
    #[serde(default = "default_data_dir")]
    pub dir: String,

    /// Number of samples in the recent window (default: 10).
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

// =============================================================================
// Billing Configuration
// =============================================================================

/// Pricing used for cost estimates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Price per kWh when a request does not supply one (default: 7.5).
    #[serde(default = "default_unit_price")]
    pub unit_price: f64,

    /// Largest price per kWh a request may supply (default: 50.0).
    #[serde(default = "default_max_unit_price")]
    pub max_unit_price: f64,

    /// Currency label for summaries (default: "BDT").
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            unit_price: DEFAULT_UNIT_PRICE,
            max_unit_price: DEFAULT_MAX_UNIT_PRICE,
            currency: default_currency(),
        }
    }
}

impl BillingConfig {
    /// Check a per-request unit price against this configuration's bound.
    pub fn check_price(&self, price: f64) -> Result<f64, String> {
        check_unit_price(price, self.max_unit_price)
    }
}

// =============================================================================
// Dashboard Configuration
// =============================================================================

/// Settings handed to presentation clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// How often clients should re-fetch (default: 5s, range: 1s..=300s).
    #[serde(default = "default_refresh_interval", with = "humantime_serde")]
    pub refresh_interval: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Device log configuration.
    #[serde(default)]
    pub data: DataConfig,

    /// Pricing configuration.
    #[serde(default)]
    pub billing: BillingConfig,

    /// Presentation client configuration.
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(&expand_env_vars(content))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate server bind address
        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;

        // Validate server port
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server port must be non-zero".to_string(),
            ));
        }

        if self.data.dir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "data dir must not be empty".to_string(),
            ));
        }

        check_window_size(self.data.window_size)
            .map_err(|e| ConfigError::ValidationError(format!("data window_size: {}", e)))?;

        let billing = &self.billing;
        if !billing.max_unit_price.is_finite() || billing.max_unit_price < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "billing max_unit_price must be a non-negative number, got {}",
                billing.max_unit_price
            )));
        }

        billing
            .check_price(billing.unit_price)
            .map_err(|e| ConfigError::ValidationError(format!("billing unit_price: {}", e)))?;

        if billing.currency.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "billing currency must not be empty".to_string(),
            ));
        }

        let interval = self.dashboard.refresh_interval;
        if !(MIN_REFRESH_INTERVAL..=MAX_REFRESH_INTERVAL).contains(&interval) {
            return Err(ConfigError::ValidationError(format!(
                "dashboard refresh_interval must be between {:?} and {:?}, got {:?}",
                MIN_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL, interval
            )));
        }

        Ok(())
    }
}
