//! Configuration validation utilities.
//!
//! The value checks here are shared by the config file loader, the CLI
//! overrides and the HTTP query parameters, so a price or window accepted by
//! one surface is accepted by all of them.

use std::time::Duration;

use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Parse duration string using humantime.
///
/// Supports `30s`, `1m`, `5m30s`, `1h`, `100ms` and the other humantime forms.
///
/// # Examples
///
/// ```
/// use wattwatch::config::parse_duration;
///
/// assert_eq!(parse_duration("5s").unwrap().as_secs(), 5);
/// assert_eq!(parse_duration("1m").unwrap().as_secs(), 60);
/// assert_eq!(parse_duration("2m30s").unwrap().as_secs(), 150);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Check a unit price (per kWh) against `[0, max]`.
///
/// # Examples
///
/// ```
/// use wattwatch::config::check_unit_price;
///
/// assert_eq!(check_unit_price(7.5, 50.0), Ok(7.5));
/// assert!(check_unit_price(-1.0, 50.0).is_err());
/// ```
pub fn check_unit_price(price: f64, max: f64) -> Result<f64, String> {
    if !price.is_finite() {
        return Err(format!("unit price must be a finite number, got {price}"));
    }
    if !(0.0..=max).contains(&price) {
        return Err(format!("unit price must be within [0, {max}], got {price}"));
    }
    Ok(price)
}

/// Check a recent-window length. Zero is rejected.
pub fn check_window_size(window: usize) -> Result<usize, String> {
    if window == 0 {
        return Err("window size must be positive".to_string());
    }
    Ok(window)
}

/// Expand environment variables in a string.
/// Supports ${VAR} and ${VAR:-default} syntax.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}
