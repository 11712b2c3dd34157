//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::SimulatedGateway;
use saga::CheckoutConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json`
/// - `DATABASE_URL`: PostgreSQL event store; in-memory when unset
/// - `INVENTORY_SERVICE_URL`, `ORDER_SERVICE_URL`: remote collaborators;
///   in-process when unset
/// - `UPSTREAM_TIMEOUT_SECS`, `RESERVATION_TTL_SECS`,
///   `PAYMENT_DEADLINE_SECS`, `SWEEP_INTERVAL_SECS`
/// - `GATEWAY_LIMIT_UNITS`: settlement ceiling in whole currency units
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub inventory_service_url: Option<String>,
    pub order_service_url: Option<String>,
    pub upstream_timeout: Duration,
    pub reservation_ttl: Duration,
    pub payment_deadline: Duration,
    pub sweep_interval: Duration,
    pub gateway_limit_units: i64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unparseable values fall back to
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str, default: Duration| {
            non_empty(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match non_empty("LOG_FORMAT").as_deref().map(str::trim) {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: non_empty("DATABASE_URL"),
            inventory_service_url: non_empty("INVENTORY_SERVICE_URL"),
            order_service_url: non_empty("ORDER_SERVICE_URL"),
            upstream_timeout: secs("UPSTREAM_TIMEOUT_SECS", defaults.upstream_timeout),
            reservation_ttl: secs("RESERVATION_TTL_SECS", defaults.reservation_ttl),
            payment_deadline: secs("PAYMENT_DEADLINE_SECS", defaults.payment_deadline),
            sweep_interval: secs("SWEEP_INTERVAL_SECS", defaults.sweep_interval),
            gateway_limit_units: non_empty("GATEWAY_LIMIT_UNITS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.gateway_limit_units),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn checkout_config(&self) -> CheckoutConfig {
        CheckoutConfig {
            reservation_ttl: self.reservation_ttl,
            payment_deadline: self.payment_deadline,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let checkout = CheckoutConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            inventory_service_url: None,
            order_service_url: None,
            upstream_timeout: Duration::from_secs(10),
            reservation_ttl: checkout.reservation_ttl,
            payment_deadline: checkout.payment_deadline,
            sweep_interval: Duration::from_secs(60),
            gateway_limit_units: SimulatedGateway::DEFAULT_LIMIT_UNITS,
        }
    }
}
