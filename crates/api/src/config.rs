//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `pretty` or `json` (default: `pretty`)
/// - `DATABASE_URL` — PostgreSQL URL; in-memory stores when unset
/// - `ORDER_TTL_MINUTES` — how long unpaid orders are held (default: `30`)
/// - `STOCK_RETRY_ATTEMPTS` — reservation attempts under contention (default: `5`)
/// - `SWEEP_INTERVAL_SECS` — expired order sweep period (default: `60`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub order_ttl_minutes: i64,
    pub stock_retry_attempts: u32,
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(lookup("PORT")).unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse_var(lookup("LOG_FORMAT")).unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            order_ttl_minutes: parse_var(lookup("ORDER_TTL_MINUTES"))
                .filter(|m: &i64| *m > 0)
                .unwrap_or(defaults.order_ttl_minutes),
            stock_retry_attempts: parse_var(lookup("STOCK_RETRY_ATTEMPTS"))
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.stock_retry_attempts),
            sweep_interval_secs: parse_var(lookup("SWEEP_INTERVAL_SECS"))
                .filter(|s: &u64| *s > 0)
                .unwrap_or(defaults.sweep_interval_secs),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns how long unpaid orders are held.
    pub fn order_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.order_ttl_minutes)
    }

    /// Returns the sweep period.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse_var<T: FromStr>(raw: Option<String>) -> Option<T> {
    raw.and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            order_ttl_minutes: 30,
            stock_retry_attempts: 5,
            sweep_interval_secs: 60,
        }
    }
}
