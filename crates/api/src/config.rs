//! Application configuration loaded from environment variables.

use std::time::Duration;

use billing::BillingConfig;
use common::Money;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// A catalog item to load at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub sku: String,
    pub name: String,
    pub price: Money,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` bind address (default: `"0.0.0.0"`)
/// - `PORT` listen port (default: `3000`)
/// - `RUST_LOG` tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` `plain` or `json` (default: `plain`)
/// - `DATABASE_URL` PostgreSQL URL; the in-memory store is used when unset
/// - `DATABASE_MAX_CONNECTIONS` pool size (default: `5`)
/// - `BILLING_URL` remote billing API for shipments; billed in-process when unset
/// - `BILLING_TIMEOUT_MS` request timeout for the remote billing API (default: `10000`)
/// - `ALLOW_PRICE_OVERRIDE` accept caller-supplied unit prices (default: `true`)
/// - `CATALOG_SEED` items to upsert at startup, as `SKU:name:cents` separated by commas
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub billing_url: Option<String>,
    pub billing_timeout: Duration,
    pub billing: BillingConfig,
    pub catalog_seed: Vec<CatalogEntry>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match non_empty("LOG_FORMAT").as_deref() {
                Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Plain,
            },
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: non_empty("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            billing_url: non_empty("BILLING_URL"),
            billing_timeout: non_empty("BILLING_TIMEOUT_MS")
                .and_then(|ms| ms.parse().ok())
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.billing_timeout),
            billing: BillingConfig {
                allow_price_override: non_empty("ALLOW_PRICE_OVERRIDE")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.billing.allow_price_override),
            },
            catalog_seed: non_empty("CATALOG_SEED")
                .map(|seed| parse_catalog(&seed))
                .unwrap_or_default(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Plain,
            database_url: None,
            database_max_connections: 5,
            billing_url: None,
            billing_timeout: Duration::from_secs(10),
            billing: BillingConfig::default(),
            catalog_seed: Vec::new(),
        }
    }
}

/// Parses `SKU:name:cents` entries. Malformed entries are skipped.
fn parse_catalog(seed: &str) -> Vec<CatalogEntry> {
    seed.split(',')
        .filter_map(|entry| {
            let mut parts = entry.trim().splitn(3, ':');
            let sku = parts.next()?.trim();
            let name = parts.next()?.trim();
            let cents: i64 = parts.next()?.trim().parse().ok()?;
            if sku.is_empty() || cents <= 0 {
                return None;
            }
            Some(CatalogEntry {
                sku: sku.to_string(),
                name: name.to_string(),
                price: Money::from_cents(cents),
            })
        })
        .collect()
}
