//! Configuration Module
//!
//! Loads backing store connection settings and engine parameters from
//! environment variables, with defaults suited to local development.

use std::env;
use std::str::FromStr;
use std::time::Duration;

// == Store Settings ==
/// Connection settings for the L2 backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Backing store host
    pub host: String,
    /// Backing store port
    pub port: u16,
    /// Optional credential
    pub password: Option<String>,
    /// Logical database index
    pub db: i64,
    /// Reconnect attempts made by the connection manager
    pub connect_retries: usize,
    /// Extra attempts for an idempotent command after a transient failure
    pub max_retries_per_request: u32,
    /// Per-command response timeout in milliseconds
    pub response_timeout_ms: u64,
    /// Defer connecting until the first command
    pub lazy_connect: bool,
    /// Issue a PING right after connecting and fail if it is not answered
    pub ready_check: bool,
}

impl StoreSettings {
    /// Builds a `redis://` URL from the individual parts.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                urlencoding::encode(password),
                self.host,
                self.port,
                self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            db: 0,
            connect_retries: 3,
            max_retries_per_request: 2,
            response_timeout_ms: 500,
            lazy_connect: true,
            ready_check: true,
        }
    }
}

// == Config ==
/// Process-wide cache configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// L2 connection settings shared by every engine instance
    pub store: StoreSettings,
    /// Namespace prepended to every key, before the category prefix
    pub key_prefix: String,
    /// Engine-wide default TTL in seconds
    pub default_ttl: u64,
    /// Maximum number of entries in each engine's L1
    pub l1_capacity: usize,
    /// Coalesce concurrent misses on the same key
    pub single_flight: bool,
    /// Admin HTTP port
    pub admin_port: u16,
    /// Maintenance task interval in seconds
    pub maintenance_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_HOST` (default: 127.0.0.1), `REDIS_PORT` (default: 6379)
    /// - `REDIS_PASSWORD` (default: none), `REDIS_DB` (default: 0)
    /// - `REDIS_CONNECT_RETRIES` (default: 3)
    /// - `REDIS_MAX_RETRIES_PER_REQUEST` (default: 2)
    /// - `REDIS_RESPONSE_TIMEOUT_MS` (default: 500)
    /// - `REDIS_LAZY_CONNECT` (default: true), `REDIS_READY_CHECK` (default: true)
    /// - `CACHE_KEY_PREFIX` (default: empty)
    /// - `CACHE_DEFAULT_TTL` seconds (default: 300)
    /// - `CACHE_L1_CAPACITY` entries (default: 1000)
    /// - `CACHE_SINGLE_FLIGHT` (default: true)
    /// - `ADMIN_PORT` (default: 3000)
    /// - `MAINTENANCE_INTERVAL` seconds (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let store = StoreSettings {
            host: env::var("REDIS_HOST").unwrap_or(defaults.store.host),
            port: parse_var("REDIS_PORT", defaults.store.port),
            password: env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
            db: parse_var("REDIS_DB", defaults.store.db),
            connect_retries: parse_var("REDIS_CONNECT_RETRIES", defaults.store.connect_retries),
            max_retries_per_request: parse_var(
                "REDIS_MAX_RETRIES_PER_REQUEST",
                defaults.store.max_retries_per_request,
            ),
            response_timeout_ms: parse_var(
                "REDIS_RESPONSE_TIMEOUT_MS",
                defaults.store.response_timeout_ms,
            ),
            lazy_connect: parse_var("REDIS_LAZY_CONNECT", defaults.store.lazy_connect),
            ready_check: parse_var("REDIS_READY_CHECK", defaults.store.ready_check),
        };

        Self {
            store,
            key_prefix: env::var("CACHE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            default_ttl: parse_var("CACHE_DEFAULT_TTL", defaults.default_ttl),
            l1_capacity: parse_var("CACHE_L1_CAPACITY", defaults.l1_capacity),
            single_flight: parse_var("CACHE_SINGLE_FLIGHT", defaults.single_flight),
            admin_port: parse_var("ADMIN_PORT", defaults.admin_port),
            maintenance_interval: parse_var("MAINTENANCE_INTERVAL", defaults.maintenance_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            key_prefix: String::new(),
            default_ttl: 300,
            l1_capacity: 1000,
            single_flight: true,
            admin_port: 3000,
            maintenance_interval: 30,
        }
    }
}

/// Reads and parses an environment variable, falling back to `default` when
/// it is unset or malformed.
fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
