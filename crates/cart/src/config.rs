//! Cart engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_API_URL` - Base URL of the storefront cart API
//!
//! ## Optional
//! - `SHOPFRONT_CART_DIR` - Local cart directory (default: .shopfront)
//! - `SHOPFRONT_HTTP_TIMEOUT_SECS` - Remote request timeout (default: 10)
//! - `SHOPFRONT_OUTBOX_BASE_DELAY_MS` - First retry delay (default: 500)
//! - `SHOPFRONT_OUTBOX_MAX_DELAY_MS` - Retry delay ceiling (default: 30000)
//! - `SHOPFRONT_OUTBOX_POLL_MS` - Idle poll interval of the outbox worker (default: 1000)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart engine configuration.
#[derive(Debug, Clone)]
pub struct CartSyncConfig {
    /// Base URL of the storefront cart API
    pub api_url: Url,
    /// Directory holding the session ID, cart snapshots and the outbox
    pub cart_dir: PathBuf,
    /// Timeout applied to each remote request
    pub http_timeout: Duration,
    /// Outbox retry behaviour
    pub outbox: OutboxConfig,
}

/// Outbox worker retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboxConfig {
    /// Delay before the first retry after a failed delivery
    pub base_delay: Duration,
    /// Upper bound on the retry delay
    pub max_delay: Duration,
    /// How often the worker checks the outbox when idle
    pub poll_interval: Duration,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl CartSyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url(&get_required_env("SHOPFRONT_API_URL")?)?;
        let cart_dir = PathBuf::from(get_env_or_default("SHOPFRONT_CART_DIR", ".shopfront"));
        let http_timeout = Duration::from_secs(get_parsed_or_default(
            "SHOPFRONT_HTTP_TIMEOUT_SECS",
            10_u64,
        )?);

        Ok(Self {
            api_url,
            cart_dir,
            http_timeout,
            outbox: OutboxConfig::from_env()?,
        })
    }
}

impl OutboxConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let base_delay = Duration::from_millis(get_parsed_or_default(
            "SHOPFRONT_OUTBOX_BASE_DELAY_MS",
            duration_millis(defaults.base_delay),
        )?);
        let max_delay = Duration::from_millis(get_parsed_or_default(
            "SHOPFRONT_OUTBOX_MAX_DELAY_MS",
            duration_millis(defaults.max_delay),
        )?);
        let poll_interval = Duration::from_millis(get_parsed_or_default(
            "SHOPFRONT_OUTBOX_POLL_MS",
            duration_millis(defaults.poll_interval),
        )?);

        if max_delay < base_delay {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_OUTBOX_MAX_DELAY_MS".to_string(),
                "must not be smaller than SHOPFRONT_OUTBOX_BASE_DELAY_MS".to_string(),
            ));
        }

        Ok(Self {
            base_delay,
            max_delay,
            poll_interval,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse and validate the API base URL.
///
/// The URL must be an http(s) URL that can carry path segments.
fn parse_api_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar("SHOPFRONT_API_URL".to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            "SHOPFRONT_API_URL".to_string(),
            format!("expected an http(s) base URL, got '{value}'"),
        ));
    }

    Ok(url)
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an environment variable parsed as `T`, or `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
