//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_API_BASE_URL` - Base URL of the Shopfront backend
//!
//! ## Optional
//! - `STOREFRONT_DATA_DIR` - Directory for device-local state (default: .shopfront)
//! - `STOREFRONT_REQUEST_TIMEOUT_MS` - Per-request timeout (default: 10000)
//! - `STOREFRONT_RETRY_DELAY_MS` - Delay before the single cart retry (default: 500)
//! - `STOREFRONT_TOKEN_RETRY_DELAY_MS` - Delay before the device token retry (default: 30000)
//! - `STOREFRONT_STOCK_CACHE_TTL_SECS` - Stock snapshot cache lifetime (default: 30)

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

/// Shopper-side engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Backend base URL, always ending in `/`
    pub api_base_url: Url,
    /// Directory holding the device-local key-value files
    pub data_dir: PathBuf,
    /// Timeout applied to every backend request
    pub request_timeout: Duration,
    /// Delay before retrying a failed cart write once
    pub retry_delay: Duration,
    /// Delay before retrying a failed device token registration once
    pub token_retry_delay: Duration,
    /// How long a stock snapshot may be served from cache
    pub stock_cache_ttl: Duration,
}

impl EngineConfig {
    /// Configuration with default timings for the given backend.
    #[must_use]
    pub fn new(api_base_url: Url, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_base_url: normalize_base_url(api_base_url),
            data_dir: data_dir.into(),
            request_timeout: Duration::from_millis(10_000),
            retry_delay: Duration::from_millis(500),
            token_retry_delay: Duration::from_millis(30_000),
            stock_cache_ttl: Duration::from_secs(30),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base URL is missing or any value fails to
    /// parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let api_base_url = get_required_env("STOREFRONT_API_BASE_URL")?;
        let api_base_url = Url::parse(&api_base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_API_BASE_URL".to_string(), e.to_string())
        })?;
        if !matches!(api_base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_API_BASE_URL".to_string(),
                format!("unsupported scheme '{}'", api_base_url.scheme()),
            ));
        }

        let data_dir = get_env_or_default("STOREFRONT_DATA_DIR", ".shopfront");

        Ok(Self {
            request_timeout: Duration::from_millis(parse_env(
                "STOREFRONT_REQUEST_TIMEOUT_MS",
                10_000,
            )?),
            retry_delay: Duration::from_millis(parse_env("STOREFRONT_RETRY_DELAY_MS", 500)?),
            token_retry_delay: Duration::from_millis(parse_env(
                "STOREFRONT_TOKEN_RETRY_DELAY_MS",
                30_000,
            )?),
            stock_cache_ttl: Duration::from_secs(parse_env("STOREFRONT_STOCK_CACHE_TTL_SECS", 30)?),
            ..Self::new(api_base_url, data_dir)
        })
    }
}

/// `Url::join` drops the last path segment unless the base ends in `/`.
fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, falling back to `default`.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key).map_or(Ok(default), |value| {
        value
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}
