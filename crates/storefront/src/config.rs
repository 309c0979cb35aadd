//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ROCKETSHOES_API_URL` - Base URL of the catalog/stock REST API
//!
//! ## Optional
//! - `ROCKETSHOES_STORAGE_DIR` - Directory for durable cart storage (default: .rocketshoes)
//! - `ROCKETSHOES_PRODUCT_CACHE_TTL_SECS` - Product definition cache TTL (default: 300)
//! - `ROCKETSHOES_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 10)
//! - `ROCKETSHOES_CHECK_STOCK_ON_FIRST_ADD` - Check stock before adding a new product (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_STORAGE_DIR: &str = ".rocketshoes";
const DEFAULT_PRODUCT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Catalog and stock API configuration
    pub api: ApiConfig,
    /// Cart behaviour
    pub cart: CartConfig,
    /// Directory holding the durable key-value storage
    pub storage_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Catalog and stock API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL; `/stock/{id}` and `/products/{id}` are resolved against it
    pub base_url: Url,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// How long product definitions stay cached
    pub product_cache_ttl: Duration,
}

/// Cart store behaviour.
#[derive(Debug, Clone, Copy)]
pub struct CartConfig {
    /// Check stock before adding the first unit of a product.
    ///
    /// Disabling this adds new products without a stock lookup.
    pub check_stock_on_first_add: bool,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            check_stock_on_first_add: true,
        }
    }
}

impl StorefrontConfig {
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

        let api = ApiConfig::from_env()?;
        let cart = CartConfig::from_env()?;
        let storage_dir = PathBuf::from(get_env_or_default("ROCKETSHOES_STORAGE_DIR", DEFAULT_STORAGE_DIR));
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            api,
            cart,
            storage_dir,
            sentry_dsn,
        })
    }
}

impl ApiConfig {
    /// Create an API configuration with default timeout and cache TTL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL cannot be parsed or
    /// is not http(s).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("ROCKETSHOES_API_URL", base_url)?,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            product_cache_ttl: Duration::from_secs(DEFAULT_PRODUCT_CACHE_TTL_SECS),
        })
    }

    fn from_env() -> Result<Self, ConfigError> {
        let raw = get_required_env("ROCKETSHOES_API_URL")?;
        let base_url = parse_base_url("ROCKETSHOES_API_URL", &raw)?;
        let request_timeout = Duration::from_secs(parse_env_or(
            "ROCKETSHOES_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        let product_cache_ttl = Duration::from_secs(parse_env_or(
            "ROCKETSHOES_PRODUCT_CACHE_TTL_SECS",
            DEFAULT_PRODUCT_CACHE_TTL_SECS,
        )?);

        Ok(Self {
            base_url,
            request_timeout,
            product_cache_ttl,
        })
    }
}

impl CartConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            check_stock_on_first_add: parse_env_or("ROCKETSHOES_CHECK_STOCK_ON_FIRST_ADD", true)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, falling back to `default`.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an API base URL.
///
/// A trailing slash is appended so relative paths join under the base path
/// instead of replacing its last segment.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
