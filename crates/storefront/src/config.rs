//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional; defaults target a backend running locally.
//!
//! - `TIENDA_API_URL` - Backend API base URL (default: `http://localhost:5000/api`)
//! - `TIENDA_DATA_DIR` - Directory for the local store (default: `.tienda`)
//! - `TIENDA_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `TIENDA_CATALOG_CACHE_TTL_SECS` - Catalog cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate, 0.0-1.0 (default: 1.0)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_DATA_DIR: &str = ".tienda";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CATALOG_CACHE_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend API base URL, always ending in `/` so relative joins append
    pub api_url: Url,
    /// Directory holding the local store files
    pub data_dir: PathBuf,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
    /// How long catalog responses are cached
    pub catalog_cache_ttl: Duration,
    /// Sentry error tracking configuration
    pub sentry: SentryConfig,
}

/// Sentry error tracking configuration.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    /// Sentry DSN; tracking is disabled when absent
    pub dsn: Option<String>,
    /// Environment tag (e.g. "production")
    pub environment: Option<String>,
    /// Error event sample rate
    pub sample_rate: f32,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url(&get_env_or_default("TIENDA_API_URL", DEFAULT_API_URL))
            .map_err(|e| ConfigError::InvalidEnvVar("TIENDA_API_URL".to_string(), e))?;
        let data_dir = PathBuf::from(get_env_or_default("TIENDA_DATA_DIR", DEFAULT_DATA_DIR));
        let http_timeout =
            Duration::from_secs(get_u64_or_default("TIENDA_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?);
        let catalog_cache_ttl = Duration::from_secs(get_u64_or_default(
            "TIENDA_CATALOG_CACHE_TTL_SECS",
            DEFAULT_CATALOG_CACHE_TTL_SECS,
        )?);

        Ok(Self {
            api_url,
            data_dir,
            http_timeout,
            catalog_cache_ttl,
            sentry: SentryConfig::from_env()?,
        })
    }

    /// Configuration pointing at `api_url` with every other setting defaulted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `api_url` is not an absolute http(s) URL.
    pub fn for_api_url(api_url: &str, data_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_api_url(api_url)
                .map_err(|e| ConfigError::InvalidEnvVar("TIENDA_API_URL".to_string(), e))?,
            data_dir: data_dir.into(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_CACHE_TTL_SECS),
            sentry: SentryConfig {
                sample_rate: 1.0,
                ..SentryConfig::default()
            },
        })
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let sample_rate = get_env_or_default("SENTRY_SAMPLE_RATE", "1.0")
            .parse::<f32>()
            .ok()
            .filter(|rate| (0.0..=1.0).contains(rate))
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "SENTRY_SAMPLE_RATE".to_string(),
                    "must be a number between 0.0 and 1.0".to_string(),
                )
            })?;

        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the API base URL and make sure it ends with a slash.
///
/// `Url::join` replaces the last path segment unless the base ends in `/`,
/// so `http://host/api` + `carts` would otherwise become `http://host/carts`.
fn parse_api_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {:?}", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get a numeric environment variable with a default value.
fn get_u64_or_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |v| {
        v.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}
