//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SEGISHOP_API_BASE_URL` - Root URL of the Segishop REST API (e.g. `https://api.segishop.com/api`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `SEGISHOP_API_TOKEN` - Service token sent as a bearer header
//! - `SEGISHOP_API_TIMEOUT_SECS` - Per-request timeout for API calls (default: 15)
//! - `CHECKOUT_FREE_SHIPPING_THRESHOLD` - Estimate-tier free shipping threshold (default: 120.00)
//! - `CHECKOUT_FLAT_SHIPPING_RATE` - Estimate-tier flat shipping rate (default: 8.99)
//! - `CHECKOUT_DEFAULT_TAX_RATE` - Estimate-tier tax rate (default: 0.08)
//! - `CHECKOUT_SESSION_TTL_SECS` - Idle lifetime of a shopper's cart and checkout (default: 1800)
//! - `SHIPPING_QUOTE_CACHE_TTL_SECS` - Lifetime of cached shipping options (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::checkout::PricingRules;

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
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Segishop REST API configuration
    pub api: ApiConfig,
    /// Estimate-tier pricing constants
    pub pricing: PricingRules,
    /// Idle lifetime of per-shopper state
    pub checkout_session_ttl: Duration,
    /// Lifetime of cached shipping option responses
    pub shipping_quote_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Segishop REST API configuration.
///
/// Implements `Debug` manually to redact the service token.
#[derive(Clone)]
pub struct ApiConfig {
    /// API root; endpoint paths are joined onto it
    pub base_url: Url,
    /// Optional service token
    pub token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
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

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host = env.parsed_or("STOREFRONT_HOST", "127.0.0.1")?;
        let port = env.parsed_or("STOREFRONT_PORT", "3000")?;
        let base_url = env.required("STOREFRONT_BASE_URL")?;

        let api = ApiConfig {
            base_url: parse_api_base_url(&env.required("SEGISHOP_API_BASE_URL")?)?,
            token: env.optional("SEGISHOP_API_TOKEN").map(SecretString::from),
            timeout: Duration::from_secs(env.parsed_or("SEGISHOP_API_TIMEOUT_SECS", "15")?),
        };

        let defaults = PricingRules::default();
        let pricing = PricingRules {
            free_shipping_threshold: env.decimal_or(
                "CHECKOUT_FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            )?,
            flat_shipping_rate: env
                .decimal_or("CHECKOUT_FLAT_SHIPPING_RATE", defaults.flat_shipping_rate)?,
            default_tax_rate: env.decimal_or("CHECKOUT_DEFAULT_TAX_RATE", defaults.default_tax_rate)?,
        };
        if pricing.default_tax_rate.is_sign_negative()
            || pricing.flat_shipping_rate.is_sign_negative()
            || pricing.free_shipping_threshold.is_sign_negative()
        {
            return Err(ConfigError::InvalidEnvVar(
                "CHECKOUT_*".to_string(),
                "pricing constants must not be negative".to_string(),
            ));
        }

        Ok(Self {
            host,
            port,
            base_url,
            api,
            pricing,
            checkout_session_ttl: Duration::from_secs(
                env.parsed_or("CHECKOUT_SESSION_TTL_SECS", "1800")?,
            ),
            shipping_quote_cache_ttl: Duration::from_secs(
                env.parsed_or("SHIPPING_QUOTE_CACHE_TTL_SECS", "60")?,
            ),
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env.parsed_or("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: env.parsed_or("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should be marked `Secure`.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn parsed_or<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.optional(key).unwrap_or_else(|| default.to_string());
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    fn decimal_or(&self, key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
        self.optional(key).map_or(Ok(default), |raw| {
            Decimal::from_str(raw.trim())
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

/// Parse the API root, forcing a trailing slash so `Url::join` appends paths.
fn parse_api_base_url(raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| {
        ConfigError::InvalidEnvVar("SEGISHOP_API_BASE_URL".to_string(), e.to_string())
    })
}
