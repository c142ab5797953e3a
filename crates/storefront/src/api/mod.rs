//! Segishop REST API client.
//!
//! One [`ApiClient`] implements every collaborator contract the checkout
//! consumes:
//!
//! | Contract | Endpoint |
//! |----------|----------|
//! | [`CartSource`](crate::cart::CartSource) via [`RemoteCart`] | `/Cart/{userId}` |
//! | [`ShippingService`](crate::checkout::ShippingService) | `POST /Shipping/calculate`, `POST /Shipping/calculate-totals` |
//! | [`CouponService`](crate::checkout::CouponService) | `POST /coupons/apply` |
//! | [`PaymentGateway`](crate::checkout::PaymentGateway) | `POST /payments/stripe/create-intent` |
//! | [`OrderService`](crate::checkout::OrderService) | `POST /orders` |
//! | [`AccountRegistrar`](crate::checkout::AccountRegistrar) | `POST /auth/register` |
//!
//! The API speaks camelCase JSON with plain numbers for money, except the
//! shipping controller which expects PascalCase request bodies.

mod auth;
mod cart;
mod coupons;
mod orders;
mod payments;
mod shipping;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::checkout::ShippingOption;
use crate::config::ApiConfig;

pub use cart::RemoteCart;

/// Errors that can occur when talking to the Segishop API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Endpoint path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// HTTP status returned by the API, if the request got that far.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Parse(_) | Self::Url(_) => None,
        }
    }
}

/// Segishop REST API client.
///
/// Cheap to clone; all clones share one connection pool and one shipping
/// option cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    /// Shipping options keyed by the serialized request body.
    options_cache: Cache<String, Vec<ShippingOption>>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &ApiConfig, options_cache_ttl: Duration) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let value = format!("Bearer {}", token.expose_secret());
            let mut value = HeaderValue::from_str(&value)
                .map_err(|e| ApiError::Parse(format!("Invalid API token format: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let options_cache = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(options_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                options_cache,
            }),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }

    fn options_cache(&self) -> &Cache<String, Vec<ShippingOption>> {
        &self.inner.options_cache
    }

    /// Send a request and decode a success body, failing on any non-2xx.
    async fn send<B, R>(&self, method: Method, path: &str, body: Option<&B>) -> Result<R, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self.inner.client.request(method, self.url(path)?);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Send a request whose error responses share the success envelope.
    ///
    /// The coupon, order and registration endpoints answer 4xx with
    /// `{ success: false, message }`. Those bodies are decoded as `R` so the
    /// caller can read the message; anything else is an [`ApiError::Api`].
    async fn send_enveloped<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .inner
            .client
            .post(self.url(path)?)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        decode_envelope(status, &text)
    }
}

fn decode_envelope<R: DeserializeOwned>(status: StatusCode, text: &str) -> Result<R, ApiError> {
    if status.is_success() {
        return serde_json::from_str(text).map_err(|e| ApiError::Parse(e.to_string()));
    }
    if status.is_client_error()
        && let Ok(envelope) = serde_json::from_str::<R>(text)
    {
        return Ok(envelope);
    }
    Err(ApiError::Api {
        status: status.as_u16(),
        message: text.to_string(),
    })
}
