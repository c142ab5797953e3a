//! Application state shared across handlers.

use std::sync::{Arc, Mutex, PoisonError};

use moka::future::Cache;

use segishop_core::UserId;

use crate::api::{ApiClient, ApiError, RemoteCart};
use crate::cart::{CartSource, GuestCart};
use crate::checkout::{CheckoutOrchestrator, CheckoutServices};
use crate::config::StorefrontConfig;

const MAX_SHOPPERS: u64 = 100_000;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the API client and per-shopper state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: ApiClient,
    /// Keyed by the session's shopper key; evicted after the checkout
    /// session TTL of inactivity.
    shoppers: Cache<String, Arc<ShopperState>>,
}

/// In-memory state of one shopper.
#[derive(Default)]
pub struct ShopperState {
    guest_cart: Arc<GuestCart>,
    checkout: Mutex<Option<Arc<CheckoutOrchestrator>>>,
}

impl ShopperState {
    #[must_use]
    pub fn guest_cart(&self) -> Arc<GuestCart> {
        self.guest_cart.clone()
    }

    /// The active checkout, if one was started.
    #[must_use]
    pub fn checkout(&self) -> Option<Arc<CheckoutOrchestrator>> {
        self.checkout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the active checkout.
    pub fn set_checkout(&self, checkout: Arc<CheckoutOrchestrator>) {
        *self.checkout.lock().unwrap_or_else(PoisonError::into_inner) = Some(checkout);
    }
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api, config.shipping_quote_cache_ttl)?;
        let shoppers = Cache::builder()
            .max_capacity(MAX_SHOPPERS)
            .time_to_idle(config.checkout_session_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                shoppers,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the Segishop API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// State for `shopper_key`, created empty on first use.
    pub async fn shopper(&self, shopper_key: &str) -> Arc<ShopperState> {
        self.inner
            .shoppers
            .get_with(shopper_key.to_string(), async {
                Arc::new(ShopperState::default())
            })
            .await
    }

    /// The active cart: the server-side cart for a signed-in customer,
    /// otherwise the shopper's guest cart.
    #[must_use]
    pub fn cart_source(&self, shopper: &ShopperState, customer: Option<UserId>) -> Arc<dyn CartSource> {
        match customer {
            Some(user_id) => Arc::new(RemoteCart::new(self.api().clone(), user_id)),
            None => shopper.guest_cart(),
        }
    }

    /// Collaborators for a new checkout.
    #[must_use]
    pub fn checkout_services(
        &self,
        shopper: &ShopperState,
        customer: Option<UserId>,
    ) -> CheckoutServices {
        let api = Arc::new(self.api().clone());
        CheckoutServices {
            cart: self.cart_source(shopper, customer),
            shipping: api.clone(),
            coupons: api.clone(),
            payments: api.clone(),
            orders: api.clone(),
            accounts: api,
        }
    }
}
