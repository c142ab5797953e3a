//! HTTP route handlers for storefront.
//!
//! All routes speak JSON. The shopper is identified by the session cookie;
//! a signed-in customer is read from the session as well.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                     - Health check
//!
//! # Cart
//! GET    /cart                       - Current cart snapshot
//! POST   /cart/items                 - Add item
//! PUT    /cart/items/{id}            - Update quantity (<= 0 removes)
//! DELETE /cart/items/{id}            - Remove item
//!
//! # Checkout
//! POST   /checkout                   - Start a checkout from the active cart
//! GET    /checkout                   - Wizard snapshot
//! POST   /checkout/address           - Submit shipping address
//! POST   /checkout/shipping-option   - Select shipping option
//! POST   /checkout/coupon            - Apply coupon
//! DELETE /checkout/coupon            - Remove coupon
//! POST   /checkout/review            - Accept agreements, go to payment
//! POST   /checkout/pay               - Pay through the payment gateway
//! POST   /checkout/payment           - Submit a client-completed payment
//! POST   /checkout/back              - Step back
//! ```

pub mod cart;
pub mod checkout;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::from_fn,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tower_sessions::Session;

use segishop_core::UserId;

use crate::error::AppError;
use crate::middleware::{OptionalAuth, create_session_layer, request_id_middleware, shopper_key};
use crate::models::CurrentCustomer;
use crate::state::{AppState, ShopperState};

/// The shopper behind a request.
pub struct Shopper {
    pub state: Arc<ShopperState>,
    pub customer: Option<CurrentCustomer>,
}

impl Shopper {
    #[must_use]
    pub fn customer_id(&self) -> Option<UserId> {
        self.customer.as_ref().map(|customer| customer.id)
    }
}

impl FromRequestParts<AppState> for Shopper {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer not installed".to_string()))?;
        let key = shopper_key(&session).await?;
        let Ok(OptionalAuth(customer)) = OptionalAuth::from_request_parts(parts, state).await;

        Ok(Self {
            state: state.shopper(&key).await,
            customer,
        })
    }
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/items", post(cart::add))
        .route("/items/{id}", put(cart::update).delete(cart::remove))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).post(checkout::start))
        .route("/address", post(checkout::submit_address))
        .route("/shipping-option", post(checkout::select_shipping_option))
        .route(
            "/coupon",
            post(checkout::apply_coupon).delete(checkout::remove_coupon),
        )
        .route("/review", post(checkout::confirm_review))
        .route("/pay", post(checkout::pay))
        .route("/payment", post(checkout::submit_payment))
        .route("/back", post(checkout::go_back))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
}

/// The full application: routes, sessions, request ids and tracing.
///
/// Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .merge(routes())
        .layer(session_layer)
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
