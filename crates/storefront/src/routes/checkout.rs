//! Checkout route handlers.
//!
//! Thin wrappers over [`CheckoutOrchestrator`]: each handler looks up the
//! shopper's active checkout, calls one operation and returns its result.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use segishop_core::{PaymentMethodKind, ShippingOptionId};

use crate::checkout::{
    Agreements, BillingInfo, CheckoutOrchestrator, CheckoutView, CouponApplication, Order,
    OrderTotals, PaymentResult, ShippingAddress, Stage,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::routes::Shopper;
use crate::state::AppState;

fn active(shopper: &Shopper) -> Result<Arc<CheckoutOrchestrator>> {
    shopper
        .state
        .checkout()
        .ok_or_else(|| AppError::NotFound("no checkout in progress".to_string()))
}

/// Body of `POST /checkout/shipping-option`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectShippingOption {
    pub option_id: ShippingOptionId,
}

/// Body of `POST /checkout/coupon`.
#[derive(Debug, Deserialize)]
pub struct CouponCode {
    pub code: String,
}

/// Body of `POST /checkout/pay`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    pub payment_method: PaymentMethodKind,
    #[serde(default)]
    pub billing: BillingInfo,
}

/// Body of `POST /checkout/back`.
#[derive(Debug, Deserialize)]
pub struct GoBack {
    pub to: Stage,
}

/// Start a checkout from the active cart, replacing any previous one.
#[instrument(skip_all, fields(signed_in = shopper.customer.is_some()))]
pub async fn start(
    State(state): State<AppState>,
    shopper: Shopper,
) -> Result<(StatusCode, Json<CheckoutView>)> {
    let customer = shopper.customer_id();
    let services = state.checkout_services(&shopper.state, customer);
    let checkout = CheckoutOrchestrator::begin(services, state.config().pricing, customer).await?;
    let view = checkout.snapshot();
    shopper.state.set_checkout(Arc::new(checkout));

    add_breadcrumb("checkout", "Checkout started", None);
    tracing::info!(
        items = view.cart.total_items,
        subtotal = %view.cart.subtotal,
        "Checkout started"
    );
    Ok((StatusCode::CREATED, Json(view)))
}

/// Current wizard state.
pub async fn show(shopper: Shopper) -> Result<Json<CheckoutView>> {
    Ok(Json(active(&shopper)?.snapshot()))
}

#[instrument(skip_all)]
pub async fn submit_address(
    shopper: Shopper,
    Json(address): Json<ShippingAddress>,
) -> Result<Json<CheckoutView>> {
    let checkout = active(&shopper)?;
    add_breadcrumb(
        "checkout",
        "Shipping address submitted",
        Some(&[("zip", address.zip_code.as_str())]),
    );
    Ok(Json(checkout.submit_shipping_address(address).await?))
}

#[instrument(skip_all, fields(option_id = %body.option_id))]
pub async fn select_shipping_option(
    shopper: Shopper,
    Json(body): Json<SelectShippingOption>,
) -> Result<Json<CheckoutView>> {
    let checkout = active(&shopper)?;
    Ok(Json(checkout.select_shipping_option(body.option_id).await?))
}

#[instrument(skip_all)]
pub async fn apply_coupon(
    shopper: Shopper,
    Json(body): Json<CouponCode>,
) -> Result<Json<CouponApplication>> {
    let checkout = active(&shopper)?;
    let application = checkout.apply_coupon(&body.code).await?;
    add_breadcrumb(
        "checkout",
        "Coupon applied",
        Some(&[("code", application.coupon.code.as_str())]),
    );
    Ok(Json(application))
}

pub async fn remove_coupon(shopper: Shopper) -> Result<Json<OrderTotals>> {
    Ok(Json(active(&shopper)?.remove_coupon()?))
}

pub async fn confirm_review(
    shopper: Shopper,
    Json(agreements): Json<Agreements>,
) -> Result<Json<CheckoutView>> {
    Ok(Json(active(&shopper)?.confirm_review(agreements)?))
}

#[instrument(skip_all, fields(method = %body.payment_method))]
pub async fn pay(shopper: Shopper, Json(body): Json<PayRequest>) -> Result<Json<Order>> {
    let checkout = active(&shopper)?;
    add_breadcrumb("checkout", "Payment submitted", Some(&[("method", body.payment_method.as_str())]));
    Ok(Json(checkout.pay(body.payment_method, body.billing).await?))
}

#[instrument(skip_all, fields(status = payment.status.as_str()))]
pub async fn submit_payment(
    shopper: Shopper,
    Json(payment): Json<PaymentResult>,
) -> Result<Json<Order>> {
    let checkout = active(&shopper)?;
    Ok(Json(checkout.submit_payment(payment).await?))
}

pub async fn go_back(shopper: Shopper, Json(body): Json<GoBack>) -> Result<Json<CheckoutView>> {
    Ok(Json(active(&shopper)?.go_back(body.to)?))
}
