//! Shipping rates and authoritative totals.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use segishop_core::ShippingOptionId;

use super::address::ShippingAddress;
use crate::api::ApiError;
use crate::cart::{CartSnapshot, CheckoutLineItem};

/// A way to ship the order to the current address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingOption {
    pub id: ShippingOptionId,
    pub title: String,
    pub price: Decimal,
    /// e.g. "3-5 business days".
    pub eta_description: String,
    pub method_type: String,
    pub is_taxable: bool,
}

/// Request for the options available at an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingQuoteRequest {
    pub address: ShippingAddress,
    pub items: Vec<CheckoutLineItem>,
    pub subtotal: Decimal,
}

/// Request for authoritative shipping and tax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalsQuoteRequest {
    pub address: ShippingAddress,
    pub items: Vec<CheckoutLineItem>,
    pub subtotal: Decimal,
    pub selected_option_id: Option<ShippingOptionId>,
}

/// Authoritative shipping and tax for a subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsQuote {
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
}

/// Shipping-rate and totals contract.
#[async_trait]
pub trait ShippingService: Send + Sync {
    /// Options for an address, in display order.
    async fn calculate_options(
        &self,
        request: &ShippingQuoteRequest,
    ) -> Result<Vec<ShippingOption>, ApiError>;

    /// Shipping and tax for an address and selected option.
    async fn calculate_totals(&self, request: &TotalsQuoteRequest) -> Result<TotalsQuote, ApiError>;
}

/// Options for an address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingQuote {
    pub options: Vec<ShippingOption>,
    /// The service failed; `options` is empty for that reason rather than
    /// because nothing ships to the address.
    pub degraded: bool,
}

/// Fetches shipping options, tolerating partial addresses and service
/// failures.
#[derive(Clone)]
pub struct ShippingQuoter {
    service: Arc<dyn ShippingService>,
}

impl ShippingQuoter {
    #[must_use]
    pub fn new(service: Arc<dyn ShippingService>) -> Self {
        Self { service }
    }

    /// Options for `address`; empty without a service call when the address
    /// is incomplete.
    #[instrument(skip_all, fields(zip = %address.zip_code))]
    pub async fn get_options(&self, address: &ShippingAddress, cart: &CartSnapshot) -> ShippingQuote {
        if !address.is_quotable() {
            tracing::debug!("Address incomplete, skipping shipping quote");
            return ShippingQuote::default();
        }

        let request = ShippingQuoteRequest {
            address: address.clone(),
            items: cart.lines.clone(),
            subtotal: cart.subtotal,
        };

        match self.service.calculate_options(&request).await {
            Ok(options) => ShippingQuote {
                options,
                degraded: false,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Shipping options unavailable");
                ShippingQuote {
                    options: Vec::new(),
                    degraded: true,
                }
            }
        }
    }

    /// Authoritative shipping and tax.
    ///
    /// # Errors
    ///
    /// Propagates the service error; callers keep their current pricing.
    #[instrument(skip_all, fields(option = ?selected_option_id))]
    pub async fn quote_totals(
        &self,
        address: &ShippingAddress,
        cart: &CartSnapshot,
        selected_option_id: Option<ShippingOptionId>,
    ) -> Result<TotalsQuote, ApiError> {
        let request = TotalsQuoteRequest {
            address: address.clone(),
            items: cart.lines.clone(),
            subtotal: cart.subtotal,
            selected_option_id,
        };
        self.service.calculate_totals(&request).await
    }
}
