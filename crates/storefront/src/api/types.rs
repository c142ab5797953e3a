//! Wire types for the Segishop REST API.
//!
//! Money travels as JSON numbers here, unlike the storefront's own JSON
//! surface which renders decimals as strings.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use segishop_core::{CartItemId, ProductId, ShippingOptionId};

use crate::cart::{CartItem, CheckoutLineItem};
use crate::checkout::{ShippingAddress, ShippingOption, TotalsQuote};

// =============================================================================
// Shipping
// =============================================================================

/// Address block of the shipping controller, which binds PascalCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub apartment: Option<String>,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub phone: Option<String>,
}

impl From<&ShippingAddress> for WireShippingAddress {
    fn from(address: &ShippingAddress) -> Self {
        let non_empty = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };
        Self {
            first_name: address.first_name.clone(),
            last_name: address.last_name.clone(),
            address: address.address.clone(),
            apartment: address.apartment.as_deref().and_then(non_empty),
            city: address.city.clone(),
            state: address.state.clone(),
            zip_code: address.zip_code.clone(),
            country: if address.country.trim().is_empty() {
                "US".to_string()
            } else {
                address.country.clone()
            },
            phone: non_empty(&address.phone),
        }
    }
}

/// Cart line as the shipping controller expects it.
///
/// Guest lines have no server id and are sent as `0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCartLine {
    pub id: i32,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub product_price: Decimal,
    pub product_attributes: Option<String>,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub is_in_stock: bool,
}

impl From<&CheckoutLineItem> for WireCartLine {
    fn from(line: &CheckoutLineItem) -> Self {
        Self {
            id: line.line_id.parse().unwrap_or(0),
            product_id: line.product_id,
            product_name: line.name.clone(),
            product_slug: line.sku.clone().unwrap_or_default(),
            product_price: line.unit_price,
            product_attributes: line.attributes.clone(),
            quantity: line.quantity,
            total_price: line.total_price,
            is_in_stock: true,
        }
    }
}

/// Body of `POST /Shipping/calculate` and `POST /Shipping/calculate-totals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShippingCalculationRequest {
    pub items: Vec<WireCartLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    pub shipping_address: WireShippingAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_shipping_option_id: Option<ShippingOptionId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireShippingOption {
    pub id: ShippingOptionId,
    pub title: String,
    #[serde(default)]
    pub method_type: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost: Decimal,
    #[serde(default)]
    pub estimated_days: String,
    #[serde(default)]
    pub is_taxable: bool,
    #[serde(default = "enabled")]
    pub is_enabled: bool,
}

const fn enabled() -> bool {
    true
}

impl From<WireShippingOption> for ShippingOption {
    fn from(option: WireShippingOption) -> Self {
        Self {
            id: option.id,
            title: option.title,
            price: option.cost,
            eta_description: option.estimated_days,
            method_type: option.method_type,
            is_taxable: option.is_taxable,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingCalculationResponse {
    pub success: bool,
    #[serde(default)]
    pub options: Vec<WireShippingOption>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOrderTotals {
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping_cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax_amount: Decimal,
}

impl From<WireOrderTotals> for TotalsQuote {
    fn from(totals: WireOrderTotals) -> Self {
        Self {
            subtotal: totals.subtotal,
            shipping_cost: totals.shipping_cost,
            tax_amount: totals.tax_amount,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotalsResponse {
    pub success: bool,
    pub totals: Option<WireOrderTotals>,
    pub error_message: Option<String>,
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(default)]
    pub product_slug: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub product_price: Decimal,
    pub product_image: Option<String>,
    pub product_attributes: Option<String>,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    #[serde(default = "enabled")]
    pub is_in_stock: bool,
    #[serde(default)]
    pub stock_quantity: i32,
}

impl From<WireCartItem> for CartItem {
    fn from(item: WireCartItem) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name,
            product_slug: item.product_slug,
            product_price: item.product_price,
            product_image: item.product_image,
            product_attributes: item.product_attributes,
            quantity: item.quantity,
            total_price: item.total_price,
            is_in_stock: item.is_in_stock,
            stock_quantity: item.stock_quantity,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    #[serde(default)]
    pub items: Vec<WireCartItem>,
}

/// Envelope of every `/Cart` endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub success: bool,
    pub cart: Option<CartSummary>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    pub product_attributes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

// =============================================================================
// Payments
// =============================================================================

/// Body of `POST /payments/stripe/create-intent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: &'static str,
    pub metadata: PaymentIntentMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentMetadata {
    pub payment_method: &'static str,
    pub customer_name: String,
    pub customer_email: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub success: bool,
    pub client_secret: Option<String>,
    pub payment_intent_id: Option<String>,
    pub error: Option<String>,
}
