//! Order submission payloads and the confirmed order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use segishop_core::{CurrencyCode, OrderId, OrderStatus, PaymentStatus, ProductId, UserId};

use super::address::ShippingAddress;
use super::coupon::AppliedCoupon;
use super::payment::PaymentResult;
use super::pricing::OrderTotals;
use super::shipping::ShippingOption;
use crate::api::ApiError;
use crate::cart::{CartSnapshot, CheckoutLineItem};

/// Days added to the order date for the delivery estimate.
const DELIVERY_ESTIMATE_DAYS: i64 = 7;

/// Body of `POST /orders`.
///
/// Either `user_id` or the `guest_*` contact fields are set, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_phone: Option<String>,
    pub shipping_address: OrderAddress,
    pub items: Vec<OrderItemRequest>,
    pub payment_info: PaymentInfo,
    pub totals: OrderTotalsRequest,
    pub coupon_code: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub coupon_discount_amount: Option<Decimal>,
    pub shipping_method_title: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAddress {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub apartment: Option<String>,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(rename = "productSKU")]
    pub product_sku: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub product_attributes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub payment_method: String,
    /// `success`, `pending` or `failed`.
    pub payment_status: PaymentStatus,
    pub payment_transaction_id: Option<String>,
    pub payment_intent_id: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: &'static str,
    /// The payment method as a JSON string.
    pub payment_method_details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotalsRequest {
    #[serde(rename = "subTotal", with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

impl From<&OrderTotals> for OrderTotalsRequest {
    fn from(totals: &OrderTotals) -> Self {
        Self {
            subtotal: totals.subtotal,
            tax_amount: totals.tax_amount,
            shipping_amount: totals.shipping_amount,
            discount_amount: totals.discount_amount,
            total_amount: totals.total_amount,
        }
    }
}

/// Identifiers of a persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub id: OrderId,
    pub order_number: String,
}

/// Answer from the order service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub order: Option<PlacedOrder>,
}

/// Order persistence contract.
#[async_trait]
pub trait OrderService: Send + Sync {
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, ApiError>;
}

/// A placed order as shown on the confirmation step. Never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Human-facing order number.
    pub order_id: String,
    pub order_db_id: OrderId,
    pub items: Vec<CheckoutLineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_result: PaymentResult,
    pub totals: OrderTotals,
    pub estimated_delivery: DateTime<Utc>,
    pub order_status: OrderStatus,
    pub account_created: bool,
    pub placed_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn new(
        placed: PlacedOrder,
        cart: &CartSnapshot,
        address: ShippingAddress,
        payment: PaymentResult,
        totals: OrderTotals,
        account_created: bool,
        placed_at: DateTime<Utc>,
    ) -> Self {
        let order_status = OrderStatus::from(payment.status);
        Self {
            order_id: placed.order_number,
            order_db_id: placed.id,
            items: cart.lines.clone(),
            shipping_address: address,
            payment_result: payment,
            totals,
            estimated_delivery: placed_at + chrono::Duration::days(DELIVERY_ESTIMATE_DAYS),
            order_status,
            account_created,
            placed_at,
        }
    }
}

/// Assemble the order payload from what the shopper reviewed.
///
/// `totals` are sent as given; nothing is recomputed here.
#[must_use]
pub fn build_create_order_request(
    customer: Option<UserId>,
    cart: &CartSnapshot,
    address: &ShippingAddress,
    payment: &PaymentResult,
    totals: &OrderTotals,
    coupon: Option<&AppliedCoupon>,
    shipping_option: Option<&ShippingOption>,
) -> CreateOrderRequest {
    let guest = customer.is_none();
    let guest_field = |value: &str| guest.then(|| value.to_string());

    CreateOrderRequest {
        user_id: customer,
        guest_email: guest_field(&address.email),
        guest_first_name: guest_field(&address.first_name),
        guest_last_name: guest_field(&address.last_name),
        guest_phone: guest_field(&address.phone),
        shipping_address: OrderAddress {
            first_name: address.first_name.clone(),
            last_name: address.last_name.clone(),
            address: address.address.clone(),
            apartment: address.apartment.clone().filter(|a| !a.trim().is_empty()),
            city: address.city.clone(),
            state: address.state.clone(),
            zip_code: address.zip_code.clone(),
            country: address.country.clone(),
            phone: address.phone.clone(),
        },
        items: cart
            .lines
            .iter()
            .map(|line| OrderItemRequest {
                product_id: line.product_id,
                product_name: line.name.clone(),
                product_sku: line.sku.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                total_price: line.total_price,
                product_attributes: line.attributes.clone(),
            })
            .collect(),
        payment_info: PaymentInfo {
            payment_method: payment.payment_method.to_string(),
            payment_status: match payment.status {
                PaymentStatus::Unknown => PaymentStatus::Failed,
                status => status,
            },
            payment_transaction_id: payment.transaction_id.clone(),
            payment_intent_id: payment.payment_intent_id.clone(),
            amount: payment.amount,
            currency: CurrencyCode::USD.code(),
            payment_method_details: serde_json::to_string(&payment.payment_method).ok(),
        },
        totals: OrderTotalsRequest::from(totals),
        coupon_code: coupon.map(|c| c.code.clone()),
        coupon_discount_amount: coupon.map(|_| totals.discount_amount),
        shipping_method_title: shipping_option.map(|o| o.title.clone()),
        notes: None,
    }
}
