//! Cart sources and the normalized checkout view of a cart.
//!
//! A shopper's cart lives in one of two places: a session-scoped
//! [`GuestCart`] or the server-side cart of a signed-in customer
//! ([`RemoteCart`](crate::api::RemoteCart)). Both produce a tagged [`Cart`];
//! checkout only ever sees the [`CartSnapshot`] that [`Cart::normalize`]
//! normalizes it into.

mod guest;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use segishop_core::{CartItemId, CartMode, ProductId, round_money};

use crate::api::ApiError;

pub use guest::GuestCart;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 10_000;

/// Errors raised by cart sources.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("cart item not found: {0}")]
    ItemNotFound(String),

    #[error("quantity must be between 1 and {MAX_LINE_QUANTITY}")]
    InvalidQuantity,

    #[error("unit price cannot be negative")]
    InvalidPrice,

    #[error("cart API error: {0}")]
    Api(#[from] ApiError),

    #[error("{0}")]
    Rejected(String),
}

/// A line of a guest cart, held in the shopper's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCartItem {
    /// Locally generated line id.
    pub id: String,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    /// Selected variant attributes as a JSON string.
    pub product_attributes: Option<String>,
}

/// A line of a signed-in customer's server-side cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub product_price: Decimal,
    pub product_image: Option<String>,
    pub product_attributes: Option<String>,
    pub quantity: u32,
    pub total_price: Decimal,
    pub is_in_stock: bool,
    pub stock_quantity: i32,
}

/// The active cart, tagged by where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cart {
    Guest(Vec<GuestCartItem>),
    Authenticated(Vec<CartItem>),
}

/// Cart line in the shape checkout and order submission consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLineItem {
    pub line_id: String,
    pub product_id: ProductId,
    pub name: String,
    /// Product slug for server carts; guest lines carry none.
    pub sku: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub total_price: Decimal,
    pub attributes: Option<String>,
}

/// Read-only normalized cart.
///
/// `subtotal` is always the sum of the line totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub mode: CartMode,
    pub lines: Vec<CheckoutLineItem>,
    pub subtotal: Decimal,
    pub total_items: u32,
}

impl CartSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Cart {
    #[must_use]
    pub const fn mode(&self) -> CartMode {
        match self {
            Self::Guest(_) => CartMode::Guest,
            Self::Authenticated(_) => CartMode::Authenticated,
        }
    }

    /// Normalize into the checkout line shape.
    #[must_use]
    pub fn normalize(&self) -> CartSnapshot {
        let lines: Vec<CheckoutLineItem> = match self {
            Self::Guest(items) => items
                .iter()
                .map(|item| CheckoutLineItem {
                    line_id: item.id.clone(),
                    product_id: item.product_id,
                    name: item.product_name.clone(),
                    sku: None,
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                    total_price: round_money(item.total_price),
                    attributes: item.product_attributes.clone(),
                })
                .collect(),
            Self::Authenticated(items) => items
                .iter()
                .map(|item| CheckoutLineItem {
                    line_id: item.id.to_string(),
                    product_id: item.product_id,
                    name: item.product_name.clone(),
                    sku: Some(item.product_slug.clone()),
                    unit_price: item.product_price,
                    quantity: item.quantity,
                    total_price: round_money(item.total_price),
                    attributes: item.product_attributes.clone(),
                })
                .collect(),
        };

        CartSnapshot {
            mode: self.mode(),
            subtotal: lines
                .iter()
                .fold(Decimal::ZERO, |sum, line| sum.saturating_add(line.total_price)),
            total_items: lines
                .iter()
                .fold(0u32, |sum, line| sum.saturating_add(line.quantity)),
            lines,
        }
    }
}

/// Product to add to a cart.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCartItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub product_attributes: Option<String>,
}

/// Where the active cart comes from.
///
/// Mutations belong to the source; checkout only calls [`CartSource::snapshot`].
#[async_trait]
pub trait CartSource: Send + Sync {
    /// Current contents of the cart.
    async fn snapshot(&self) -> Result<Cart, CartError>;

    /// Add a product, merging into an existing line with the same product
    /// and attributes.
    async fn add_item(&self, item: NewCartItem) -> Result<Cart, CartError>;

    /// Set a line's quantity. A quantity of zero or less removes the line.
    async fn update_quantity(&self, line_id: &str, quantity: i32) -> Result<Cart, CartError>;

    async fn remove_item(&self, line_id: &str) -> Result<Cart, CartError>;

    async fn clear(&self) -> Result<(), CartError>;
}
