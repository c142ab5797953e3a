//! Cart route handlers.
//!
//! Guests mutate their session cart; signed-in customers mutate their
//! server-side cart. Every handler answers with the normalized cart.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use crate::cart::{CartSnapshot, NewCartItem};
use crate::error::Result;
use crate::routes::Shopper;
use crate::state::AppState;

/// Body of `PUT /cart/items/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantity {
    pub quantity: i32,
}

/// Current cart.
#[instrument(skip_all, fields(signed_in = shopper.customer.is_some()))]
pub async fn show(State(state): State<AppState>, shopper: Shopper) -> Result<Json<CartSnapshot>> {
    let cart = state.cart_source(&shopper.state, shopper.customer_id());
    Ok(Json(cart.snapshot().await?.normalize()))
}

/// Add a product to the cart.
#[instrument(skip_all, fields(product_id = %item.product_id, quantity = item.quantity))]
pub async fn add(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(item): Json<NewCartItem>,
) -> Result<Json<CartSnapshot>> {
    let cart = state.cart_source(&shopper.state, shopper.customer_id());
    let updated = cart.add_item(item).await?;
    Ok(Json(updated.normalize()))
}

/// Change a line's quantity; zero or less removes it.
#[instrument(skip(state, shopper, body), fields(quantity = body.quantity))]
pub async fn update(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(id): Path<String>,
    Json(body): Json<UpdateQuantity>,
) -> Result<Json<CartSnapshot>> {
    let cart = state.cart_source(&shopper.state, shopper.customer_id());
    let updated = cart.update_quantity(&id, body.quantity).await?;
    Ok(Json(updated.normalize()))
}

/// Remove a line.
#[instrument(skip(state, shopper))]
pub async fn remove(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(id): Path<String>,
) -> Result<Json<CartSnapshot>> {
    let cart = state.cart_source(&shopper.state, shopper.customer_id());
    let updated = cart.remove_item(&id).await?;
    Ok(Json(updated.normalize()))
}
