//! Server-side cart of a signed-in customer.

use async_trait::async_trait;
use reqwest::Method;
use tracing::instrument;

use segishop_core::UserId;

use super::types::{AddToCartRequest, CartResponse, UpdateCartItemRequest};
use super::{ApiClient, ApiError};
use crate::cart::{Cart, CartError, CartItem, CartSource, MAX_LINE_QUANTITY, NewCartItem};

/// [`CartSource`] backed by `/Cart/{userId}`.
#[derive(Clone)]
pub struct RemoteCart {
    client: ApiClient,
    user_id: UserId,
}

impl RemoteCart {
    #[must_use]
    pub const fn new(client: ApiClient, user_id: UserId) -> Self {
        Self { client, user_id }
    }

    fn path(&self, suffix: &str) -> String {
        format!("Cart/{}{suffix}", self.user_id)
    }

    async fn fetch(&self) -> Result<Cart, CartError> {
        let response: CartResponse = self
            .client
            .send(Method::GET, &self.path(""), None::<&()>)
            .await?;
        into_cart(response)
    }

    /// Item endpoints return the touched line, not the cart; re-read after
    /// every mutation.
    async fn mutate<B>(&self, method: Method, suffix: &str, body: Option<&B>) -> Result<Cart, CartError>
    where
        B: serde::Serialize + Sync,
    {
        let response: serde_json::Value = self
            .client
            .send(method, &self.path(suffix), body)
            .await
            .map_err(|e| match e {
                ApiError::Api { status: 404, .. } => CartError::ItemNotFound(suffix.to_string()),
                other => CartError::Api(other),
            })?;
        if response.get("success").and_then(serde_json::Value::as_bool) == Some(false) {
            let message = response
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("cart update refused");
            return Err(CartError::Rejected(message.to_string()));
        }
        self.fetch().await
    }
}

fn into_cart(response: CartResponse) -> Result<Cart, CartError> {
    if !response.success {
        return Err(CartError::Rejected(
            response
                .message
                .unwrap_or_else(|| "failed to get cart items".to_string()),
        ));
    }
    let items = response
        .cart
        .unwrap_or_default()
        .items
        .into_iter()
        .map(CartItem::from)
        .collect();
    Ok(Cart::Authenticated(items))
}

#[async_trait]
impl CartSource for RemoteCart {
    #[instrument(skip(self), fields(user_id = %self.user_id))]
    async fn snapshot(&self) -> Result<Cart, CartError> {
        self.fetch().await
    }

    #[instrument(skip(self, item), fields(user_id = %self.user_id, product_id = %item.product_id))]
    async fn add_item(&self, item: NewCartItem) -> Result<Cart, CartError> {
        if item.quantity == 0 || item.quantity > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity);
        }
        let body = AddToCartRequest {
            product_id: item.product_id,
            quantity: item.quantity,
            product_attributes: item.product_attributes,
        };
        self.mutate(Method::POST, "/items", Some(&body)).await
    }

    #[instrument(skip(self), fields(user_id = %self.user_id))]
    async fn update_quantity(&self, line_id: &str, quantity: i32) -> Result<Cart, CartError> {
        match u32::try_from(quantity) {
            Ok(quantity) if quantity > 0 => {
                let body = UpdateCartItemRequest { quantity };
                self.mutate(Method::PUT, &format!("/items/{line_id}"), Some(&body))
                    .await
            }
            _ => self.remove_item(line_id).await,
        }
    }

    #[instrument(skip(self), fields(user_id = %self.user_id))]
    async fn remove_item(&self, line_id: &str) -> Result<Cart, CartError> {
        self.mutate(Method::DELETE, &format!("/items/{line_id}"), None::<&()>)
            .await
    }

    #[instrument(skip(self), fields(user_id = %self.user_id))]
    async fn clear(&self) -> Result<(), CartError> {
        self.mutate(Method::DELETE, "/clear", None::<&()>).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_into_cart_normalizes_server_items() {
        let json = r#"{"success":true,"cart":{"items":[
            {"id":7,"productId":3,"productName":"Gift Box","productSlug":"gift-box",
             "productPrice":24.5,"productImage":null,"productAttributes":null,
             "quantity":2,"totalPrice":49.0,"isInStock":true,"stockQuantity":12}],
            "totalItems":2,"subtotal":49.0,"uniqueItemsCount":1}}"#;
        let response: CartResponse = serde_json::from_str(json).unwrap();

        let snapshot = into_cart(response).unwrap().normalize();
        assert_eq!(snapshot.subtotal, dec!(49.0));
        assert_eq!(snapshot.lines[0].line_id, "7");
        assert_eq!(snapshot.lines[0].sku.as_deref(), Some("gift-box"));
    }

    #[test]
    fn test_into_cart_refused() {
        let response: CartResponse =
            serde_json::from_str(r#"{"success":false,"message":"User not found"}"#).unwrap();
        assert!(matches!(into_cart(response), Err(CartError::Rejected(m)) if m == "User not found"));
    }
}
