//! Session-scoped guest cart.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use segishop_core::round_money;

use super::{Cart, CartError, CartSource, GuestCartItem, MAX_LINE_QUANTITY, NewCartItem};

/// In-memory cart for a shopper who is not signed in.
#[derive(Debug, Default)]
pub struct GuestCart {
    items: Mutex<Vec<GuestCartItem>>,
}

impl GuestCart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, Vec<GuestCartItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cart(items: &[GuestCartItem]) -> Cart {
        Cart::Guest(items.to_vec())
    }
}

fn line_total(unit_price: Decimal, quantity: u32) -> Result<Decimal, CartError> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .map(round_money)
        .ok_or(CartError::InvalidPrice)
}

fn checked_quantity(quantity: u32) -> Result<u32, CartError> {
    if (1..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(quantity)
    } else {
        Err(CartError::InvalidQuantity)
    }
}

#[async_trait]
impl CartSource for GuestCart {
    async fn snapshot(&self) -> Result<Cart, CartError> {
        Ok(Self::cart(&self.items()))
    }

    async fn add_item(&self, item: NewCartItem) -> Result<Cart, CartError> {
        checked_quantity(item.quantity)?;
        if item.unit_price < Decimal::ZERO {
            return Err(CartError::InvalidPrice);
        }

        let mut items = self.items();
        if let Some(existing) = items.iter_mut().find(|line| {
            line.product_id == item.product_id && line.product_attributes == item.product_attributes
        }) {
            let quantity = existing
                .quantity
                .checked_add(item.quantity)
                .ok_or(CartError::InvalidQuantity)
                .and_then(checked_quantity)?;
            existing.total_price = line_total(existing.unit_price, quantity)?;
            existing.quantity = quantity;
        } else {
            let total_price = line_total(item.unit_price, item.quantity)?;
            items.push(GuestCartItem {
                id: Uuid::new_v4().to_string(),
                product_id: item.product_id,
                product_name: item.product_name,
                product_image: item.product_image,
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price,
                product_attributes: item.product_attributes,
            });
        }

        Ok(Self::cart(&items))
    }

    async fn update_quantity(&self, line_id: &str, quantity: i32) -> Result<Cart, CartError> {
        let mut items = self.items();
        let index = items
            .iter()
            .position(|line| line.id == line_id)
            .ok_or_else(|| CartError::ItemNotFound(line_id.to_string()))?;

        match u32::try_from(quantity) {
            Ok(quantity) if quantity > 0 => {
                let quantity = checked_quantity(quantity)?;
                if let Some(line) = items.get_mut(index) {
                    line.total_price = line_total(line.unit_price, quantity)?;
                    line.quantity = quantity;
                }
            }
            _ => {
                items.remove(index);
            }
        }

        Ok(Self::cart(&items))
    }

    async fn remove_item(&self, line_id: &str) -> Result<Cart, CartError> {
        let mut items = self.items();
        let before = items.len();
        items.retain(|line| line.id != line_id);
        if items.len() == before {
            return Err(CartError::ItemNotFound(line_id.to_string()));
        }
        Ok(Self::cart(&items))
    }

    async fn clear(&self) -> Result<(), CartError> {
        self.items().clear();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;
    use segishop_core::ProductId;

    use super::*;

    fn chips(quantity: u32) -> NewCartItem {
        NewCartItem {
            product_id: ProductId::new(7),
            product_name: "Plantain Chips".to_string(),
            product_image: None,
            unit_price: dec!(12.50),
            quantity,
            product_attributes: None,
        }
    }

    fn lines(cart: &Cart) -> &[GuestCartItem] {
        match cart {
            Cart::Guest(items) => items,
            Cart::Authenticated(_) => panic!("expected a guest cart"),
        }
    }

    #[tokio::test]
    async fn test_add_merges_matching_lines() {
        let cart = GuestCart::new();
        cart.add_item(chips(1)).await.unwrap();
        let after = cart.add_item(chips(2)).await.unwrap();

        let items = lines(&after);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
        assert_eq!(items[0].total_price, dec!(37.50));
    }

    #[tokio::test]
    async fn test_add_keeps_different_attributes_apart() {
        let cart = GuestCart::new();
        cart.add_item(chips(1)).await.unwrap();
        let mut spicy = chips(1);
        spicy.product_attributes = Some(r#"{"flavor":"spicy"}"#.to_string());
        let after = cart.add_item(spicy).await.unwrap();

        assert_eq!(lines(&after).len(), 2);
    }

    #[tokio::test]
    async fn test_add_rejects_zero_quantity() {
        let cart = GuestCart::new();
        assert!(matches!(
            cart.add_item(chips(0)).await,
            Err(CartError::InvalidQuantity)
        ));
    }

    #[tokio::test]
    async fn test_add_rejects_negative_price() {
        let cart = GuestCart::new();
        let mut refund = chips(1);
        refund.unit_price = dec!(-50);

        assert!(matches!(
            cart.add_item(refund).await,
            Err(CartError::InvalidPrice)
        ));
        assert!(cart.snapshot().await.unwrap().normalize().is_empty());
    }

    #[tokio::test]
    async fn test_merged_quantity_is_bounded() {
        let cart = GuestCart::new();
        assert!(matches!(
            cart.add_item(chips(3_000_000_000)).await,
            Err(CartError::InvalidQuantity)
        ));

        cart.add_item(chips(MAX_LINE_QUANTITY)).await.unwrap();
        assert!(matches!(
            cart.add_item(chips(MAX_LINE_QUANTITY)).await,
            Err(CartError::InvalidQuantity)
        ));

        let snapshot = cart.snapshot().await.unwrap().normalize();
        assert_eq!(snapshot.total_items, MAX_LINE_QUANTITY);
        assert_eq!(snapshot.subtotal, dec!(125000.00));
    }

    #[tokio::test]
    async fn test_update_quantity_is_bounded() {
        let cart = GuestCart::new();
        let added = cart.add_item(chips(1)).await.unwrap();
        let id = lines(&added)[0].id.clone();

        assert!(matches!(
            cart.update_quantity(&id, i32::MAX).await,
            Err(CartError::InvalidQuantity)
        ));
        assert_eq!(lines(&cart.snapshot().await.unwrap())[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_update_quantity_recomputes_line_total() {
        let cart = GuestCart::new();
        let added = cart.add_item(chips(1)).await.unwrap();
        let id = lines(&added)[0].id.clone();

        let after = cart.update_quantity(&id, 4).await.unwrap();
        assert_eq!(lines(&after)[0].total_price, dec!(50.00));
        assert_eq!(after.normalize().subtotal, dec!(50.00));
    }

    #[tokio::test]
    async fn test_update_quantity_to_zero_or_less_removes() {
        let cart = GuestCart::new();
        let added = cart.add_item(chips(2)).await.unwrap();
        let id = lines(&added)[0].id.clone();

        let after = cart.update_quantity(&id, 0).await.unwrap();
        assert!(lines(&after).is_empty());

        let added = cart.add_item(chips(2)).await.unwrap();
        let id = lines(&added)[0].id.clone();
        let after = cart.update_quantity(&id, -3).await.unwrap();
        assert!(lines(&after).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_line() {
        let cart = GuestCart::new();
        assert!(matches!(
            cart.update_quantity("missing", 1).await,
            Err(CartError::ItemNotFound(_))
        ));
        assert!(matches!(
            cart.remove_item("missing").await,
            Err(CartError::ItemNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_clear() {
        let cart = GuestCart::new();
        cart.add_item(chips(2)).await.unwrap();
        cart.clear().await.unwrap();
        assert!(cart.snapshot().await.unwrap().normalize().is_empty());
    }
}
