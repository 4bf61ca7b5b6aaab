//! Client cart lines.

use common::{ProductId, RestaurantId};
use serde::{Deserialize, Serialize};

use super::CartError;
use crate::order::Money;

/// A line as submitted by the client. Price and weight are only hints; the
/// catalog is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub restaurant_id: RestaurantId,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: i32,
    #[serde(default)]
    pub weight_kg: f64,
}

/// A customer's cart, passed explicitly into checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds a line, merging with an existing line for the same product.
    pub fn add(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity <= 0 {
            return Err(CartError::NonPositiveQuantity {
                product_id: item.product_id,
            });
        }
        let product_id = item.product_id;
        match self.line_mut(item.restaurant_id, product_id) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or(CartError::QuantityTooLarge { product_id })?;
            }
            None => self.items.push(item),
        }
        Ok(())
    }

    /// Removes one unit; the line disappears at zero. Returns whether the
    /// product was in the cart.
    pub fn remove_unit(&mut self, restaurant_id: RestaurantId, product_id: ProductId) -> bool {
        let Some(line) = self.line_mut(restaurant_id, product_id) else {
            return false;
        };
        line.quantity -= 1;
        if line.quantity <= 0 {
            self.items
                .retain(|i| !(i.restaurant_id == restaurant_id && i.product_id == product_id));
        }
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Client-side estimate from the submitted prices.
    pub fn total(&self) -> Money {
        self.items
            .iter()
            .map(|i| i.unit_price.times(i.quantity.max(0) as u32))
            .sum()
    }

    fn line_mut(&mut self, restaurant_id: RestaurantId, product_id: ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|i| i.restaurant_id == restaurant_id && i.product_id == product_id)
    }
}
