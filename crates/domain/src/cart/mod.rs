//! Request-scoped carts and the cart validator.

mod model;
mod validator;

pub use model::{Cart, CartItem};
pub use validator::{CartPolicy, CatalogEntry, RestaurantGroup, validate};

use common::{ProductId, RestaurantId};
use thiserror::Error;

use crate::order::Money;

/// Why a cart cannot be checked out. Every variant is a client error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CartError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Quantity for product {product_id} must be positive")]
    NonPositiveQuantity { product_id: ProductId },

    #[error("Unknown product {product_id}")]
    UnknownProduct { product_id: ProductId },

    #[error("Product {product_id} is not available")]
    ProductUnavailable { product_id: ProductId },

    #[error("Price of product {product_id} is {actual}, not {submitted}")]
    PriceMismatch {
        product_id: ProductId,
        submitted: Money,
        actual: Money,
    },

    #[error("Product {product_id} belongs to restaurant {actual}, not {submitted}")]
    RestaurantMismatch {
        product_id: ProductId,
        submitted: RestaurantId,
        actual: RestaurantId,
    },

    #[error("Cart mixes {count} restaurants; order from one restaurant at a time")]
    MixedRestaurants { count: usize },

    #[error("Quantity for product {product_id} is too large")]
    QuantityTooLarge { product_id: ProductId },

    #[error("Cart total is too large")]
    TotalTooLarge,

    #[error("Cart total is {actual}, not {submitted}")]
    TotalMismatch { submitted: Money, actual: Money },
}
