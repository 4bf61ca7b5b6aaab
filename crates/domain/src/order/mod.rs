//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::{HistoryEntry, Order, OrderPayment, OrderPolicy};
pub use commands::{PlaceOrder, TransitionRequest};
pub use events::{OrderEvent, OrderPlacedData, PaymentRecordedData, StatusChangedData};
pub use service::OrderService;
pub use state::OrderStatus;
pub use value_objects::{Money, OrderItem};

use common::Role;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The edge is not in the transition table for this role.
    #[error("Invalid transition: {role} cannot move an order from {from} to {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
        role: Role,
    },

    /// The stored status differs from the one the caller acted on.
    #[error("Stale order state: expected {expected}, found {actual}")]
    StaleStatus {
        expected: OrderStatus,
        actual: OrderStatus,
    },

    #[error("A rejection reason is required")]
    ReasonRequired,

    #[error("Confirmation window of {window_minutes} minutes has expired")]
    ConfirmationExpired { window_minutes: i64 },

    /// The caller does not own the order it is trying to change.
    #[error("{role} {user_id} does not own this order")]
    NotOwner { role: Role, user_id: u64 },

    #[error("A reserved drone is required to start delivery")]
    DroneRequired,

    #[error("Order has no items")]
    NoItems,

    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: u64, quantity: u32 },

    #[error("Invalid price {price} for product {product_id}")]
    InvalidPrice { product_id: u64, price: i64 },

    #[error("Invalid weight {weight_kg} kg for product {product_id}")]
    InvalidWeight { product_id: u64, weight_kg: f64 },

    #[error("All items of an order must come from one restaurant")]
    MixedRestaurants,

    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Order has not been placed")]
    NotPlaced,
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::InvalidTransition { .. } | OrderError::ConfirmationExpired { .. } => {
                ErrorKind::InvalidTransition
            }
            OrderError::StaleStatus { .. } => ErrorKind::StaleState,
            OrderError::NotOwner { .. } => ErrorKind::Forbidden,
            OrderError::NotPlaced => ErrorKind::NotFound,
            OrderError::ReasonRequired
            | OrderError::DroneRequired
            | OrderError::NoItems
            | OrderError::InvalidQuantity { .. }
            | OrderError::InvalidPrice { .. }
            | OrderError::InvalidWeight { .. }
            | OrderError::MixedRestaurants
            | OrderError::AlreadyPlaced => ErrorKind::Validation,
        }
    }
}
