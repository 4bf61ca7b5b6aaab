//! Command payloads for the order aggregate.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, CustomerId, GeoPoint, RestaurantId};

use super::{OrderItem, OrderStatus};

/// Creates an order in `waiting_confirmation`.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: AggregateId,
    /// Checkout batch this order was placed by, if any.
    pub checkout_id: Option<AggregateId>,
    pub customer_id: CustomerId,
    pub restaurant_id: RestaurantId,
    pub items: Vec<OrderItem>,
    pub delivery_address: String,
    pub delivery_location: GeoPoint,
    pub restaurant_location: GeoPoint,
    pub notes: Option<String>,
}

/// A requested status change.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub to: OrderStatus,
    pub actor: Actor,
    pub note: Option<String>,
    /// Required when rejecting.
    pub reason: Option<String>,
    /// Required when starting delivery.
    pub drone_id: Option<AggregateId>,
    /// If set, the transition only applies while the stored status equals it.
    pub expected: Option<OrderStatus>,
    pub at: DateTime<Utc>,
}

impl TransitionRequest {
    pub fn new(to: OrderStatus, actor: Actor) -> Self {
        Self {
            to,
            actor,
            note: None,
            reason: None,
            drone_id: None,
            expected: None,
            at: Utc::now(),
        }
    }

    pub fn expecting(mut self, status: OrderStatus) -> Self {
        self.expected = Some(status);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn drone(mut self, drone_id: AggregateId) -> Self {
        self.drone_id = Some(drone_id);
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}
