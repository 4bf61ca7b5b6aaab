//! Order domain events.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, CustomerId, GeoPoint, RestaurantId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::payment::{PaymentMethod, PaymentStatus};

use super::{Money, OrderItem, OrderStatus};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderPlaced(OrderPlacedData),

    /// One edge of the state machine was taken; one history entry.
    OrderStatusChanged(StatusChangedData),

    /// The order's payment ledger reported a new payment state.
    OrderPaymentRecorded(PaymentRecordedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::OrderStatusChanged(_) => "OrderStatusChanged",
            OrderEvent::OrderPaymentRecorded(_) => "OrderPaymentRecorded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub checkout_id: Option<AggregateId>,
    pub customer_id: CustomerId,
    pub restaurant_id: RestaurantId,
    pub items: Vec<OrderItem>,
    pub delivery_address: String,
    pub delivery_location: GeoPoint,
    pub restaurant_location: GeoPoint,
    pub notes: Option<String>,
    /// Great-circle distance restaurant to delivery point.
    pub distance_km: f64,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub actor: Actor,
    pub note: Option<String>,
    pub rejection_reason: Option<String>,
    pub drone_id: Option<AggregateId>,
    /// Never earlier than the previous history entry.
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecordedData {
    pub payment_id: AggregateId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
