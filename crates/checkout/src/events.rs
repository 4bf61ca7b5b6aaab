//! Checkout saga events.

use chrono::{DateTime, Utc};
use common::{AggregateId, CustomerId, RestaurantId};
use domain::{DomainEvent, ErrorKind, Money, PaymentMethod, PaymentStatus};
use serde::{Deserialize, Serialize};

use crate::state::CheckoutStatus;

/// Why one restaurant's order did not make it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    CheckoutStarted(CheckoutStartedData),

    OrderPlaced {
        restaurant_id: RestaurantId,
        order_id: AggregateId,
    },

    /// The restaurant's order could not be created; siblings are unaffected.
    OrderPlacementFailed {
        restaurant_id: RestaurantId,
        failure: StepFailure,
    },

    /// Latest payment state of one placed order.
    PaymentSettled {
        order_id: AggregateId,
        payment_id: AggregateId,
        status: PaymentStatus,
        transaction_id: Option<String>,
        failure: Option<StepFailure>,
    },

    CheckoutFinished {
        status: CheckoutStatus,
        at: DateTime<Utc>,
    },
}

impl DomainEvent for CheckoutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::CheckoutStarted(_) => "CheckoutStarted",
            CheckoutEvent::OrderPlaced { .. } => "CheckoutOrderPlaced",
            CheckoutEvent::OrderPlacementFailed { .. } => "CheckoutOrderPlacementFailed",
            CheckoutEvent::PaymentSettled { .. } => "CheckoutPaymentSettled",
            CheckoutEvent::CheckoutFinished { .. } => "CheckoutFinished",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutStartedData {
    pub checkout_id: AggregateId,
    pub customer_id: CustomerId,
    pub delivery_address: String,
    pub payment_method: PaymentMethod,
    /// One entry per restaurant group, in group order.
    pub groups: Vec<(RestaurantId, Money)>,
    pub started_at: DateTime<Utc>,
}
