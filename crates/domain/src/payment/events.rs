//! Payment ledger events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::order::Money;

use super::PaymentMethod;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PaymentEvent {
    PaymentRequested {
        ledger_id: AggregateId,
        order_id: AggregateId,
        payment_id: AggregateId,
        amount: Money,
        method: PaymentMethod,
        at: DateTime<Utc>,
    },
    PaymentCompleted {
        payment_id: AggregateId,
        transaction_id: String,
        at: DateTime<Utc>,
    },
    PaymentFailed {
        payment_id: AggregateId,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl DomainEvent for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentRequested { .. } => "PaymentRequested",
            PaymentEvent::PaymentCompleted { .. } => "PaymentCompleted",
            PaymentEvent::PaymentFailed { .. } => "PaymentFailed",
        }
    }
}
