//! Payment ledger: every payment attempt for one order, at most one live.

mod aggregate;
mod events;
mod model;
mod service;

pub use aggregate::PaymentLedger;
pub use events::PaymentEvent;
pub use model::{Payment, PaymentMethod, PaymentStatus};
pub use service::{PaymentAttempt, PaymentService};

use common::AggregateId;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment not found: {payment_id}")]
    NotFound { payment_id: AggregateId },

    /// The payment was already settled one way or the other.
    #[error("Payment {payment_id} is {status}, not pending")]
    NotPending {
        payment_id: AggregateId,
        status: PaymentStatus,
    },

    #[error("Invalid payment amount: {amount}")]
    InvalidAmount { amount: i64 },
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::NotFound { .. } => ErrorKind::NotFound,
            PaymentError::NotPending { .. } => ErrorKind::InvalidTransition,
            PaymentError::InvalidAmount { .. } => ErrorKind::Validation,
        }
    }
}
