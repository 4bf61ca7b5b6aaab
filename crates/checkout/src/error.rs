//! Checkout error types.

use common::AggregateId;
use domain::{CartError, DomainError, ErrorKind, OrderStatus};
use thiserror::Error;

/// Failures reported by the consumed collaborators.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {reason}")]
    Unavailable { service: &'static str, reason: String },

    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Address could not be located: {0}")]
    UnknownAddress(String),

    #[error("No location known for restaurant {0}")]
    UnknownRestaurant(u64),
}

impl CollaboratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollaboratorError::Unavailable { .. } => ErrorKind::UpstreamUnavailable,
            CollaboratorError::Declined(_) => ErrorKind::PaymentFailed,
            CollaboratorError::UnknownAddress(_) | CollaboratorError::UnknownRestaurant(_) => {
                ErrorKind::Validation
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart rejected: {0}")]
    Cart(#[from] CartError),

    #[error("A delivery address is required")]
    MissingAddress,

    #[error("No payment method given and none on record for order {order_id}")]
    MissingPaymentMethod { order_id: AggregateId },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Payment provider did not answer within {seconds}s")]
    PaymentTimeout { seconds: u64 },

    #[error("Payment {payment_id} is already being charged")]
    PaymentInFlight { payment_id: AggregateId },

    #[error("{0} does not belong to the caller")]
    NotOwner(AggregateId),

    #[error("Order {order_id} is {status} and cannot be paid")]
    NotPayable {
        order_id: AggregateId,
        status: OrderStatus,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl CheckoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::Cart(_)
            | CheckoutError::MissingAddress
            | CheckoutError::MissingPaymentMethod { .. } => ErrorKind::Validation,
            CheckoutError::Collaborator(e) => e.kind(),
            CheckoutError::PaymentTimeout { .. } => ErrorKind::PaymentFailed,
            CheckoutError::PaymentInFlight { .. } => ErrorKind::StaleState,
            CheckoutError::NotOwner(_) => ErrorKind::Forbidden,
            CheckoutError::NotPayable { .. } => ErrorKind::InvalidTransition,
            CheckoutError::Domain(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CheckoutError>;
