//! Dispatch error types.

use common::{AggregateId, Role};
use domain::{DomainError, ErrorKind, OrderStatus};
use projections::ProjectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// No drone can take the order right now; the scheduler retries.
    #[error("No drone can deliver order {order_id}: {reason}")]
    Infeasible {
        order_id: AggregateId,
        reason: String,
    },

    #[error("Order {order_id} is {status}, not ready for dispatch")]
    NotReady {
        order_id: AggregateId,
        status: OrderStatus,
    },

    #[error("Order {order_id} already has drone {drone_id}")]
    AlreadyAssigned {
        order_id: AggregateId,
        drone_id: AggregateId,
    },

    #[error("Order {0} has no delivery location")]
    MissingLocation(AggregateId),

    #[error("Fleet administration requires an admin, not {role}")]
    NotAdmin { role: Role },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Read model error: {0}")]
    Projection(#[from] ProjectionError),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Infeasible { .. } => ErrorKind::Infeasible,
            DispatchError::NotReady { .. } => ErrorKind::InvalidTransition,
            DispatchError::AlreadyAssigned { .. } => ErrorKind::StaleState,
            DispatchError::MissingLocation(_) => ErrorKind::Validation,
            DispatchError::NotAdmin { .. } => ErrorKind::Forbidden,
            DispatchError::Domain(e) => e.kind(),
            DispatchError::Projection(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
