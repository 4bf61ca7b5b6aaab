//! Drone aggregate: one fleet member, its reservation and telemetry.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;

pub use aggregate::{ARRIVAL_TOLERANCE_KM, Drone};
pub use commands::{DroneSpec, FlightStep, Mission};
pub use events::DroneEvent;
pub use service::{DroneService, TelemetrySample};
pub use state::DroneStatus;

use common::{AggregateId, Role};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during drone operations.
#[derive(Debug, Error)]
pub enum DroneError {
    #[error("Drone already commissioned")]
    AlreadyCommissioned,

    #[error("Drone not commissioned")]
    NotCommissioned,

    #[error("Invalid drone spec: {0}")]
    InvalidSpec(String),

    /// Someone else reserved the drone, or it is not idle.
    #[error("Drone is not available (status {status})")]
    NotAvailable { status: DroneStatus },

    #[error("Drone cannot take this mission: {reason}")]
    Unsuitable { reason: String },

    #[error("Cannot {action} while {status}")]
    InvalidStatus {
        action: &'static str,
        status: DroneStatus,
    },

    #[error("Drone is not reserved for order {expected} (current: {actual:?})")]
    OrderMismatch {
        expected: AggregateId,
        actual: Option<AggregateId>,
    },

    #[error("Drone is carrying an order ({order_id:?})")]
    Busy { order_id: Option<AggregateId> },

    #[error("Only admins may change drone status directly, not {role}")]
    NotAdmin { role: Role },
}

impl DroneError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DroneError::AlreadyCommissioned | DroneError::InvalidSpec(_) => ErrorKind::Validation,
            DroneError::NotCommissioned => ErrorKind::NotFound,
            DroneError::NotAvailable { .. } | DroneError::OrderMismatch { .. } => {
                ErrorKind::StaleState
            }
            DroneError::Unsuitable { .. } => ErrorKind::Infeasible,
            DroneError::InvalidStatus { .. } | DroneError::Busy { .. } => {
                ErrorKind::InvalidTransition
            }
            DroneError::NotAdmin { .. } => ErrorKind::Forbidden,
        }
    }
}
