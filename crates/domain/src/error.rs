//! Domain error types.

use common::AggregateId;
use event_store::{EventStoreError, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::CartError;
use crate::drone::DroneError;
use crate::order::OrderError;
use crate::payment::PaymentError;

/// Failure classes callers react to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad cart or input; fix and resubmit.
    Validation,
    /// Illegal state edge; not retried automatically.
    InvalidTransition,
    /// Concurrent modification; refetch and retry.
    StaleState,
    /// No drone satisfies the constraints right now.
    Infeasible,
    PaymentFailed,
    /// Catalog, payment or geocoding collaborator unreachable.
    UpstreamUnavailable,
    NotFound,
    Forbidden,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::StaleState => "stale_state",
            ErrorKind::Infeasible => "infeasible",
            ErrorKind::PaymentFailed => "payment_failed",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(EventStoreError),

    /// The aggregate changed between load and append.
    #[error("Stale state for {aggregate_id}: expected version {expected}, found {actual}")]
    StaleState {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Drone error: {0}")]
    Drone(#[from] DroneError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("{aggregate_type} not found: {aggregate_id}")]
    NotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<EventStoreError> for DomainError {
    fn from(e: EventStoreError) -> Self {
        match e {
            EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            } => DomainError::StaleState {
                aggregate_id,
                expected,
                actual,
            },
            other => DomainError::EventStore(other),
        }
    }
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::StaleState { .. } => ErrorKind::StaleState,
            DomainError::Order(e) => e.kind(),
            DomainError::Drone(e) => e.kind(),
            DomainError::Payment(e) => e.kind(),
            DomainError::Cart(_) => ErrorKind::Validation,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::EventStore(_) | DomainError::Serialization(_) => ErrorKind::Internal,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.kind() == ErrorKind::StaleState
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_conflict_becomes_stale_state() {
        let err: DomainError = EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::new(1),
            actual: Version::new(2),
        }
        .into();

        assert!(matches!(err, DomainError::StaleState { .. }));
        assert_eq!(err.kind(), ErrorKind::StaleState);
    }

    #[test]
    fn other_store_failures_are_internal() {
        let err: DomainError = EventStoreError::InvalidAppend("empty".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn kind_serializes_in_snake_case() {
        let json = serde_json::to_string(&ErrorKind::UpstreamUnavailable).unwrap();
        assert_eq!(json, "\"upstream_unavailable\"");
        assert_eq!(ErrorKind::InvalidTransition.to_string(), "invalid_transition");
    }
}
