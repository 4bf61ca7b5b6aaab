//! Core projection trait and position tracking.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// The global sequence of the last event a projection has folded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectionPosition {
    pub last_sequence: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self { last_sequence: 0 }
    }

    /// Whether the event at `sequence` has already been folded in.
    ///
    /// Sequence 0 marks an envelope that never went through a store; it is
    /// always considered new.
    pub fn covers(&self, sequence: u64) -> bool {
        sequence != 0 && sequence <= self.last_sequence
    }

    pub fn advance_to(&self, sequence: u64) -> Self {
        Self {
            last_sequence: self.last_sequence.max(sequence),
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.last_sequence)
    }
}

/// A projection that folds events into a read model.
///
/// `handle` must be idempotent per sequence: the processor may deliver an
/// event twice when catch-ups overlap.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Clears the read model and rewinds to the start of the log.
    async fn reset(&self) -> Result<()>;
}
