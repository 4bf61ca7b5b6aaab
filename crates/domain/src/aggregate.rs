//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// A fact that happened to an aggregate. Named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Discriminator stored alongside the payload; used for filtering.
    fn event_type(&self) -> &'static str;
}

/// An event-sourced consistency boundary.
///
/// State is rebuilt by folding events through [`Aggregate::apply`]; command
/// methods on the concrete type inspect the state and return new events
/// without mutating anything.
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    type Error: std::error::Error + Send + Sync;

    /// Stream family name, e.g. "Order".
    fn aggregate_type() -> &'static str;

    /// `None` until the creation event has been applied.
    fn id(&self) -> Option<AggregateId>;

    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    /// Folds one event into the state.
    ///
    /// Must be deterministic and infallible: events are facts.
    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

/// Aggregates whose state is periodically persisted as a snapshot.
pub trait SnapshotCapable: Aggregate + Serialize + DeserializeOwned {
    /// Number of events between snapshots.
    fn snapshot_interval() -> usize {
        100
    }

    fn should_snapshot(&self) -> bool {
        self.version().as_i64() > 0
            && (self.version().as_i64() as usize).is_multiple_of(Self::snapshot_interval())
    }
}
