//! Event storage for the order core.
//!
//! Every aggregate (order, drone, payment ledger, checkout) is persisted as an
//! ordered stream of [`EventEnvelope`]s. Appends are guarded by an expected
//! version so concurrent writers cannot both succeed against the same state.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use query::{EventQuery, QueryOrder};
pub use snapshot::Snapshot;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
