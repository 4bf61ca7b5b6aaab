//! Command handling infrastructure.
//!
//! Every state change follows the same path: load the aggregate (snapshot
//! plus tail), let a pure decision function turn the current state into
//! events, then append those events expecting the version that was loaded.
//! A concurrent writer makes the append fail, which surfaces as
//! [`DomainError::StaleState`]; nothing is ever written from a stale read.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, EventStoreExt, Snapshot, Version};

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;

/// Outcome of a successfully executed command.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// Events that were persisted; empty when the command was a no-op.
    pub events: Vec<A::Event>,

    pub new_version: Version,
}

/// Loads aggregates of type `A` from `S` and persists their decisions.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> Clone for CommandHandler<S, A>
where
    S: EventStore + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate + serde::de::DeserializeOwned,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate; a stream without events yields `A::default()`.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let (snapshot, events) = self.store.load_aggregate(aggregate_id).await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => {
                let version = snapshot.version;
                let mut restored: A = snapshot.into_state()?;
                restored.set_version(version);
                restored
            }
            None => A::default(),
        };

        for envelope in events {
            let event: A::Event = envelope.decode()?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning `None` if it was never created.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Loads an aggregate that must exist.
    pub async fn load_required(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        self.load_existing(aggregate_id)
            .await?
            .ok_or(DomainError::NotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id,
            })
    }

    /// Loads every aggregate of this type.
    pub async fn load_all(&self) -> Result<Vec<A>, DomainError> {
        let ids = self.store.list_aggregates(A::aggregate_type()).await?;
        let mut aggregates = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(aggregate) = self.load_existing(id).await? {
                aggregates.push(aggregate);
            }
        }
        Ok(aggregates)
    }

    /// Runs `command_fn` against the current state and appends its events.
    ///
    /// Used for creation commands; the aggregate may not exist yet.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let aggregate = self.load(aggregate_id).await?;
        self.decide_and_append(aggregate_id, aggregate, command_fn)
            .await
    }

    /// Like [`execute`](Self::execute), but fails with `NotFound` when the
    /// aggregate does not exist.
    pub async fn execute_existing<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let aggregate = self.load_required(aggregate_id).await?;
        self.decide_and_append(aggregate_id, aggregate, command_fn)
            .await
    }

    async fn decide_and_append<F>(
        &self,
        aggregate_id: AggregateId,
        mut aggregate: A,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let current_version = aggregate.version();
        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events,
                new_version: current_version,
            });
        }

        let envelopes = Self::build_envelopes(aggregate_id, current_version, &events)?;
        let new_version = self
            .store
            .append(envelopes, AppendOptions::expect_version(current_version))
            .await?;

        for event in &events {
            aggregate.apply(event.clone());
        }
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    fn build_envelopes(
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .build()?;
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
{
    /// Executes against an existing aggregate and snapshots on interval
    /// boundaries.
    pub async fn execute_with_snapshot<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let result = self.execute_existing(aggregate_id, command_fn).await?;

        // Batches may step over a boundary; check every version they covered.
        let first_new = result.new_version.as_i64() - result.events.len() as i64 + 1;
        let crossed = (first_new..=result.new_version.as_i64())
            .any(|v| v > 0 && (v as usize).is_multiple_of(A::snapshot_interval()));

        if !result.events.is_empty() && crossed {
            let snapshot = Snapshot::from_state(
                aggregate_id,
                A::aggregate_type(),
                result.new_version,
                &result.aggregate,
            )?;
            self.store.save_snapshot(snapshot).await?;
            tracing::debug!(%aggregate_id, version = %result.new_version, "snapshot saved");
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::InMemoryEventStore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TallyEvent {
        Opened { id: AggregateId },
        Added { amount: i32 },
    }

    impl DomainEvent for TallyEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TallyEvent::Opened { .. } => "TallyOpened",
                TallyEvent::Added { .. } => "TallyAdded",
            }
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct Tally {
        id: Option<AggregateId>,
        total: i32,
        #[serde(skip)]
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("negative amount {0}")]
    struct NegativeAmount(i32);

    impl From<NegativeAmount> for DomainError {
        fn from(e: NegativeAmount) -> Self {
            DomainError::Cart(crate::cart::CartError::NonPositiveQuantity {
                product_id: common::ProductId::new(e.0.unsigned_abs() as u64),
            })
        }
    }

    impl Aggregate for Tally {
        type Event = TallyEvent;
        type Error = NegativeAmount;

        fn aggregate_type() -> &'static str {
            "Tally"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                TallyEvent::Opened { id } => self.id = Some(id),
                TallyEvent::Added { amount } => self.total += amount,
            }
        }
    }

    impl SnapshotCapable for Tally {
        fn snapshot_interval() -> usize {
            3
        }
    }

    fn add(amount: i32) -> impl FnOnce(&Tally) -> Result<Vec<TallyEvent>, NegativeAmount> {
        move |_| {
            if amount < 0 {
                Err(NegativeAmount(amount))
            } else {
                Ok(vec![TallyEvent::Added { amount }])
            }
        }
    }

    async fn opened(handler: &CommandHandler<InMemoryEventStore, Tally>) -> AggregateId {
        let id = AggregateId::new();
        handler
            .execute(id, |_| Ok(vec![TallyEvent::Opened { id }]))
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn execute_appends_and_applies() {
        let handler = CommandHandler::<_, Tally>::new(InMemoryEventStore::new());
        let id = opened(&handler).await;

        let result = handler.execute_existing(id, add(5)).await.unwrap();
        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(result.aggregate.total, 5);

        let reloaded = handler.load_required(id).await.unwrap();
        assert_eq!(reloaded.total, 5);
        assert_eq!(reloaded.version(), Version::new(2));
    }

    #[tokio::test]
    async fn rejected_command_writes_nothing() {
        let store = InMemoryEventStore::new();
        let handler = CommandHandler::<_, Tally>::new(store.clone());
        let id = opened(&handler).await;

        assert!(handler.execute_existing(id, add(-1)).await.is_err());
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn execute_existing_requires_the_aggregate() {
        let handler = CommandHandler::<_, Tally>::new(InMemoryEventStore::new());
        let err = handler
            .execute_existing(AggregateId::new(), add(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { aggregate_type: "Tally", .. }));
    }

    #[tokio::test]
    async fn concurrent_writers_from_same_version_conflict() {
        let store = InMemoryEventStore::new();
        let handler = CommandHandler::<_, Tally>::new(store.clone());
        let id = opened(&handler).await;

        // Simulate a writer that loaded before another one committed.
        let stale = handler.load_required(id).await.unwrap();
        handler.execute_existing(id, add(1)).await.unwrap();

        let err = handler
            .decide_and_append(id, stale, add(2))
            .await
            .unwrap_err();
        assert!(err.is_stale());
        assert_eq!(handler.load_required(id).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn snapshots_restore_state_and_version() {
        let store = InMemoryEventStore::new();
        let handler = CommandHandler::<_, Tally>::new(store.clone());
        let id = opened(&handler).await;

        for amount in [1, 2, 3, 4] {
            handler.execute_with_snapshot(id, add(amount)).await.unwrap();
        }

        let snapshot = store.get_snapshot(id).await.unwrap().unwrap();
        assert_eq!(snapshot.version, Version::new(3));

        let reloaded = handler.load_required(id).await.unwrap();
        assert_eq!(reloaded.total, 10);
        assert_eq!(reloaded.version(), Version::new(5));
    }

    #[tokio::test]
    async fn load_all_lists_every_aggregate() {
        let handler = CommandHandler::<_, Tally>::new(InMemoryEventStore::new());
        let first = opened(&handler).await;
        let second = opened(&handler).await;

        let ids: Vec<_> = handler
            .load_all()
            .await
            .unwrap()
            .iter()
            .filter_map(|t| t.id())
            .collect();
        assert_eq!(ids, vec![first, second]);
    }
}
