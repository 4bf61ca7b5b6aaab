use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventQuery, EventStoreError, QueryOrder, Result, Snapshot, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct Log {
    /// Every event in commit order; `events[i].sequence == i + 1`.
    events: Vec<EventEnvelope>,
    /// Positions into `events` per aggregate, in version order.
    streams: HashMap<AggregateId, Vec<usize>>,
    /// Aggregates in the order their first event was committed.
    aggregates: Vec<(AggregateId, String)>,
    snapshots: HashMap<AggregateId, Snapshot>,
}

impl Log {
    fn version_of(&self, aggregate_id: AggregateId) -> Version {
        self.streams
            .get(&aggregate_id)
            .and_then(|positions| positions.last())
            .map(|&pos| self.events[pos].version)
            .unwrap_or_else(Version::initial)
    }

    fn stream(&self, aggregate_id: AggregateId) -> impl Iterator<Item = &EventEnvelope> {
        self.streams
            .get(&aggregate_id)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.events[pos])
    }
}

/// Event store held entirely in process memory.
///
/// Used by the default server wiring and by tests. The check-and-append runs
/// under one write lock, so compare-and-set semantics match the Postgres
/// store's unique `(aggregate_id, version)` constraint.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let aggregate_type = events[0].aggregate_type.clone();
        let mut log = self.log.write().await;
        let current = log.version_of(aggregate_id);

        let conflict = match options.expected_version {
            Some(expected) => expected != current,
            None => false,
        } || events[0].version != current.next();

        if conflict {
            metrics::counter!("event_store_conflicts_total", "aggregate_type" => aggregate_type)
                .increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current),
                actual: current,
            });
        }

        if current == Version::initial() {
            log.aggregates.push((aggregate_id, aggregate_type.clone()));
        }

        let count = events.len();
        let mut last_version = current;
        for mut event in events {
            let position = log.events.len();
            event.sequence = position as u64 + 1;
            last_version = event.version;
            log.events.push(event);
            log.streams.entry(aggregate_id).or_default().push(position);
        }

        metrics::counter!("event_store_appends_total", "aggregate_type" => aggregate_type)
            .increment(count as u64);

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log.stream(aggregate_id).cloned().collect())
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log
            .stream(aggregate_id)
            .filter(|e| e.version >= from_version)
            .cloned()
            .collect())
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        let limit = query.limit.unwrap_or(usize::MAX);

        let source: Box<dyn Iterator<Item = &EventEnvelope>> = match query.aggregate_id {
            Some(id) => Box::new(log.stream(id)),
            None => Box::new(log.events.iter()),
        };

        let events: Vec<_> = match query.order {
            QueryOrder::OldestFirst => source
                .filter(|e| query.matches(e))
                .take(limit)
                .cloned()
                .collect(),
            QueryOrder::NewestFirst => {
                let mut matching: Vec<_> = source.filter(|e| query.matches(e)).collect();
                matching.reverse();
                matching.into_iter().take(limit).cloned().collect()
            }
        };

        Ok(events)
    }

    async fn stream_events_after(&self, after: u64) -> Result<EventStream> {
        use futures_util::stream;

        let log = self.log.read().await;
        let start = usize::try_from(after)
            .unwrap_or(usize::MAX)
            .min(log.events.len());
        let events = log.events[start..].to_vec();

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let log = self.log.read().await;
        Ok(log
            .streams
            .contains_key(&aggregate_id)
            .then(|| log.version_of(aggregate_id)))
    }

    async fn list_aggregates(&self, aggregate_type: &str) -> Result<Vec<AggregateId>> {
        let log = self.log.read().await;
        Ok(log
            .aggregates
            .iter()
            .filter(|(_, kind)| kind == aggregate_type)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.log
            .write()
            .await
            .snapshots
            .insert(snapshot.aggregate_id, snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        Ok(self.log.read().await.snapshots.get(&aggregate_id).cloned())
    }
}
