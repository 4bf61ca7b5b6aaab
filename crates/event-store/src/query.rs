use chrono::{DateTime, Utc};

use crate::{AggregateId, Version};

/// Direction in which matching events are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// Filter over the event log.
///
/// All set filters must match. With [`QueryOrder::NewestFirst`] and a limit,
/// the query returns the most recent `limit` matches, which is how drone
/// telemetry history is read.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub aggregate_id: Option<AggregateId>,
    pub aggregate_type: Option<String>,
    /// Any of these event types.
    pub event_types: Option<Vec<String>>,
    /// Inclusive lower version bound.
    pub from_version: Option<Version>,
    /// Inclusive lower timestamp bound.
    pub since: Option<DateTime<Utc>>,
    pub order: QueryOrder,
    pub limit: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_aggregate(aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_id: Some(aggregate_id),
            ..Default::default()
        }
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types
            .get_or_insert_with(Vec::new)
            .push(event_type.into());
        self
    }

    pub fn from_version(mut self, version: Version) -> Self {
        self.from_version = Some(version);
        self
    }

    pub fn since(mut self, timestamp: DateTime<Utc>) -> Self {
        self.since = Some(timestamp);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.order = QueryOrder::NewestFirst;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether an envelope satisfies every filter except ordering and limit.
    pub fn matches(&self, event: &crate::EventEnvelope) -> bool {
        if let Some(id) = self.aggregate_id
            && event.aggregate_id != id
        {
            return false;
        }
        if let Some(ref aggregate_type) = self.aggregate_type
            && &event.aggregate_type != aggregate_type
        {
            return false;
        }
        if let Some(ref types) = self.event_types
            && !types.contains(&event.event_type)
        {
            return false;
        }
        if let Some(from) = self.from_version
            && event.version < from
        {
            return false;
        }
        if let Some(since) = self.since
            && event.timestamp < since
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventEnvelope;

    fn envelope(aggregate_id: AggregateId, event_type: &str, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Drone")
            .event_type(event_type)
            .version(Version::new(version))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn event_type_accumulates() {
        let query = EventQuery::new()
            .event_type("DroneMoved")
            .event_type("DroneCharged");
        assert_eq!(
            query.event_types,
            Some(vec!["DroneMoved".to_string(), "DroneCharged".to_string()])
        );
    }

    #[test]
    fn matches_applies_all_filters() {
        let id = AggregateId::new();
        let query = EventQuery::for_aggregate(id)
            .aggregate_type("Drone")
            .event_type("DroneMoved")
            .from_version(Version::new(2));

        assert!(query.matches(&envelope(id, "DroneMoved", 2)));
        assert!(!query.matches(&envelope(id, "DroneMoved", 1)));
        assert!(!query.matches(&envelope(id, "DroneCharged", 3)));
        assert!(!query.matches(&envelope(AggregateId::new(), "DroneMoved", 3)));
    }

    #[test]
    fn newest_first_sets_order() {
        let query = EventQuery::new().newest_first().limit(20);
        assert_eq!(query.order, QueryOrder::NewestFirst);
        assert_eq!(query.limit, Some(20));
    }
}
