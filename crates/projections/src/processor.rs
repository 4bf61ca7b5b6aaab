//! Projection processor for feeding events to projections.

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;

use crate::Result;
use crate::projection::Projection;

/// Feeds events from an event store to registered projections.
///
/// - Catch-up: streams everything after the slowest projection's position
/// - Single event delivery: pushes one envelope to every projection
/// - Rebuild: resets all projections and replays from the start of the log
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Brings every projection up to the head of the log.
    ///
    /// Returns the number of deliveries made.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        if self.projections.is_empty() {
            return Ok(0);
        }

        let mut from = u64::MAX;
        for projection in &self.projections {
            from = from.min(projection.position().await.last_sequence);
        }

        let mut stream = self.store.stream_events_after(from).await?;
        let mut delivered: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            for projection in &self.projections {
                if projection.position().await.covers(event.sequence) {
                    continue;
                }
                projection.handle(&event).await?;
                delivered += 1;
            }
        }

        if delivered > 0 {
            metrics::counter!("projections_events_processed").increment(delivered);
            tracing::debug!(from, delivered, "catch-up complete");
        }

        Ok(delivered)
    }

    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type, sequence = event.sequence))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        for projection in &self.projections {
            projection.handle(event).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        let delivered = self.run_catch_up().await?;
        tracing::info!(projections = self.projections.len(), delivered, "projections rebuilt");
        Ok(())
    }
}
