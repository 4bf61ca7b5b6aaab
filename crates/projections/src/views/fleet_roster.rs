//! Fleet roster: the current state of every drone.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{Aggregate, Drone, DroneEvent, DroneStatus};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

#[derive(Default)]
struct Roster {
    drones: HashMap<AggregateId, Drone>,
    position: ProjectionPosition,
}

/// Drones folded from their event streams with the aggregate's own `apply`.
#[derive(Clone, Default)]
pub struct FleetRosterView {
    roster: Arc<RwLock<Roster>>,
}

impl FleetRosterView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, drone_id: AggregateId) -> Option<Drone> {
        self.roster.read().await.drones.get(&drone_id).cloned()
    }

    /// Every drone, sorted by name.
    pub async fn all(&self) -> Vec<Drone> {
        let roster = self.roster.read().await;
        let mut drones: Vec<_> = roster.drones.values().cloned().collect();
        drones.sort_by(|a, b| a.name().cmp(b.name()));
        drones
    }

    pub async fn by_status(&self, status: DroneStatus) -> Vec<Drone> {
        let mut drones = self.all().await;
        drones.retain(|d| d.status() == status);
        drones
    }

    pub async fn idle(&self) -> Vec<Drone> {
        self.by_status(DroneStatus::Idle).await
    }
}

#[async_trait]
impl Projection for FleetRosterView {
    fn name(&self) -> &'static str {
        "FleetRosterView"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        let mut roster = self.roster.write().await;
        if roster.position.covers(envelope.sequence) {
            return Ok(());
        }
        if envelope.aggregate_type == Drone::aggregate_type() {
            let event: DroneEvent = envelope.decode()?;
            let drone = roster.drones.entry(envelope.aggregate_id).or_default();
            drone.apply(event);
            drone.set_version(envelope.version);
        }
        roster.position = roster.position.advance_to(envelope.sequence);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.roster.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.roster.write().await = Roster::default();
        Ok(())
    }
}

impl ReadModel for FleetRosterView {
    fn name(&self) -> &'static str {
        "FleetRosterView"
    }

    fn count(&self) -> usize {
        self.roster.try_read().map(|r| r.drones.len()).unwrap_or(0)
    }
}
