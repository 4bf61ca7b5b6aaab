//! Drone service: fleet member commands over the command handler.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, GeoPoint};
use event_store::{EventQuery, EventStore};
use serde::Serialize;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{Drone, DroneEvent, DroneSpec, DroneStatus, FlightStep, Mission};

/// One point of a drone's flight path.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySample {
    pub position: GeoPoint,
    pub battery_level: f64,
    pub remaining_km: f64,
    pub at: DateTime<Utc>,
}

/// Service for managing drones.
///
/// Mutations go through `execute_with_snapshot`; telemetry makes drone
/// streams long.
pub struct DroneService<S: EventStore> {
    handler: CommandHandler<S, Drone>,
}

impl<S: EventStore + Clone> Clone for DroneService<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
        }
    }
}

impl<S: EventStore> DroneService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Drone> {
        &self.handler
    }

    #[tracing::instrument(skip(self, spec), fields(name = %spec.name))]
    pub async fn commission(&self, spec: DroneSpec) -> Result<CommandResult<Drone>, DomainError> {
        let drone_id = AggregateId::new();
        let result = self
            .handler
            .execute(drone_id, |drone| drone.commission(drone_id, spec, Utc::now()))
            .await?;
        tracing::info!(%drone_id, "drone commissioned");
        Ok(result)
    }

    /// Idle → in_use for `mission.order_id`.
    #[tracing::instrument(skip(self, mission), fields(order_id = %mission.order_id))]
    pub async fn reserve(
        &self,
        drone_id: AggregateId,
        mission: &Mission,
    ) -> Result<CommandResult<Drone>, DomainError> {
        self.handler
            .execute_with_snapshot(drone_id, |drone| drone.reserve(mission, Utc::now()))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn release_reservation(
        &self,
        drone_id: AggregateId,
        order_id: AggregateId,
    ) -> Result<CommandResult<Drone>, DomainError> {
        self.handler
            .execute_with_snapshot(drone_id, |drone| {
                drone.release_reservation(order_id, Utc::now())
            })
            .await
    }

    pub async fn fly(
        &self,
        drone_id: AggregateId,
        step: FlightStep,
    ) -> Result<CommandResult<Drone>, DomainError> {
        self.handler
            .execute_with_snapshot(drone_id, |drone| drone.fly(&step, Utc::now()))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn release_after_delivery(
        &self,
        drone_id: AggregateId,
        order_id: AggregateId,
    ) -> Result<CommandResult<Drone>, DomainError> {
        self.handler
            .execute_with_snapshot(drone_id, |drone| {
                drone.release_after_delivery(order_id, Utc::now())
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn return_to_base(
        &self,
        drone_id: AggregateId,
    ) -> Result<CommandResult<Drone>, DomainError> {
        self.handler
            .execute_with_snapshot(drone_id, |drone| drone.return_to_base(Utc::now()))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn charge(&self, drone_id: AggregateId) -> Result<CommandResult<Drone>, DomainError> {
        self.handler
            .execute_with_snapshot(drone_id, |drone| drone.charge(Utc::now()))
            .await
    }

    pub async fn charge_tick(
        &self,
        drone_id: AggregateId,
        amount: f64,
    ) -> Result<CommandResult<Drone>, DomainError> {
        self.handler
            .execute_with_snapshot(drone_id, |drone| drone.charge_tick(amount, Utc::now()))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn enter_maintenance(
        &self,
        drone_id: AggregateId,
        actor: Actor,
    ) -> Result<CommandResult<Drone>, DomainError> {
        self.handler
            .execute_with_snapshot(drone_id, |drone| drone.enter_maintenance(actor, Utc::now()))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn release_maintenance(
        &self,
        drone_id: AggregateId,
        actor: Actor,
    ) -> Result<CommandResult<Drone>, DomainError> {
        self.handler
            .execute_with_snapshot(drone_id, |drone| {
                drone.release_maintenance(actor, Utc::now())
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn override_status(
        &self,
        drone_id: AggregateId,
        to: DroneStatus,
        actor: Actor,
    ) -> Result<CommandResult<Drone>, DomainError> {
        self.handler
            .execute_with_snapshot(drone_id, |drone| drone.override_status(to, actor, Utc::now()))
            .await
    }

    pub async fn get_drone(&self, drone_id: AggregateId) -> Result<Drone, DomainError> {
        self.handler.load_required(drone_id).await
    }

    pub async fn list_drones(&self) -> Result<Vec<Drone>, DomainError> {
        self.handler.load_all().await
    }

    /// Most recent telemetry first.
    pub async fn tracking(
        &self,
        drone_id: AggregateId,
        limit: usize,
    ) -> Result<Vec<TelemetrySample>, DomainError> {
        let query = EventQuery::for_aggregate(drone_id)
            .event_type(DroneEvent::MOVED)
            .newest_first()
            .limit(limit);

        let envelopes = self.handler.store().query_events(query).await?;
        let mut samples = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            let event: DroneEvent = envelope.decode()?;
            if let DroneEvent::DroneMoved {
                position,
                battery_level,
                remaining_km,
                at,
                ..
            } = event
            {
                samples.push(TelemetrySample {
                    position,
                    battery_level,
                    remaining_km,
                    at,
                });
            }
        }
        Ok(samples)
    }
}
