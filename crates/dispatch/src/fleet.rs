//! Fleet manager: drone assignment and fleet administration.

use common::{Actor, AggregateId};
use domain::{
    Aggregate, CommandResult, Drone, DroneEvent, DroneService, DroneSpec, DroneStatus, ErrorKind,
    Mission, OrderService, OrderStatus, TelemetrySample,
};
use event_store::EventStore;
use serde::Serialize;

use crate::config::FleetConfig;
use crate::error::{DispatchError, Result};
use crate::selection;

/// A drone reserved for an order that is now in delivery.
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub order_id: AggregateId,
    pub drone_id: AggregateId,
    pub battery_level: f64,
    pub distance_km: f64,
}

/// Assigns drones to ready orders and administers the fleet.
///
/// Reservation is a compare-and-swap on the drone stream: two assignments
/// racing for one drone can both pick it, but only one append lands.
pub struct FleetManager<S: EventStore> {
    drones: DroneService<S>,
    orders: OrderService<S>,
    config: FleetConfig,
}

impl<S: EventStore + Clone> Clone for FleetManager<S> {
    fn clone(&self) -> Self {
        Self {
            drones: self.drones.clone(),
            orders: self.orders.clone(),
            config: self.config,
        }
    }
}

impl<S: EventStore + Clone> FleetManager<S> {
    pub fn new(store: S, config: FleetConfig) -> Self {
        Self {
            drones: DroneService::new(store.clone()),
            orders: OrderService::new(store),
            config,
        }
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn drones(&self) -> &DroneService<S> {
        &self.drones
    }

    /// Reserves the best idle drone for a ready order and moves the order
    /// into delivery.
    #[tracing::instrument(skip(self))]
    pub async fn assign(&self, order_id: AggregateId) -> Result<Assignment> {
        let order = self.orders.get_order(order_id).await?;
        if let Some(drone_id) = order.drone_id() {
            return Err(DispatchError::AlreadyAssigned { order_id, drone_id });
        }
        if order.status() != OrderStatus::Ready {
            return Err(DispatchError::NotReady {
                order_id,
                status: order.status(),
            });
        }
        let destination = order
            .delivery_location()
            .ok_or(DispatchError::MissingLocation(order_id))?;

        let mission = Mission {
            order_id,
            destination,
            weight_kg: order.total_weight_kg(),
            distance_km: order.distance_km(),
            min_battery: self.config.threshold(order.distance_km()),
        };

        let fleet = self.drones.list_drones().await?;
        for candidate in selection::rank(&fleet, &mission) {
            let Some(drone_id) = candidate.id() else { continue };
            match self.drones.reserve(drone_id, &mission).await {
                Ok(_) => {}
                Err(e) if matches!(e.kind(), ErrorKind::StaleState | ErrorKind::Infeasible) => {
                    tracing::debug!(%drone_id, error = %e, "candidate taken, trying next");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            if let Err(e) = self.orders.dispatch_order(order_id, drone_id).await {
                tracing::warn!(%drone_id, error = %e, "order moved during assignment, releasing drone");
                if let Err(release) = self.drones.release_reservation(drone_id, order_id).await {
                    tracing::error!(%drone_id, error = %release, "failed to release reservation");
                }
                return Err(e.into());
            }

            metrics::counter!("fleet_assignments_total").increment(1);
            tracing::info!(%drone_id, battery = candidate.battery_level(), "drone assigned");
            return Ok(Assignment {
                order_id,
                drone_id,
                battery_level: candidate.battery_level(),
                distance_km: mission.distance_km,
            });
        }

        metrics::counter!("fleet_infeasible_total").increment(1);
        Err(DispatchError::Infeasible {
            order_id,
            reason: selection::explain(&fleet, &mission),
        })
    }

    #[tracing::instrument(skip(self, spec), fields(name = %spec.name))]
    pub async fn commission(&self, spec: DroneSpec, actor: Actor) -> Result<Drone> {
        require_admin(&actor)?;
        Ok(self.drones.commission(spec).await?.aggregate)
    }

    pub async fn charge(&self, drone_id: AggregateId, actor: Actor) -> Result<Drone> {
        require_admin(&actor)?;
        Ok(self.drones.charge(drone_id).await?.aggregate)
    }

    pub async fn maintenance(&self, drone_id: AggregateId, actor: Actor) -> Result<Drone> {
        require_admin(&actor)?;
        Ok(self.drones.enter_maintenance(drone_id, actor).await?.aggregate)
    }

    pub async fn release_maintenance(&self, drone_id: AggregateId, actor: Actor) -> Result<Drone> {
        require_admin(&actor)?;
        Ok(self.drones.release_maintenance(drone_id, actor).await?.aggregate)
    }

    /// Sends a drone home. A loaded drone abandons its order, which stays in
    /// delivery for an admin to resolve.
    #[tracing::instrument(skip(self))]
    pub async fn return_to_base(&self, drone_id: AggregateId, actor: Actor) -> Result<Drone> {
        require_admin(&actor)?;
        let result = self.drones.return_to_base(drone_id).await?;
        self.warn_abandoned(&result);
        Ok(result.aggregate)
    }

    /// Admin status override; reaching `in_use` requires an assignment.
    #[tracing::instrument(skip(self))]
    pub async fn set_status(&self, drone_id: AggregateId, to: DroneStatus, actor: Actor) -> Result<Drone> {
        require_admin(&actor)?;
        let before = self.drones.get_drone(drone_id).await?;
        let result = self.drones.override_status(drone_id, to, actor).await?;
        if let (DroneStatus::InUse, Some(order_id)) = (before.status(), before.order_id()) {
            tracing::warn!(%drone_id, %order_id, %to, "override abandoned an order in delivery");
        }
        Ok(result.aggregate)
    }

    pub async fn get(&self, drone_id: AggregateId) -> Result<Drone> {
        Ok(self.drones.get_drone(drone_id).await?)
    }

    pub async fn list(&self) -> Result<Vec<Drone>> {
        Ok(self.drones.list_drones().await?)
    }

    pub async fn tracking(&self, drone_id: AggregateId, limit: usize) -> Result<Vec<TelemetrySample>> {
        self.drones.get_drone(drone_id).await?;
        Ok(self.drones.tracking(drone_id, limit).await?)
    }

    fn warn_abandoned(&self, result: &CommandResult<Drone>) {
        for event in &result.events {
            if let DroneEvent::ReturnStarted {
                order_id: Some(order_id),
                ..
            } = event
            {
                tracing::warn!(drone_id = ?result.aggregate.id(), %order_id, "drone recalled with an order on board");
            }
        }
    }
}

fn require_admin(actor: &Actor) -> Result<()> {
    if !actor.is_admin() {
        return Err(DispatchError::NotAdmin { role: actor.role });
    }
    Ok(())
}
