//! Drone domain events.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, GeoPoint};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::DroneStatus;

/// Events that can occur on a drone aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DroneEvent {
    DroneCommissioned {
        drone_id: AggregateId,
        name: String,
        model: String,
        max_payload_kg: f64,
        max_distance_km: f64,
        battery_level: f64,
        base: GeoPoint,
        status: DroneStatus,
        at: DateTime<Utc>,
    },

    /// Idle → in_use for one order. The CAS point of fleet assignment.
    DroneReserved {
        order_id: AggregateId,
        destination: GeoPoint,
        at: DateTime<Utc>,
    },

    /// A reservation was undone before the drone took off.
    ReservationReleased {
        order_id: AggregateId,
        at: DateTime<Utc>,
    },

    /// One telemetry sample.
    DroneMoved {
        position: GeoPoint,
        battery_level: f64,
        travelled_km: f64,
        remaining_km: f64,
        flight_hours: f64,
        at: DateTime<Utc>,
    },

    /// Heading back to base, with or without a delivered order.
    ReturnStarted {
        order_id: Option<AggregateId>,
        at: DateTime<Utc>,
    },

    DroneLanded {
        at: DateTime<Utc>,
    },

    ChargingStarted {
        at: DateTime<Utc>,
    },

    DroneCharged {
        battery_level: f64,
        at: DateTime<Utc>,
    },

    ChargingCompleted {
        at: DateTime<Utc>,
    },

    MaintenanceStarted {
        from: DroneStatus,
        actor: Actor,
        at: DateTime<Utc>,
    },

    MaintenanceReleased {
        actor: Actor,
        at: DateTime<Utc>,
    },

    /// Admin set the status directly.
    StatusOverridden {
        from: DroneStatus,
        to: DroneStatus,
        actor: Actor,
        at: DateTime<Utc>,
    },
}

impl DroneEvent {
    pub const MOVED: &'static str = "DroneMoved";
}

impl DomainEvent for DroneEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DroneEvent::DroneCommissioned { .. } => "DroneCommissioned",
            DroneEvent::DroneReserved { .. } => "DroneReserved",
            DroneEvent::ReservationReleased { .. } => "ReservationReleased",
            DroneEvent::DroneMoved { .. } => Self::MOVED,
            DroneEvent::ReturnStarted { .. } => "ReturnStarted",
            DroneEvent::DroneLanded { .. } => "DroneLanded",
            DroneEvent::ChargingStarted { .. } => "ChargingStarted",
            DroneEvent::DroneCharged { .. } => "DroneCharged",
            DroneEvent::ChargingCompleted { .. } => "ChargingCompleted",
            DroneEvent::MaintenanceStarted { .. } => "MaintenanceStarted",
            DroneEvent::MaintenanceReleased { .. } => "MaintenanceReleased",
            DroneEvent::StatusOverridden { .. } => "StatusOverridden",
        }
    }
}
