//! Command payloads for the drone aggregate.

use common::{AggregateId, GeoPoint};

use super::DroneStatus;

/// Registration data for a new drone.
#[derive(Debug, Clone)]
pub struct DroneSpec {
    pub name: String,
    pub model: String,
    pub max_payload_kg: f64,
    pub max_distance_km: f64,
    pub battery_level: f64,
    pub base: GeoPoint,
    /// Only `idle`, `charging` or `maintenance` are valid starting points.
    pub status: DroneStatus,
}

/// What a drone must be able to do to take an order.
#[derive(Debug, Clone, Copy)]
pub struct Mission {
    pub order_id: AggregateId,
    pub destination: GeoPoint,
    pub weight_kg: f64,
    pub distance_km: f64,
    /// Battery needed for the round trip plus reserve.
    pub min_battery: f64,
}

/// One simulated telemetry interval.
#[derive(Debug, Clone, Copy)]
pub struct FlightStep {
    pub step_km: f64,
    pub drain_per_km: f64,
    pub speed_kmh: f64,
}
