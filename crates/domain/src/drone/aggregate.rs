//! Drone aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, GeoPoint};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};

use super::{DroneError, DroneEvent, DroneSpec, DroneStatus, FlightStep, Mission};

/// A drone within this distance of its target counts as arrived.
pub const ARRIVAL_TOLERANCE_KM: f64 = 0.05;

/// Drone aggregate root.
///
/// Status changes go through the event stream, so two writers racing on
/// the same drone are serialized by the stream version: only one
/// `DroneReserved` can follow a given `idle` state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Drone {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    name: String,
    model: String,
    status: DroneStatus,
    battery_level: f64,
    max_payload_kg: f64,
    max_distance_km: f64,
    position: GeoPoint,
    base: GeoPoint,
    total_distance_km: f64,
    flight_hours: f64,
    order_id: Option<AggregateId>,
    destination: Option<GeoPoint>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Drone {
    type Event = DroneEvent;
    type Error = DroneError;

    fn aggregate_type() -> &'static str {
        "Drone"
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
            DroneEvent::DroneCommissioned {
                drone_id,
                name,
                model,
                max_payload_kg,
                max_distance_km,
                battery_level,
                base,
                status,
                at,
            } => {
                self.id = Some(drone_id);
                self.name = name;
                self.model = model;
                self.max_payload_kg = max_payload_kg;
                self.max_distance_km = max_distance_km;
                self.battery_level = battery_level;
                self.base = base;
                self.position = base;
                self.status = status;
                self.updated_at = Some(at);
            }
            DroneEvent::DroneReserved {
                order_id,
                destination,
                at,
            } => {
                self.status = DroneStatus::InUse;
                self.order_id = Some(order_id);
                self.destination = Some(destination);
                self.updated_at = Some(at);
            }
            DroneEvent::ReservationReleased { at, .. } => {
                self.status = DroneStatus::Idle;
                self.order_id = None;
                self.destination = None;
                self.updated_at = Some(at);
            }
            DroneEvent::DroneMoved {
                position,
                battery_level,
                travelled_km,
                flight_hours,
                at,
                ..
            } => {
                self.position = position;
                self.battery_level = battery_level;
                self.total_distance_km += travelled_km;
                self.flight_hours += flight_hours;
                self.updated_at = Some(at);
            }
            DroneEvent::ReturnStarted { at, .. } => {
                self.status = DroneStatus::Returning;
                self.order_id = None;
                self.destination = Some(self.base);
                self.updated_at = Some(at);
            }
            DroneEvent::DroneLanded { at } => {
                self.status = DroneStatus::Idle;
                self.position = self.base;
                self.destination = None;
                self.updated_at = Some(at);
            }
            DroneEvent::ChargingStarted { at } => {
                self.status = DroneStatus::Charging;
                self.updated_at = Some(at);
            }
            DroneEvent::DroneCharged { battery_level, at } => {
                self.battery_level = battery_level;
                self.updated_at = Some(at);
            }
            DroneEvent::ChargingCompleted { at } | DroneEvent::MaintenanceReleased { at, .. } => {
                self.status = DroneStatus::Idle;
                self.updated_at = Some(at);
            }
            DroneEvent::MaintenanceStarted { at, .. } => {
                self.status = DroneStatus::Maintenance;
                self.order_id = None;
                self.destination = None;
                self.updated_at = Some(at);
            }
            DroneEvent::StatusOverridden { to, at, .. } => {
                self.status = to;
                self.order_id = None;
                self.destination = (to == DroneStatus::Returning).then_some(self.base);
                self.updated_at = Some(at);
            }
        }
    }
}

impl SnapshotCapable for Drone {
    fn snapshot_interval() -> usize {
        50
    }
}

// Query methods
impl Drone {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn status(&self) -> DroneStatus {
        self.status
    }

    pub fn battery_level(&self) -> f64 {
        self.battery_level
    }

    pub fn max_payload_kg(&self) -> f64 {
        self.max_payload_kg
    }

    pub fn max_distance_km(&self) -> f64 {
        self.max_distance_km
    }

    pub fn position(&self) -> GeoPoint {
        self.position
    }

    pub fn base(&self) -> GeoPoint {
        self.base
    }

    pub fn total_distance_km(&self) -> f64 {
        self.total_distance_km
    }

    pub fn flight_hours(&self) -> f64 {
        self.flight_hours
    }

    /// The order this drone is reserved for while `in_use`.
    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn destination(&self) -> Option<GeoPoint> {
        self.destination
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn remaining_km(&self) -> Option<f64> {
        self.destination.map(|d| self.position.distance_km(&d))
    }

    pub fn has_arrived(&self) -> bool {
        self.remaining_km()
            .is_some_and(|remaining| remaining <= ARRIVAL_TOLERANCE_KM)
    }

    pub fn is_at_base(&self) -> bool {
        self.position.distance_km(&self.base) <= ARRIVAL_TOLERANCE_KM
    }

    /// Static constraints only; availability is checked separately.
    pub fn can_carry(&self, weight_kg: f64, distance_km: f64, min_battery: f64) -> bool {
        self.check_capacity(weight_kg, distance_km, min_battery).is_ok()
    }

    fn check_capacity(&self, weight_kg: f64, distance_km: f64, min_battery: f64) -> Result<(), DroneError> {
        let reason = if self.max_payload_kg < weight_kg {
            format!("payload {weight_kg:.2} kg exceeds {:.2} kg", self.max_payload_kg)
        } else if self.max_distance_km < distance_km {
            format!("distance {distance_km:.2} km exceeds range {:.2} km", self.max_distance_km)
        } else if self.battery_level < min_battery {
            format!("battery {:.1}% below required {min_battery:.1}%", self.battery_level)
        } else {
            return Ok(());
        };
        Err(DroneError::Unsuitable { reason })
    }
}

// Command methods
impl Drone {
    pub fn commission(
        &self,
        drone_id: AggregateId,
        spec: DroneSpec,
        now: DateTime<Utc>,
    ) -> Result<Vec<DroneEvent>, DroneError> {
        if self.id.is_some() {
            return Err(DroneError::AlreadyCommissioned);
        }
        if spec.name.trim().is_empty() {
            return Err(DroneError::InvalidSpec("name is required".into()));
        }
        if !(spec.max_payload_kg > 0.0) || !(spec.max_distance_km > 0.0) {
            return Err(DroneError::InvalidSpec(
                "payload and range must be positive".into(),
            ));
        }
        if !(0.0..=100.0).contains(&spec.battery_level) {
            return Err(DroneError::InvalidSpec(format!(
                "battery level {} outside 0..=100",
                spec.battery_level
            )));
        }
        if spec.status.is_flying() {
            return Err(DroneError::InvalidSpec(format!(
                "a new drone cannot start {}",
                spec.status
            )));
        }

        Ok(vec![DroneEvent::DroneCommissioned {
            drone_id,
            name: spec.name,
            model: spec.model,
            max_payload_kg: spec.max_payload_kg,
            max_distance_km: spec.max_distance_km,
            battery_level: spec.battery_level,
            base: spec.base,
            status: spec.status,
            at: now,
        }])
    }

    /// Idle → in_use. Losing a race to another reservation shows up as
    /// `NotAvailable` here or as a version conflict on append.
    pub fn reserve(&self, mission: &Mission, now: DateTime<Utc>) -> Result<Vec<DroneEvent>, DroneError> {
        self.ensure_commissioned()?;
        if self.status != DroneStatus::Idle {
            return Err(DroneError::NotAvailable {
                status: self.status,
            });
        }
        self.check_capacity(mission.weight_kg, mission.distance_km, mission.min_battery)?;

        Ok(vec![DroneEvent::DroneReserved {
            order_id: mission.order_id,
            destination: mission.destination,
            at: now,
        }])
    }

    pub fn release_reservation(
        &self,
        order_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DroneEvent>, DroneError> {
        self.ensure_reserved_for(order_id)?;
        Ok(vec![DroneEvent::ReservationReleased { order_id, at: now }])
    }

    /// Advances a flying drone by one step. Grounded drones produce nothing.
    pub fn fly(&self, step: &FlightStep, now: DateTime<Utc>) -> Result<Vec<DroneEvent>, DroneError> {
        self.ensure_commissioned()?;
        let Some(destination) = self.destination.filter(|_| self.status.is_flying()) else {
            return Ok(vec![]);
        };

        let returning = self.status == DroneStatus::Returning;
        if self.has_arrived() {
            return Ok(if returning {
                vec![DroneEvent::DroneLanded { at: now }]
            } else {
                vec![]
            });
        }

        let leg = self.position.step_towards(&destination, step.step_km);
        let (position, travelled_km, remaining_km) = if leg.remaining_km <= ARRIVAL_TOLERANCE_KM {
            (destination, leg.travelled_km + leg.remaining_km, 0.0)
        } else {
            (leg.position, leg.travelled_km, leg.remaining_km)
        };
        if travelled_km <= 0.0 {
            return Ok(vec![]);
        }

        let battery_level = (self.battery_level - travelled_km * step.drain_per_km).max(0.0);
        let flight_hours = if step.speed_kmh > 0.0 {
            travelled_km / step.speed_kmh
        } else {
            0.0
        };

        let mut events = vec![DroneEvent::DroneMoved {
            position,
            battery_level,
            travelled_km,
            remaining_km,
            flight_hours,
            at: now,
        }];
        if returning && remaining_km == 0.0 {
            events.push(DroneEvent::DroneLanded { at: now });
        }
        Ok(events)
    }

    /// In_use → returning once the order has been handed over.
    pub fn release_after_delivery(
        &self,
        order_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DroneEvent>, DroneError> {
        self.ensure_reserved_for(order_id)?;
        Ok(vec![DroneEvent::ReturnStarted {
            order_id: Some(order_id),
            at: now,
        }])
    }

    /// Sends the drone home. A loaded drone abandons its order.
    pub fn return_to_base(&self, now: DateTime<Utc>) -> Result<Vec<DroneEvent>, DroneError> {
        self.ensure_commissioned()?;
        match self.status {
            DroneStatus::Returning => Ok(vec![]),
            DroneStatus::InUse => Ok(vec![DroneEvent::ReturnStarted {
                order_id: self.order_id,
                at: now,
            }]),
            DroneStatus::Idle if !self.is_at_base() => Ok(vec![DroneEvent::ReturnStarted {
                order_id: None,
                at: now,
            }]),
            status => Err(DroneError::InvalidStatus {
                action: "return",
                status,
            }),
        }
    }

    /// Idle → charging; already charging is a no-op.
    pub fn charge(&self, now: DateTime<Utc>) -> Result<Vec<DroneEvent>, DroneError> {
        self.ensure_commissioned()?;
        match self.status {
            DroneStatus::Idle => Ok(vec![DroneEvent::ChargingStarted { at: now }]),
            DroneStatus::Charging => Ok(vec![]),
            status => Err(DroneError::InvalidStatus {
                action: "charge",
                status,
            }),
        }
    }

    /// Adds charge; a full battery ends the charging cycle.
    pub fn charge_tick(&self, amount: f64, now: DateTime<Utc>) -> Result<Vec<DroneEvent>, DroneError> {
        self.ensure_commissioned()?;
        if self.status != DroneStatus::Charging {
            return Err(DroneError::InvalidStatus {
                action: "charge",
                status: self.status,
            });
        }

        let battery_level = (self.battery_level + amount.max(0.0)).min(100.0);
        let mut events = vec![DroneEvent::DroneCharged {
            battery_level,
            at: now,
        }];
        if battery_level >= 100.0 {
            events.push(DroneEvent::ChargingCompleted { at: now });
        }
        Ok(events)
    }

    pub fn enter_maintenance(&self, actor: Actor, now: DateTime<Utc>) -> Result<Vec<DroneEvent>, DroneError> {
        self.ensure_commissioned()?;
        match self.status {
            DroneStatus::Maintenance => Ok(vec![]),
            DroneStatus::InUse => Err(DroneError::Busy {
                order_id: self.order_id,
            }),
            from => Ok(vec![DroneEvent::MaintenanceStarted {
                from,
                actor,
                at: now,
            }]),
        }
    }

    pub fn release_maintenance(&self, actor: Actor, now: DateTime<Utc>) -> Result<Vec<DroneEvent>, DroneError> {
        self.ensure_commissioned()?;
        if self.status != DroneStatus::Maintenance {
            return Err(DroneError::InvalidStatus {
                action: "release from maintenance",
                status: self.status,
            });
        }
        Ok(vec![DroneEvent::MaintenanceReleased { actor, at: now }])
    }

    /// Admin-only direct status change. `in_use` is reachable only through
    /// a reservation.
    pub fn override_status(
        &self,
        to: DroneStatus,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<DroneEvent>, DroneError> {
        self.ensure_commissioned()?;
        if !actor.is_admin() {
            return Err(DroneError::NotAdmin { role: actor.role });
        }
        if to == DroneStatus::InUse {
            return Err(DroneError::InvalidStatus {
                action: "set in_use without a reservation",
                status: self.status,
            });
        }
        if to == self.status {
            return Ok(vec![]);
        }
        Ok(vec![DroneEvent::StatusOverridden {
            from: self.status,
            to,
            actor,
            at: now,
        }])
    }

    fn ensure_commissioned(&self) -> Result<(), DroneError> {
        if self.id.is_none() {
            return Err(DroneError::NotCommissioned);
        }
        Ok(())
    }

    fn ensure_reserved_for(&self, order_id: AggregateId) -> Result<(), DroneError> {
        self.ensure_commissioned()?;
        if self.status != DroneStatus::InUse {
            return Err(DroneError::InvalidStatus {
                action: "release",
                status: self.status,
            });
        }
        if self.order_id != Some(order_id) {
            return Err(DroneError::OrderMismatch {
                expected: order_id,
                actual: self.order_id,
            });
        }
        Ok(())
    }
}
