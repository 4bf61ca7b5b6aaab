//! Fleet and scheduler settings.

use std::time::Duration;

use domain::FlightStep;

/// Flight model and battery policy shared by assignment and simulation.
#[derive(Debug, Clone, Copy)]
pub struct FleetConfig {
    pub speed_kmh: f64,
    /// Battery percentage points used per kilometre flown.
    pub drain_per_km: f64,
    /// Battery that must remain after the round trip.
    pub min_battery: f64,
    /// Battery points added per scheduler tick while charging.
    pub charge_per_tick: f64,
    /// Idle drones at base below this level start charging on their own.
    pub auto_charge_below: f64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            speed_kmh: 50.0,
            drain_per_km: 0.5,
            min_battery: 20.0,
            charge_per_tick: 10.0,
            auto_charge_below: 15.0,
        }
    }
}

impl FleetConfig {
    /// Battery needed to fly `distance_km` out and back with reserve.
    pub fn threshold(&self, distance_km: f64) -> f64 {
        self.min_battery + 2.0 * distance_km * self.drain_per_km
    }

    /// How far a drone gets in one tick.
    pub fn flight_step(&self, tick: Duration) -> FlightStep {
        FlightStep {
            step_km: self.speed_kmh * tick.as_secs_f64() / 3600.0,
            drain_per_km: self.drain_per_km,
            speed_kmh: self.speed_kmh,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub tick: Duration,
    /// Ready orders waiting longer than this are reported as overdue.
    pub infeasible_alert: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(5),
            infeasible_alert: Duration::from_secs(300),
        }
    }
}
