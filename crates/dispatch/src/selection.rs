//! Drone selection for a mission.

use domain::{Drone, DroneStatus, Mission};

/// Idle drones able to fly `mission`, best first: highest battery, then the
/// least flown.
pub fn rank<'a>(drones: &'a [Drone], mission: &Mission) -> Vec<&'a Drone> {
    let mut candidates: Vec<&Drone> = drones
        .iter()
        .filter(|d| d.status() == DroneStatus::Idle)
        .filter(|d| d.can_carry(mission.weight_kg, mission.distance_km, mission.min_battery))
        .collect();

    candidates.sort_by(|a, b| {
        b.battery_level()
            .total_cmp(&a.battery_level())
            .then(a.total_distance_km().total_cmp(&b.total_distance_km()))
    });
    candidates
}

/// Why nothing in `drones` qualifies for `mission`.
pub fn explain(drones: &[Drone], mission: &Mission) -> String {
    let idle = drones
        .iter()
        .filter(|d| d.status() == DroneStatus::Idle)
        .count();
    if idle == 0 {
        return format!("none of {} drones is idle", drones.len());
    }
    format!(
        "{idle} idle drones, none carries {:.2} kg over {:.2} km with {:.1}% battery",
        mission.weight_kg, mission.distance_km, mission.min_battery
    )
}
