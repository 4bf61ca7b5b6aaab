//! Drone operational status.

use serde::{Deserialize, Serialize};

/// Where a drone is in its duty cycle.
///
/// ```text
/// idle ──reserve──► in_use ──release──► returning ──land──► idle
/// idle ──charge──► charging ──full──► idle
/// any but in_use ──► maintenance ──admin release──► idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DroneStatus {
    #[default]
    Idle,
    InUse,
    Returning,
    Charging,
    Maintenance,
}

impl DroneStatus {
    pub const ALL: [DroneStatus; 5] = [
        DroneStatus::Idle,
        DroneStatus::InUse,
        DroneStatus::Returning,
        DroneStatus::Charging,
        DroneStatus::Maintenance,
    ];

    /// Whether the drone is in the air.
    pub fn is_flying(&self) -> bool {
        matches!(self, DroneStatus::InUse | DroneStatus::Returning)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DroneStatus::Idle => "idle",
            DroneStatus::InUse => "in_use",
            DroneStatus::Returning => "returning",
            DroneStatus::Charging => "charging",
            DroneStatus::Maintenance => "maintenance",
        }
    }
}

impl std::fmt::Display for DroneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DroneStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DroneStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown drone status '{s}'"))
    }
}
