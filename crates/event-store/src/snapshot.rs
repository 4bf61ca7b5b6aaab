use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};

use crate::{AggregateId, Result, Version};

/// Serialized aggregate state at a known version.
///
/// Long-lived streams (drones accumulate a telemetry event per tick) are
/// rebuilt from the latest snapshot plus the events after it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    /// Version of the last event folded into `state`.
    pub version: Version,
    pub timestamp: DateTime<Utc>,
    pub state: serde_json::Value,
}

impl Snapshot {
    pub fn from_state<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: &T,
    ) -> Result<Self> {
        Ok(Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            timestamp: Utc::now(),
            state: serde_json::to_value(state)?,
        })
    }

    pub fn into_state<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct FleetState {
        battery: f64,
        status: String,
    }

    #[test]
    fn state_survives_snapshotting() {
        let id = AggregateId::new();
        let original = FleetState {
            battery: 73.5,
            status: "idle".to_string(),
        };

        let snapshot = Snapshot::from_state(id, "Drone", Version::new(50), &original).unwrap();
        assert_eq!(snapshot.version, Version::new(50));
        assert_eq!(snapshot.aggregate_type, "Drone");

        let restored: FleetState = snapshot.into_state().unwrap();
        assert_eq!(restored, original);
    }
}
