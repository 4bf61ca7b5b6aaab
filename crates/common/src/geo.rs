//! Great-circle distances and straight-line flight stepping.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Outcome of flying one step towards a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub position: GeoPoint,
    pub travelled_km: f64,
    pub remaining_km: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Haversine distance in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }

    /// Moves at most `step_km` towards `target`.
    ///
    /// Interpolates linearly in degrees, which is accurate enough at delivery
    /// ranges of a few tens of kilometres. Never overshoots the target.
    pub fn step_towards(&self, target: &GeoPoint, step_km: f64) -> Leg {
        let distance = self.distance_km(target);
        if step_km <= 0.0 {
            return Leg {
                position: *self,
                travelled_km: 0.0,
                remaining_km: distance,
            };
        }
        if step_km >= distance {
            return Leg {
                position: *target,
                travelled_km: distance,
                remaining_km: 0.0,
            };
        }

        let fraction = step_km / distance;
        let position = GeoPoint {
            lat: self.lat + (target.lat - self.lat) * fraction,
            lng: self.lng + (target.lng - self.lng) * fraction,
        };
        Leg {
            position,
            travelled_km: step_km,
            remaining_km: position.distance_km(target),
        }
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPOT: GeoPoint = GeoPoint::new(10.762622, 106.660172);

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(DEPOT.distance_km(&DEPOT), 0.0);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let north = GeoPoint::new(DEPOT.lat + 1.0, DEPOT.lng);
        let d = DEPOT.distance_km(&north);
        assert!((d - 111.19).abs() < 0.1, "got {d}");
    }

    #[test]
    fn stepping_never_overshoots() {
        let target = GeoPoint::new(DEPOT.lat + 0.01, DEPOT.lng);
        let leg = DEPOT.step_towards(&target, 100.0);
        assert_eq!(leg.position, target);
        assert_eq!(leg.remaining_km, 0.0);
    }

    #[test]
    fn partial_step_reduces_remaining_distance() {
        let target = GeoPoint::new(DEPOT.lat + 0.05, DEPOT.lng + 0.05);
        let total = DEPOT.distance_km(&target);
        let leg = DEPOT.step_towards(&target, 1.0);
        assert!((leg.travelled_km - 1.0).abs() < f64::EPSILON);
        assert!((leg.remaining_km - (total - 1.0)).abs() < 0.01);
    }

    #[test]
    fn zero_step_stays_put() {
        let target = GeoPoint::new(DEPOT.lat + 0.05, DEPOT.lng);
        let leg = DEPOT.step_towards(&target, 0.0);
        assert_eq!(leg.position, DEPOT);
        assert_eq!(leg.travelled_km, 0.0);
    }
}
