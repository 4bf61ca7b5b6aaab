//! Geocoding of delivery addresses and restaurant coordinates.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{GeoPoint, RestaurantId};

use super::lock;
use crate::error::CollaboratorError;

#[async_trait]
pub trait LocationService: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<GeoPoint, CollaboratorError>;

    async fn restaurant_location(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<GeoPoint, CollaboratorError>;
}

#[derive(Debug, Default)]
struct LocationState {
    addresses: HashMap<String, GeoPoint>,
    restaurants: HashMap<RestaurantId, GeoPoint>,
    /// Unknown addresses resolve to a stable point near here.
    around: Option<GeoPoint>,
    offline: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLocationService {
    state: Arc<Mutex<LocationState>>,
}

/// Largest offset, in degrees, of a synthesized point from its centre.
const SPREAD_DEG: f64 = 0.03;

impl InMemoryLocationService {
    /// Only registered addresses and restaurants resolve.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves any address to a deterministic point within a few km of
    /// `center`. Unregistered restaurants sit at `center`.
    pub fn around(center: GeoPoint) -> Self {
        let service = Self::new();
        lock(&service.state).around = Some(center);
        service
    }

    pub fn add_address(&self, address: impl Into<String>, point: GeoPoint) {
        lock(&self.state).addresses.insert(normalize(&address.into()), point);
    }

    pub fn add_restaurant(&self, restaurant_id: RestaurantId, point: GeoPoint) {
        lock(&self.state).restaurants.insert(restaurant_id, point);
    }

    pub fn set_offline(&self, offline: bool) {
        lock(&self.state).offline = offline;
    }

    fn check_online(state: &LocationState) -> Result<(), CollaboratorError> {
        if state.offline {
            return Err(CollaboratorError::Unavailable {
                service: "geocoding",
                reason: "service offline".into(),
            });
        }
        Ok(())
    }
}

fn normalize(address: &str) -> String {
    address.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn synthesize(center: GeoPoint, key: &str) -> GeoPoint {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    let bits = hasher.finish();
    let unit = |v: u64| (v & 0xffff) as f64 / f64::from(u16::MAX) * 2.0 - 1.0;
    GeoPoint::new(
        center.lat + unit(bits) * SPREAD_DEG,
        center.lng + unit(bits >> 16) * SPREAD_DEG,
    )
}

#[async_trait]
impl LocationService for InMemoryLocationService {
    async fn geocode(&self, address: &str) -> Result<GeoPoint, CollaboratorError> {
        let state = lock(&self.state);
        Self::check_online(&state)?;

        let key = normalize(address);
        if let Some(point) = state.addresses.get(&key) {
            return Ok(*point);
        }
        match state.around {
            Some(center) if !key.is_empty() => Ok(synthesize(center, &key)),
            _ => Err(CollaboratorError::UnknownAddress(address.to_string())),
        }
    }

    async fn restaurant_location(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<GeoPoint, CollaboratorError> {
        let state = lock(&self.state);
        Self::check_online(&state)?;

        state
            .restaurants
            .get(&restaurant_id)
            .copied()
            .or(state.around)
            .ok_or(CollaboratorError::UnknownRestaurant(restaurant_id.get()))
    }
}
