//! Shared types for the drone delivery order core.
//!
//! Identifiers, the request-scoped caller context and the small amount of
//! geodesy needed to price distances and fly drones.

pub mod actor;
pub mod geo;
pub mod types;

pub use actor::{Actor, Role};
pub use geo::{GeoPoint, Leg};
pub use types::{AggregateId, CustomerId, ProductId, RestaurantId};
