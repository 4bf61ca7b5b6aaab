//! Drone dispatch for the delivery core.
//!
//! - [`FleetManager`] picks and reserves a drone for a ready order and
//!   administers the fleet
//! - [`DispatchScheduler`] runs the recurring tick: assignment, simulated
//!   flight, delivery completion and charging

pub mod config;
pub mod error;
pub mod fleet;
pub mod scheduler;
pub mod selection;

pub use config::{FleetConfig, SchedulerConfig};
pub use error::{DispatchError, Result};
pub use fleet::{Assignment, FleetManager};
pub use scheduler::{DispatchScheduler, TickReport};
