//! Read models for the order and fleet query side.
//!
//! - [`Projection`] folds events into a view, idempotently per sequence
//! - [`ProjectionProcessor`] catches views up from the event store
//! - [`OrderBoardView`] backs order listings and the dispatch queue
//! - [`FleetRosterView`] backs fleet listings

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{FleetRosterView, OrderBoardView, OrderSummary};
