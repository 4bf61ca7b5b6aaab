//! Read model views.

mod fleet_roster;
mod order_board;

pub use fleet_roster::FleetRosterView;
pub use order_board::{OrderBoardView, OrderSummary};
