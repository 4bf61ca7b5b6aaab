//! Domain layer of the drone delivery order core.
//!
//! - [`Aggregate`] / [`CommandHandler`]: event-sourced load, decide, append
//! - [`order`]: the order state machine with role-gated transitions
//! - [`drone`]: fleet members, their reservation and telemetry
//! - [`payment`]: one payment ledger per order, at most one live payment
//! - [`cart`]: request-scoped carts and the pure cart validator

pub mod aggregate;
pub mod cart;
pub mod command;
pub mod drone;
pub mod error;
pub mod order;
pub mod payment;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use cart::{Cart, CartError, CartItem, CartPolicy, CatalogEntry, RestaurantGroup};
pub use command::{CommandHandler, CommandResult};
pub use drone::{
    Drone, DroneError, DroneEvent, DroneService, DroneSpec, DroneStatus, FlightStep, Mission,
    TelemetrySample,
};
pub use error::{DomainError, ErrorKind};
pub use order::{
    HistoryEntry, Money, Order, OrderError, OrderEvent, OrderItem, OrderPayment, OrderPolicy,
    OrderService, OrderStatus, PlaceOrder, TransitionRequest,
};
pub use payment::{
    Payment, PaymentAttempt, PaymentError, PaymentEvent, PaymentLedger, PaymentMethod,
    PaymentService, PaymentStatus,
};
