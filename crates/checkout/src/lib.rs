//! Checkout saga: turns a cart into per-restaurant orders and pays each.
//!
//! The checkout follows these steps:
//! 1. Validate the cart against the product catalog
//! 2. Place one order per restaurant group
//! 3. Open and charge exactly one payment per placed order
//!
//! Groups succeed or fail independently. A checkout id replayed by the
//! client re-runs only the idempotent payment step.

pub mod aggregate;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod services;
pub mod state;

pub use aggregate::{CheckoutLine, CheckoutSaga};
pub use config::CheckoutConfig;
pub use coordinator::{CheckoutCoordinator, CheckoutRequest, CheckoutResult, OrderOutcome};
pub use error::{CheckoutError, CollaboratorError};
pub use events::{CheckoutEvent, StepFailure};
pub use services::{
    ChargeReceipt, ChargeRequest, InMemoryLocationService, InMemoryPaymentProvider,
    InMemoryProductCatalog, LocationService, PaymentProvider, ProductCatalog,
};
pub use state::CheckoutStatus;
