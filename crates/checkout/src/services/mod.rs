//! Consumed collaborators and their in-memory implementations.

pub mod catalog;
pub mod location;
pub mod payment;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use catalog::{InMemoryProductCatalog, ProductCatalog};
pub use location::{InMemoryLocationService, LocationService};
pub use payment::{ChargeReceipt, ChargeRequest, InMemoryPaymentProvider, PaymentProvider};

/// State behind these locks stays consistent across a panic.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
