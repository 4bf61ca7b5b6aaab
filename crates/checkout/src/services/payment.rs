//! Payment provider that executes charges.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{AggregateId, RestaurantId};
use domain::{Money, PaymentMethod};

use super::lock;
use crate::error::CollaboratorError;

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Idempotency key: charging the same payment twice yields one charge.
    pub payment_id: AggregateId,
    pub order_id: AggregateId,
    pub restaurant_id: RestaurantId,
    pub amount: Money,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReceipt {
    pub transaction_id: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, CollaboratorError>;
}

#[derive(Debug)]
struct ProviderState {
    receipts: HashMap<AggregateId, ChargeReceipt>,
    declined: HashSet<RestaurantId>,
    unavailable: bool,
    delay: Option<Duration>,
    next_txn: u64,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            receipts: HashMap::new(),
            declined: HashSet::new(),
            unavailable: false,
            delay: None,
            next_txn: 1001,
        }
    }
}

/// In-memory provider; transaction ids look like `TXN-1001`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl InMemoryPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines every charge for orders of `restaurant_id`.
    pub fn decline_restaurant(&self, restaurant_id: RestaurantId) {
        lock(&self.state).declined.insert(restaurant_id);
    }

    pub fn accept_restaurant(&self, restaurant_id: RestaurantId) {
        lock(&self.state).declined.remove(&restaurant_id);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Delays every answer, for exercising caller timeouts.
    pub fn set_delay(&self, delay: Option<Duration>) {
        lock(&self.state).delay = delay;
    }

    /// Number of distinct payments charged.
    pub fn charge_count(&self) -> usize {
        lock(&self.state).receipts.len()
    }

    pub fn receipt(&self, payment_id: AggregateId) -> Option<ChargeReceipt> {
        lock(&self.state).receipts.get(&payment_id).cloned()
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, CollaboratorError> {
        let delay = lock(&self.state).delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        if state.unavailable {
            return Err(CollaboratorError::Unavailable {
                service: "payment",
                reason: "provider unreachable".into(),
            });
        }
        if let Some(receipt) = state.receipts.get(&request.payment_id) {
            return Ok(receipt.clone());
        }
        if state.declined.contains(&request.restaurant_id) {
            return Err(CollaboratorError::Declined(format!(
                "{} charge of {} refused",
                request.method, request.amount
            )));
        }

        let receipt = ChargeReceipt {
            transaction_id: format!("TXN-{}", state.next_txn),
        };
        state.next_txn += 1;
        state.receipts.insert(request.payment_id, receipt.clone());
        Ok(receipt)
    }
}
