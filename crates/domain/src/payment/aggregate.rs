//! Payment ledger aggregate.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::order::Money;

use super::{Payment, PaymentError, PaymentEvent, PaymentMethod, PaymentStatus};

/// All payment attempts for one order.
///
/// The ledger is its own stream, keyed by a deterministic id derived from
/// the order id, so two concurrent checkouts for the same order contend on
/// one stream version and only one of them can open a payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentLedger {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    order_id: Option<AggregateId>,
    payments: Vec<Payment>,
}

impl Aggregate for PaymentLedger {
    type Event = PaymentEvent;
    type Error = PaymentError;

    fn aggregate_type() -> &'static str {
        "PaymentLedger"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            PaymentEvent::PaymentRequested {
                ledger_id,
                order_id,
                payment_id,
                amount,
                method,
                at,
            } => {
                self.id = Some(ledger_id);
                self.order_id = Some(order_id);
                self.payments.push(Payment {
                    id: payment_id,
                    order_id,
                    amount,
                    method,
                    status: PaymentStatus::Pending,
                    transaction_id: None,
                    failure_reason: None,
                    created_at: at,
                    updated_at: at,
                });
            }
            PaymentEvent::PaymentCompleted {
                payment_id,
                transaction_id,
                at,
            } => {
                if let Some(payment) = self.payment_mut(payment_id) {
                    payment.status = PaymentStatus::Completed;
                    payment.transaction_id = Some(transaction_id);
                    payment.updated_at = at;
                }
            }
            PaymentEvent::PaymentFailed {
                payment_id,
                reason,
                at,
            } => {
                if let Some(payment) = self.payment_mut(payment_id) {
                    payment.status = PaymentStatus::Failed;
                    payment.failure_reason = Some(reason);
                    payment.updated_at = at;
                }
            }
        }
    }
}

impl PaymentLedger {
    /// The ledger id for `order_id`.
    pub fn id_for(order_id: AggregateId) -> AggregateId {
        order_id.derive("payment-ledger")
    }

    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    /// Every attempt, oldest first.
    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    /// The single pending or completed payment, if any.
    pub fn active(&self) -> Option<&Payment> {
        self.payments.iter().find(|p| p.status.is_live())
    }

    pub fn payment(&self, payment_id: AggregateId) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == payment_id)
    }

    fn payment_mut(&mut self, payment_id: AggregateId) -> Option<&mut Payment> {
        self.payments.iter_mut().find(|p| p.id == payment_id)
    }

    /// Opens a new payment unless a live one already exists, in which case
    /// nothing is emitted and the caller reuses [`active`](Self::active).
    pub fn request(
        &self,
        order_id: AggregateId,
        payment_id: AggregateId,
        amount: Money,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        if !amount.is_positive() {
            return Err(PaymentError::InvalidAmount {
                amount: amount.minor(),
            });
        }
        if self.active().is_some() {
            return Ok(vec![]);
        }

        Ok(vec![PaymentEvent::PaymentRequested {
            ledger_id: Self::id_for(order_id),
            order_id,
            payment_id,
            amount,
            method,
            at: now,
        }])
    }

    pub fn complete(
        &self,
        payment_id: AggregateId,
        transaction_id: String,
        now: DateTime<Utc>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        let payment = self.require(payment_id)?;
        match payment.status {
            PaymentStatus::Pending => Ok(vec![PaymentEvent::PaymentCompleted {
                payment_id,
                transaction_id,
                at: now,
            }]),
            PaymentStatus::Completed
                if payment.transaction_id.as_deref() == Some(transaction_id.as_str()) =>
            {
                Ok(vec![])
            }
            status => Err(PaymentError::NotPending { payment_id, status }),
        }
    }

    pub fn fail(
        &self,
        payment_id: AggregateId,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        let payment = self.require(payment_id)?;
        match payment.status {
            PaymentStatus::Pending => Ok(vec![PaymentEvent::PaymentFailed {
                payment_id,
                reason,
                at: now,
            }]),
            PaymentStatus::Failed => Ok(vec![]),
            status => Err(PaymentError::NotPending { payment_id, status }),
        }
    }

    fn require(&self, payment_id: AggregateId) -> Result<&Payment, PaymentError> {
        self.payment(payment_id)
            .ok_or(PaymentError::NotFound { payment_id })
    }
}
