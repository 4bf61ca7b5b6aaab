//! Payment service: idempotent payment creation keyed by order.

use chrono::Utc;
use common::AggregateId;
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::order::Money;

use super::{Payment, PaymentError, PaymentLedger, PaymentMethod};

/// Writers racing on the same ledger retry this many times before giving up.
const OPEN_ATTEMPTS: usize = 3;

/// Result of asking for a payment.
#[derive(Debug, Clone)]
pub enum PaymentAttempt {
    /// A fresh pending payment was opened.
    New(Payment),
    /// A live payment already existed and is returned unchanged.
    Existing(Payment),
}

impl PaymentAttempt {
    pub fn payment(&self) -> &Payment {
        match self {
            PaymentAttempt::New(p) | PaymentAttempt::Existing(p) => p,
        }
    }

    pub fn into_payment(self) -> Payment {
        match self {
            PaymentAttempt::New(p) | PaymentAttempt::Existing(p) => p,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, PaymentAttempt::New(_))
    }
}

/// Service for managing payments.
pub struct PaymentService<S: EventStore> {
    handler: CommandHandler<S, PaymentLedger>,
}

impl<S: EventStore + Clone> Clone for PaymentService<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
        }
    }
}

impl<S: EventStore> PaymentService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Returns the order's live payment, opening one if there is none.
    ///
    /// Calling this any number of times, concurrently or not, leaves at most
    /// one pending or completed payment on the order.
    #[tracing::instrument(skip(self))]
    pub async fn open(
        &self,
        order_id: AggregateId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<PaymentAttempt, DomainError> {
        let ledger_id = PaymentLedger::id_for(order_id);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let payment_id = AggregateId::new();
            let outcome = self
                .handler
                .execute(ledger_id, |ledger| {
                    ledger.request(order_id, payment_id, amount, method, Utc::now())
                })
                .await;

            match outcome {
                Ok(result) => return Self::attempt_from(result, payment_id),
                Err(e) if e.is_stale() && attempt < OPEN_ATTEMPTS => {
                    tracing::debug!(attempt, "payment ledger moved, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn attempt_from(
        result: CommandResult<PaymentLedger>,
        payment_id: AggregateId,
    ) -> Result<PaymentAttempt, DomainError> {
        let created = !result.events.is_empty();
        let payment = if created {
            result.aggregate.payment(payment_id)
        } else {
            result.aggregate.active()
        };
        let payment = payment
            .cloned()
            .ok_or(PaymentError::NotFound { payment_id })?;

        if created {
            metrics::counter!("payments_opened_total").increment(1);
            Ok(PaymentAttempt::New(payment))
        } else {
            tracing::debug!(payment_id = %payment.id, "reusing live payment");
            Ok(PaymentAttempt::Existing(payment))
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn complete(
        &self,
        order_id: AggregateId,
        payment_id: AggregateId,
        transaction_id: String,
    ) -> Result<Payment, DomainError> {
        let result = self
            .handler
            .execute_existing(PaymentLedger::id_for(order_id), |ledger| {
                ledger.complete(payment_id, transaction_id, Utc::now())
            })
            .await?;
        Self::settled(result, payment_id)
    }

    #[tracing::instrument(skip(self))]
    pub async fn fail(
        &self,
        order_id: AggregateId,
        payment_id: AggregateId,
        reason: String,
    ) -> Result<Payment, DomainError> {
        let result = self
            .handler
            .execute_existing(PaymentLedger::id_for(order_id), |ledger| {
                ledger.fail(payment_id, reason, Utc::now())
            })
            .await?;
        metrics::counter!("payments_failed_total").increment(1);
        Self::settled(result, payment_id)
    }

    fn settled(
        result: CommandResult<PaymentLedger>,
        payment_id: AggregateId,
    ) -> Result<Payment, DomainError> {
        result
            .aggregate
            .payment(payment_id)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound { payment_id }.into())
    }

    /// Every attempt for the order, oldest first.
    pub async fn payments_for(&self, order_id: AggregateId) -> Result<Vec<Payment>, DomainError> {
        let ledger = self.handler.load(PaymentLedger::id_for(order_id)).await?;
        Ok(ledger.payments().to_vec())
    }

    pub async fn active_payment(&self, order_id: AggregateId) -> Result<Option<Payment>, DomainError> {
        let ledger = self.handler.load(PaymentLedger::id_for(order_id)).await?;
        Ok(ledger.active().cloned())
    }
}
