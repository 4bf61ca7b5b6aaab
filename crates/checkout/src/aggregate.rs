//! Checkout saga aggregate.

use chrono::{DateTime, Utc};
use common::{AggregateId, CustomerId, RestaurantId};
use domain::{Aggregate, DomainError, Money, Payment, PaymentMethod, PaymentStatus};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::events::{CheckoutEvent, CheckoutStartedData, StepFailure};
use crate::state::CheckoutStatus;

/// Progress of one restaurant group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub restaurant_id: RestaurantId,
    pub total_amount: Money,
    pub order_id: Option<AggregateId>,
    pub payment_id: Option<AggregateId>,
    pub payment_status: Option<PaymentStatus>,
    pub transaction_id: Option<String>,
    pub failure: Option<StepFailure>,
}

impl CheckoutLine {
    pub fn succeeded(&self) -> bool {
        self.order_id.is_some() && self.payment_status == Some(PaymentStatus::Completed)
    }
}

/// The event-sourced record of one checkout.
///
/// Each restaurant group's order is independent once placed; the saga only
/// remembers what happened to each so a replay can pick up the payment step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutSaga {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    customer_id: Option<CustomerId>,
    delivery_address: String,
    payment_method: Option<PaymentMethod>,
    status: CheckoutStatus,
    lines: Vec<CheckoutLine>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Aggregate for CheckoutSaga {
    type Event = CheckoutEvent;
    type Error = DomainError;

    fn aggregate_type() -> &'static str {
        "Checkout"
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
            CheckoutEvent::CheckoutStarted(data) => {
                self.id = Some(data.checkout_id);
                self.customer_id = Some(data.customer_id);
                self.delivery_address = data.delivery_address;
                self.payment_method = Some(data.payment_method);
                self.status = CheckoutStatus::Running;
                self.started_at = Some(data.started_at);
                self.lines = data
                    .groups
                    .into_iter()
                    .map(|(restaurant_id, total_amount)| CheckoutLine {
                        restaurant_id,
                        total_amount,
                        order_id: None,
                        payment_id: None,
                        payment_status: None,
                        transaction_id: None,
                        failure: None,
                    })
                    .collect();
            }
            CheckoutEvent::OrderPlaced {
                restaurant_id,
                order_id,
            } => {
                if let Some(line) = self.line_mut(restaurant_id) {
                    line.order_id = Some(order_id);
                    line.failure = None;
                }
            }
            CheckoutEvent::OrderPlacementFailed {
                restaurant_id,
                failure,
            } => {
                if let Some(line) = self.line_mut(restaurant_id) {
                    line.failure = Some(failure);
                }
            }
            CheckoutEvent::PaymentSettled {
                order_id,
                payment_id,
                status,
                transaction_id,
                failure,
            } => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.order_id == Some(order_id)) {
                    line.payment_id = Some(payment_id);
                    line.payment_status = Some(status);
                    line.transaction_id = transaction_id;
                    line.failure = failure;
                }
            }
            CheckoutEvent::CheckoutFinished { status, at } => {
                self.status = status;
                self.finished_at = Some(at);
            }
        }
    }
}

// Query methods
impl CheckoutSaga {
    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn delivery_address(&self) -> &str {
        &self.delivery_address
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn status(&self) -> CheckoutStatus {
        self.status
    }

    pub fn lines(&self) -> &[CheckoutLine] {
        &self.lines
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn placed_orders(&self) -> impl Iterator<Item = &CheckoutLine> {
        self.lines.iter().filter(|l| l.order_id.is_some())
    }

    /// Whether every group has either an order or a placement failure.
    pub fn is_resolved(&self) -> bool {
        self.lines
            .iter()
            .all(|l| l.order_id.is_some() || l.failure.is_some())
    }

    /// The status the current lines add up to.
    pub fn outcome(&self) -> CheckoutStatus {
        let succeeded = self.lines.iter().filter(|l| l.succeeded()).count();
        if succeeded == 0 {
            CheckoutStatus::Failed
        } else if succeeded == self.lines.len() {
            CheckoutStatus::Completed
        } else {
            CheckoutStatus::PartiallyCompleted
        }
    }

    fn line_mut(&mut self, restaurant_id: RestaurantId) -> Option<&mut CheckoutLine> {
        self.lines.iter_mut().find(|l| l.restaurant_id == restaurant_id)
    }

    fn missing(&self, aggregate_type: &'static str, aggregate_id: AggregateId) -> DomainError {
        DomainError::NotFound {
            aggregate_type,
            aggregate_id,
        }
    }
}

// Command methods
impl CheckoutSaga {
    /// Opens the saga; a started saga stays as it is.
    pub fn start(&self, data: CheckoutStartedData) -> Result<Vec<CheckoutEvent>, DomainError> {
        if self.id.is_some() {
            return Ok(vec![]);
        }
        Ok(vec![CheckoutEvent::CheckoutStarted(data)])
    }

    pub fn record_placement(
        &self,
        restaurant_id: RestaurantId,
        outcome: Result<AggregateId, StepFailure>,
    ) -> Result<Vec<CheckoutEvent>, DomainError> {
        let checkout_id = self.id.unwrap_or_default();
        let line = self
            .lines
            .iter()
            .find(|l| l.restaurant_id == restaurant_id)
            .ok_or_else(|| self.missing("CheckoutLine", checkout_id))?;

        if line.order_id.is_some() {
            return Ok(vec![]);
        }
        Ok(vec![match outcome {
            Ok(order_id) => CheckoutEvent::OrderPlaced {
                restaurant_id,
                order_id,
            },
            Err(failure) => CheckoutEvent::OrderPlacementFailed {
                restaurant_id,
                failure,
            },
        }])
    }

    pub fn record_payment(
        &self,
        payment: &Payment,
        failure: Option<StepFailure>,
    ) -> Result<Vec<CheckoutEvent>, DomainError> {
        let line = self
            .lines
            .iter()
            .find(|l| l.order_id == Some(payment.order_id))
            .ok_or_else(|| self.missing("Order", payment.order_id))?;

        let unchanged = line.payment_id == Some(payment.id)
            && line.payment_status == Some(payment.status)
            && line.transaction_id == payment.transaction_id
            && line.failure == failure;
        let downgrade = line.payment_id == Some(payment.id)
            && line.payment_status == Some(PaymentStatus::Completed)
            && payment.status != PaymentStatus::Completed;
        if unchanged || downgrade {
            return Ok(vec![]);
        }

        Ok(vec![CheckoutEvent::PaymentSettled {
            order_id: payment.order_id,
            payment_id: payment.id,
            status: payment.status,
            transaction_id: payment.transaction_id.clone(),
            failure,
        }])
    }

    /// Records the outcome when it differs from the recorded status.
    pub fn finish(&self, now: DateTime<Utc>) -> Result<Vec<CheckoutEvent>, DomainError> {
        let status = self.outcome();
        if self.status == status {
            return Ok(vec![]);
        }
        Ok(vec![CheckoutEvent::CheckoutFinished { status, at: now }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ErrorKind;

    fn run(
        saga: &mut CheckoutSaga,
        command: impl FnOnce(&CheckoutSaga) -> Result<Vec<CheckoutEvent>, DomainError>,
    ) -> usize {
        let events = command(saga).unwrap();
        let emitted = events.len();
        saga.apply_events(events);
        emitted
    }

    fn started(restaurants: &[u64]) -> CheckoutSaga {
        let mut saga = CheckoutSaga::default();
        let data = CheckoutStartedData {
            checkout_id: AggregateId::new(),
            customer_id: CustomerId::new(7),
            delivery_address: "1 Le Loi".into(),
            payment_method: PaymentMethod::CreditCard,
            groups: restaurants
                .iter()
                .map(|r| (RestaurantId::new(*r), Money::from_minor(100000)))
                .collect(),
            started_at: Utc::now(),
        };
        run(&mut saga, |s| s.start(data));
        saga
    }

    fn payment(order_id: AggregateId, status: PaymentStatus) -> Payment {
        Payment {
            id: AggregateId::new(),
            order_id,
            amount: Money::from_minor(100000),
            method: PaymentMethod::CreditCard,
            status,
            transaction_id: (status == PaymentStatus::Completed).then(|| "TXN-1001".to_string()),
            failure_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn start_creates_one_line_per_group() {
        let saga = started(&[1, 2]);
        assert_eq!(saga.status(), CheckoutStatus::Running);
        assert_eq!(saga.lines().len(), 2);
        assert!(saga.id().is_some());
        assert!(!saga.is_resolved());
    }

    #[test]
    fn mixed_results_partially_complete() {
        let mut saga = started(&[1, 2]);
        let paid_order = AggregateId::new();
        run(&mut saga, |s| s.record_placement(RestaurantId::new(1), Ok(paid_order)));
        run(&mut saga, |s| {
            s.record_placement(
                RestaurantId::new(2),
                Err(StepFailure {
                    kind: ErrorKind::UpstreamUnavailable,
                    message: "geocoding down".into(),
                }),
            )
        });
        run(&mut saga, |s| s.record_payment(&payment(paid_order, PaymentStatus::Completed), None));
        run(&mut saga, |s| s.finish(Utc::now()));

        assert!(saga.is_resolved());
        assert_eq!(saga.status(), CheckoutStatus::PartiallyCompleted);
        assert_eq!(saga.placed_orders().count(), 1);
        assert!(saga.finished_at().is_some());
    }

    #[test]
    fn recording_is_idempotent() {
        let mut saga = started(&[1]);
        let order_id = AggregateId::new();
        run(&mut saga, |s| s.record_placement(RestaurantId::new(1), Ok(order_id)));
        assert_eq!(run(&mut saga, |s| s.record_placement(RestaurantId::new(1), Ok(AggregateId::new()))), 0);

        let paid = payment(order_id, PaymentStatus::Completed);
        assert_eq!(run(&mut saga, |s| s.record_payment(&paid, None)), 1);
        assert_eq!(run(&mut saga, |s| s.record_payment(&paid, None)), 0);

        assert_eq!(run(&mut saga, |s| s.finish(Utc::now())), 1);
        assert_eq!(run(&mut saga, |s| s.finish(Utc::now())), 0);
        assert_eq!(saga.status(), CheckoutStatus::Completed);
    }

    #[test]
    fn a_retried_payment_upgrades_the_outcome() {
        let mut saga = started(&[1]);
        let order_id = AggregateId::new();
        run(&mut saga, |s| s.record_placement(RestaurantId::new(1), Ok(order_id)));
        let declined = StepFailure {
            kind: ErrorKind::PaymentFailed,
            message: "declined".into(),
        };
        run(&mut saga, |s| s.record_payment(&payment(order_id, PaymentStatus::Failed), Some(declined)));
        run(&mut saga, |s| s.finish(Utc::now()));
        assert_eq!(saga.status(), CheckoutStatus::Failed);

        run(&mut saga, |s| s.record_payment(&payment(order_id, PaymentStatus::Completed), None));
        run(&mut saga, |s| s.finish(Utc::now()));
        assert_eq!(saga.status(), CheckoutStatus::Completed);
        assert!(saga.lines()[0].failure.is_none());
    }

    #[test]
    fn a_late_pending_record_never_hides_a_capture() {
        let mut saga = started(&[1]);
        let order_id = AggregateId::new();
        run(&mut saga, |s| s.record_placement(RestaurantId::new(1), Ok(order_id)));

        let paid = payment(order_id, PaymentStatus::Completed);
        run(&mut saga, |s| s.record_payment(&paid, None));

        let pending = Payment {
            status: PaymentStatus::Pending,
            transaction_id: None,
            ..paid.clone()
        };
        let in_flight = StepFailure {
            kind: ErrorKind::StaleState,
            message: "already being charged".into(),
        };
        assert_eq!(run(&mut saga, |s| s.record_payment(&pending, Some(in_flight))), 0);
        assert_eq!(saga.lines()[0].payment_status, Some(PaymentStatus::Completed));
        assert!(saga.lines()[0].failure.is_none());
    }

    #[test]
    fn payment_for_a_foreign_order_is_refused() {
        let saga = started(&[1]);
        let err = saga
            .record_payment(&payment(AggregateId::new(), PaymentStatus::Completed), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
