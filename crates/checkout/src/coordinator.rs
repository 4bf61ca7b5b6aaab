//! Checkout coordinator: cart in, independent orders and payments out.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use chrono::Utc;
use common::{Actor, AggregateId, CustomerId, GeoPoint, RestaurantId, Role};
use domain::{
    Aggregate, CartItem, CommandHandler, DomainError, Money, OrderPayment, OrderService,
    OrderStatus, Payment, PaymentMethod, PaymentService, PaymentStatus, PlaceOrder,
    RestaurantGroup,
};
use event_store::EventStore;
use serde::Serialize;

use crate::aggregate::CheckoutSaga;
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::events::{CheckoutEvent, CheckoutStartedData, StepFailure};
use crate::services::{ChargeRequest, LocationService, PaymentProvider, ProductCatalog};
use crate::state::CheckoutStatus;

/// Saga writers racing on one checkout retry this many times.
const SAGA_WRITE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Client idempotency key; a replay with a known id never places new
    /// orders.
    pub checkout_id: Option<AggregateId>,
    pub customer_id: CustomerId,
    pub items: Vec<CartItem>,
    pub delivery_address: String,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
    /// The total the client displayed; rejected when it does not match.
    pub client_total: Option<Money>,
}

/// What happened to one restaurant's order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderOutcome {
    pub restaurant_id: RestaurantId,
    pub order_id: Option<AggregateId>,
    pub total_amount: Money,
    pub status: Option<OrderStatus>,
    pub estimated_delivery_minutes: Option<i64>,
    pub payment: Option<Payment>,
    pub error: Option<StepFailure>,
}

impl OrderOutcome {
    pub fn is_paid(&self) -> bool {
        self.payment
            .as_ref()
            .is_some_and(|p| p.status == PaymentStatus::Completed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub checkout_id: AggregateId,
    pub status: CheckoutStatus,
    /// True when the checkout id was already known.
    pub replayed: bool,
    pub orders: Vec<OrderOutcome>,
    pub payments: Vec<Payment>,
}

impl CheckoutResult {
    /// Fills in failures that never reached the saga record.
    fn attach(&mut self, mut unsettled: HashMap<AggregateId, StepFailure>) {
        for outcome in &mut self.orders {
            if let Some(order_id) = outcome.order_id {
                if let Some(failure) = unsettled.remove(&order_id) {
                    outcome.error.get_or_insert(failure);
                }
            }
        }
    }
}

/// Outcome of the payment step for one order.
struct Settlement {
    payment: Payment,
    failure: Option<StepFailure>,
}

impl From<&CheckoutError> for StepFailure {
    fn from(e: &CheckoutError) -> Self {
        StepFailure {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Runs checkouts as an event-sourced saga.
///
/// Steps per checkout:
/// 1. validate the cart against the catalog (no side effects on failure)
/// 2. place one order per restaurant group
/// 3. open, charge and settle exactly one payment per placed order
///
/// A failing group never rolls back or blocks its siblings; the result lists
/// every group's outcome.
pub struct CheckoutCoordinator<S, C, P, L>
where
    S: EventStore,
    C: ProductCatalog,
    P: PaymentProvider,
    L: LocationService,
{
    sagas: CommandHandler<S, CheckoutSaga>,
    orders: OrderService<S>,
    payments: PaymentService<S>,
    catalog: C,
    provider: P,
    location: L,
    config: CheckoutConfig,
}

impl<S, C, P, L> CheckoutCoordinator<S, C, P, L>
where
    S: EventStore + Clone,
    C: ProductCatalog,
    P: PaymentProvider,
    L: LocationService,
{
    pub fn new(store: S, catalog: C, provider: P, location: L, config: CheckoutConfig) -> Self {
        Self {
            sagas: CommandHandler::new(store.clone()),
            orders: OrderService::new(store.clone()),
            payments: PaymentService::new(store),
            catalog,
            provider,
            location,
            config,
        }
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    #[tracing::instrument(
        skip(self, request),
        fields(customer_id = %request.customer_id, items = request.items.len())
    )]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutResult> {
        metrics::counter!("checkout_requests_total").increment(1);
        let started = Instant::now();
        let checkout_id = request.checkout_id.unwrap_or_default();

        if let Some(saga) = self.sagas.load_existing(checkout_id).await? {
            return self.replay(checkout_id, saga, request.customer_id).await;
        }

        if request.delivery_address.trim().is_empty() {
            return Err(CheckoutError::MissingAddress);
        }
        let groups = self.validate(&request).await?;
        let delivery_location = self.location.geocode(&request.delivery_address).await?;

        let start = CheckoutStartedData {
            checkout_id,
            customer_id: request.customer_id,
            delivery_address: request.delivery_address.clone(),
            payment_method: request.payment_method,
            groups: groups.iter().map(|g| (g.restaurant_id, g.total)).collect(),
            started_at: Utc::now(),
        };
        match self.sagas.execute(checkout_id, |saga| saga.start(start)).await {
            Ok(result) if !result.events.is_empty() => {}
            Ok(result) => {
                return self.replay(checkout_id, result.aggregate, request.customer_id).await;
            }
            Err(e) if e.is_stale() => {
                tracing::debug!(%checkout_id, "checkout started concurrently, replaying");
                let saga = self.sagas.load_required(checkout_id).await?;
                return self.replay(checkout_id, saga, request.customer_id).await;
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(%checkout_id, groups = groups.len(), "checkout started");

        for group in &groups {
            let placed = self
                .place(checkout_id, &request, group, delivery_location)
                .await
                .map_err(|e| {
                    tracing::warn!(restaurant_id = %group.restaurant_id, error = %e, "order placement failed");
                    StepFailure::from(&e)
                });
            if placed.is_ok() {
                metrics::counter!("checkout_orders_placed_total").increment(1);
            }
            self.record(checkout_id, |saga| {
                saga.record_placement(group.restaurant_id, placed.clone())
            })
            .await?;
        }

        let unsettled = self.settle_lines(checkout_id, request.payment_method).await?;
        let result = self.finish(checkout_id, false, unsettled).await?;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        Ok(result)
    }

    /// Re-runs the payment step for one order without resubmitting the cart.
    ///
    /// `method` defaults to the one used last for this order.
    #[tracing::instrument(skip(self))]
    pub async fn pay_order(
        &self,
        order_id: AggregateId,
        actor: Actor,
        method: Option<PaymentMethod>,
    ) -> Result<OrderOutcome> {
        let order = self.orders.get_order(order_id).await?;
        let owns = actor.role == Role::Customer && order.is_visible_to(&actor);
        if !(owns || actor.is_admin()) {
            return Err(CheckoutError::NotOwner(order_id));
        }
        if matches!(order.status(), OrderStatus::Cancelled | OrderStatus::Rejected) {
            return Err(CheckoutError::NotPayable {
                order_id,
                status: order.status(),
            });
        }

        let saga = match order.checkout_id() {
            Some(id) => self.sagas.load_existing(id).await?,
            None => None,
        };
        let method = method
            .or(order.payment().map(|p| p.method))
            .or(saga.as_ref().and_then(|s| s.payment_method()))
            .ok_or(CheckoutError::MissingPaymentMethod { order_id })?;

        let restaurant_id = order.restaurant_id().unwrap_or(RestaurantId::new(0));
        let settlement = self
            .settle(order_id, restaurant_id, order.total_amount(), method)
            .await?;

        if let Some(checkout_id) = saga.and_then(|s| s.id()) {
            let saga = self
                .record(checkout_id, |saga| {
                    saga.record_payment(&settlement.payment, settlement.failure.clone())
                })
                .await?;
            if saga.is_resolved() {
                self.record(checkout_id, |saga| saga.finish(Utc::now())).await?;
            }
        }

        let order = self.orders.get_order(order_id).await?;
        Ok(OrderOutcome {
            restaurant_id,
            order_id: Some(order_id),
            total_amount: order.total_amount(),
            status: Some(order.status()),
            estimated_delivery_minutes: Some(order.estimated_delivery_minutes()),
            payment: Some(settlement.payment),
            error: settlement.failure,
        })
    }

    /// The current outcome of a checkout, as its customer or an admin sees it.
    pub async fn get_checkout(&self, checkout_id: AggregateId, actor: Actor) -> Result<CheckoutResult> {
        let saga = self.sagas.load_required(checkout_id).await?;
        let owner = saga.customer_id().map(|c| c.get());
        let allowed = actor.is_admin() || (actor.role == Role::Customer && owner == Some(actor.user_id));
        if !allowed {
            return Err(CheckoutError::NotOwner(checkout_id));
        }
        self.result(checkout_id, &saga, true).await
    }

    async fn validate(&self, request: &CheckoutRequest) -> Result<Vec<RestaurantGroup>> {
        let product_ids: Vec<_> = request
            .items
            .iter()
            .map(|i| i.product_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let catalog = if product_ids.is_empty() {
            Default::default()
        } else {
            self.catalog.lookup(&product_ids).await?
        };

        domain::cart::validate(
            &request.items,
            &catalog,
            &self.config.cart_policy,
            request.client_total,
        )
        .map_err(|e| {
            metrics::counter!("checkout_rejected_total").increment(1);
            e.into()
        })
    }

    async fn place(
        &self,
        checkout_id: AggregateId,
        request: &CheckoutRequest,
        group: &RestaurantGroup,
        delivery_location: GeoPoint,
    ) -> Result<AggregateId> {
        let restaurant_location = self.location.restaurant_location(group.restaurant_id).await?;
        let order_id = checkout_id.derive(&format!("order/{}", group.restaurant_id));

        self.orders
            .place_order(PlaceOrder {
                order_id,
                checkout_id: Some(checkout_id),
                customer_id: request.customer_id,
                restaurant_id: group.restaurant_id,
                items: group.items.clone(),
                delivery_address: request.delivery_address.clone(),
                delivery_location,
                restaurant_location,
                notes: request.notes.clone(),
            })
            .await?;
        Ok(order_id)
    }

    /// Runs the payment step for every placed line of the saga.
    ///
    /// A line whose payment step errors is skipped so its siblings still get
    /// charged; its failure is returned keyed by order.
    async fn settle_lines(
        &self,
        checkout_id: AggregateId,
        method: PaymentMethod,
    ) -> Result<HashMap<AggregateId, StepFailure>> {
        let saga = self.sagas.load_required(checkout_id).await?;
        let mut unsettled = HashMap::new();

        for line in saga.placed_orders() {
            let Some(order_id) = line.order_id else { continue };
            let settlement = match self
                .settle(order_id, line.restaurant_id, line.total_amount, method)
                .await
            {
                Ok(settlement) => settlement,
                Err(e) => {
                    tracing::warn!(%order_id, error = %e, "payment step failed");
                    unsettled.insert(order_id, StepFailure::from(&e));
                    continue;
                }
            };
            self.record(checkout_id, |saga| {
                saga.record_payment(&settlement.payment, settlement.failure.clone())
            })
            .await?;
        }
        Ok(unsettled)
    }

    /// Appends a saga decision, re-deciding on fresh state when another
    /// writer got there first.
    async fn record<F>(&self, checkout_id: AggregateId, command: F) -> Result<CheckoutSaga>
    where
        F: Fn(&CheckoutSaga) -> std::result::Result<Vec<CheckoutEvent>, DomainError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.sagas.execute_existing(checkout_id, &command).await {
                Ok(result) => return Ok(result.aggregate),
                Err(e) if e.is_stale() && attempt < SAGA_WRITE_ATTEMPTS => {
                    tracing::debug!(%checkout_id, attempt, "checkout moved, re-deciding");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Opens (or reuses) the order's payment and charges it once.
    ///
    /// A live payment opened by another request within the payment timeout is
    /// left to that request and reported as in flight.
    #[tracing::instrument(skip(self, amount, restaurant_id))]
    async fn settle(
        &self,
        order_id: AggregateId,
        restaurant_id: RestaurantId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<Settlement> {
        let attempt = self.payments.open(order_id, amount, method).await?;
        let reused = !attempt.is_new();
        let payment = attempt.into_payment();

        if payment.status == PaymentStatus::Completed {
            let failure = self.mirror(order_id, &payment).await;
            return Ok(Settlement { payment, failure });
        }
        if reused && payment.status == PaymentStatus::Pending && self.in_flight(&payment) {
            tracing::info!(%order_id, payment_id = %payment.id, "payment already in flight");
            let failure = StepFailure::from(&CheckoutError::PaymentInFlight {
                payment_id: payment.id,
            });
            return Ok(Settlement {
                payment,
                failure: Some(failure),
            });
        }

        let request = ChargeRequest {
            payment_id: payment.id,
            order_id,
            restaurant_id,
            amount: payment.amount,
            method: payment.method,
        };
        let timeout = self.config.payment_timeout;
        let charged = match tokio::time::timeout(timeout, self.provider.charge(&request)).await {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(e)) => Err(CheckoutError::from(e)),
            Err(_) => Err(CheckoutError::PaymentTimeout {
                seconds: timeout.as_secs(),
            }),
        };

        let (payment, failure) = match charged {
            Ok(receipt) => {
                let payment = self
                    .payments
                    .complete(order_id, payment.id, receipt.transaction_id)
                    .await?;
                (payment, None)
            }
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "payment failed");
                let failure = StepFailure::from(&e);
                let payment = self.payments.fail(order_id, payment.id, e.to_string()).await?;
                (payment, Some(failure))
            }
        };
        metrics::counter!("checkout_payments_total", "status" => payment.status.as_str())
            .increment(1);

        let mirrored = self.mirror(order_id, &payment).await;
        Ok(Settlement {
            payment,
            failure: failure.or(mirrored),
        })
    }

    /// Copies the ledger's payment state onto the order. A failure is
    /// returned for the order's outcome rather than raised; the charge
    /// already stands.
    async fn mirror(&self, order_id: AggregateId, payment: &Payment) -> Option<StepFailure> {
        let recorded = self
            .orders
            .record_payment(
                order_id,
                OrderPayment {
                    payment_id: payment.id,
                    amount: payment.amount,
                    method: payment.method,
                    status: payment.status,
                    transaction_id: payment.transaction_id.clone(),
                },
            )
            .await;
        match recorded {
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "payment not recorded on order");
                Some(StepFailure::from(&CheckoutError::from(e)))
            }
        }
    }

    fn in_flight(&self, payment: &Payment) -> bool {
        (Utc::now() - payment.created_at)
            .to_std()
            .map_or(true, |age| age < self.config.payment_timeout)
    }

    /// Re-runs only the payment step of an already started checkout.
    async fn replay(
        &self,
        checkout_id: AggregateId,
        saga: CheckoutSaga,
        customer_id: CustomerId,
    ) -> Result<CheckoutResult> {
        if saga.customer_id() != Some(customer_id) {
            return Err(CheckoutError::NotOwner(checkout_id));
        }
        metrics::counter!("checkout_replays_total").increment(1);
        tracing::info!(%checkout_id, "replaying checkout payments");

        let method = saga.payment_method().unwrap_or(PaymentMethod::Cash);
        let unsettled = self.settle_lines(checkout_id, method).await?;
        self.finish(checkout_id, true, unsettled).await
    }

    /// Records the outcome once every group is resolved; a checkout still
    /// placing orders elsewhere is reported as running.
    async fn finish(
        &self,
        checkout_id: AggregateId,
        replayed: bool,
        unsettled: HashMap<AggregateId, StepFailure>,
    ) -> Result<CheckoutResult> {
        let saga = self.sagas.load_required(checkout_id).await?;
        if !saga.is_resolved() {
            let mut result = self.result(checkout_id, &saga, replayed).await?;
            result.attach(unsettled);
            return Ok(result);
        }
        let saga = self.record(checkout_id, |saga| saga.finish(Utc::now())).await?;

        metrics::counter!("checkout_outcomes_total", "status" => saga.status().as_str())
            .increment(1);
        tracing::info!(%checkout_id, status = %saga.status(), "checkout finished");
        let mut result = self.result(checkout_id, &saga, replayed).await?;
        result.attach(unsettled);
        Ok(result)
    }

    async fn result(
        &self,
        checkout_id: AggregateId,
        saga: &CheckoutSaga,
        replayed: bool,
    ) -> Result<CheckoutResult> {
        let mut orders = Vec::with_capacity(saga.lines().len());

        for line in saga.lines() {
            let mut outcome = OrderOutcome {
                restaurant_id: line.restaurant_id,
                order_id: line.order_id,
                total_amount: line.total_amount,
                status: None,
                estimated_delivery_minutes: None,
                payment: None,
                error: line.failure.clone(),
            };
            if let Some(order_id) = line.order_id {
                let order = self.orders.get_order(order_id).await?;
                outcome.status = Some(order.status());
                outcome.estimated_delivery_minutes = Some(order.estimated_delivery_minutes());
                outcome.payment = self.payments.payments_for(order_id).await?.pop();
            }
            orders.push(outcome);
        }

        let payments = orders.iter().filter_map(|o| o.payment.clone()).collect();
        Ok(CheckoutResult {
            checkout_id,
            status: saga.status(),
            replayed,
            orders,
            payments,
        })
    }
}
