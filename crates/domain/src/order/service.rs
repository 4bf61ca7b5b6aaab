//! Order service providing the lifecycle API over the command handler.

use chrono::Utc;
use common::{Actor, AggregateId};
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{Order, OrderPayment, OrderPolicy, OrderStatus, PlaceOrder, TransitionRequest};

/// Payment mirrors racing a transition retry this many times.
const PAYMENT_RECORD_ATTEMPTS: usize = 5;

/// Service for managing orders.
///
/// Every transition is an optimistic load-decide-append: a concurrent
/// change to the same order surfaces as [`DomainError::StaleState`] and
/// nothing is written.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
    policy: OrderPolicy,
}

impl<S: EventStore + Clone> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            policy: self.policy,
        }
    }
}

impl<S: EventStore> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, OrderPolicy::default())
    }

    pub fn with_policy(store: S, policy: OrderPolicy) -> Self {
        Self {
            handler: CommandHandler::new(store),
            policy,
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    pub fn policy(&self) -> &OrderPolicy {
        &self.policy
    }

    /// Creates an order in `waiting_confirmation`.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<CommandResult<Order>, DomainError> {
        let order_id = cmd.order_id;
        let result = self
            .handler
            .execute(order_id, |order| order.place(cmd, Utc::now()))
            .await?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(
            total = %result.aggregate.total_amount(),
            distance_km = result.aggregate.distance_km(),
            "order placed"
        );
        Ok(result)
    }

    /// Applies any transition request; the named helpers below build the
    /// common ones.
    #[tracing::instrument(skip(self, request), fields(to = %request.to, actor = %request.actor))]
    pub async fn update_status(
        &self,
        order_id: AggregateId,
        request: TransitionRequest,
    ) -> Result<CommandResult<Order>, DomainError> {
        let to = request.to;
        let role = request.actor.role;
        let policy = self.policy;

        let result = self
            .handler
            .execute_existing(order_id, |order| order.transition(request, &policy))
            .await;

        match &result {
            Ok(_) => {
                metrics::counter!(
                    "orders_transitions_total",
                    "to" => to.as_str(),
                    "role" => role.as_str()
                )
                .increment(1);
                tracing::info!(%order_id, "order status changed");
            }
            Err(e) => {
                metrics::counter!(
                    "orders_transition_failures_total",
                    "kind" => e.kind().as_str()
                )
                .increment(1);
                tracing::debug!(%order_id, error = %e, "order transition refused");
            }
        }
        result
    }

    /// Restaurant confirms a waiting order.
    pub async fn accept_order(
        &self,
        order_id: AggregateId,
        actor: Actor,
        note: Option<String>,
    ) -> Result<CommandResult<Order>, DomainError> {
        let mut request = TransitionRequest::new(OrderStatus::Confirmed, actor)
            .expecting(OrderStatus::WaitingConfirmation);
        request.note = note;
        self.update_status(order_id, request).await
    }

    /// Restaurant declines a waiting order.
    pub async fn reject_order(
        &self,
        order_id: AggregateId,
        actor: Actor,
        reason: impl Into<String>,
    ) -> Result<CommandResult<Order>, DomainError> {
        let request = TransitionRequest::new(OrderStatus::Rejected, actor)
            .expecting(OrderStatus::WaitingConfirmation)
            .reason(reason);
        self.update_status(order_id, request).await
    }

    pub async fn cancel_order(
        &self,
        order_id: AggregateId,
        actor: Actor,
        note: Option<String>,
    ) -> Result<CommandResult<Order>, DomainError> {
        let mut request = TransitionRequest::new(OrderStatus::Cancelled, actor);
        request.note = note;
        self.update_status(order_id, request).await
    }

    /// Scheduler hands a ready order to a reserved drone.
    pub async fn dispatch_order(
        &self,
        order_id: AggregateId,
        drone_id: AggregateId,
    ) -> Result<CommandResult<Order>, DomainError> {
        let request = TransitionRequest::new(OrderStatus::InDelivery, Actor::scheduler())
            .expecting(OrderStatus::Ready)
            .drone(drone_id)
            .note(format!("drone {drone_id} assigned"));
        self.update_status(order_id, request).await
    }

    /// Scheduler marks an in-flight order as delivered.
    pub async fn complete_delivery(
        &self,
        order_id: AggregateId,
    ) -> Result<CommandResult<Order>, DomainError> {
        let request = TransitionRequest::new(OrderStatus::Delivered, Actor::scheduler())
            .expecting(OrderStatus::InDelivery);
        self.update_status(order_id, request).await
    }

    /// Mirrors the payment ledger's state onto the order.
    #[tracing::instrument(skip(self, payment), fields(status = ?payment.status))]
    /// Mirrors a payment onto the order. The mirror does not depend on the
    /// order's status, so a concurrent transition is re-decided rather than
    /// reported.
    pub async fn record_payment(
        &self,
        order_id: AggregateId,
        payment: OrderPayment,
    ) -> Result<CommandResult<Order>, DomainError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = self
                .handler
                .execute_existing(order_id, |order| {
                    order.record_payment(payment.clone(), Utc::now())
                })
                .await;
            match outcome {
                Err(e) if e.is_stale() && attempt < PAYMENT_RECORD_ATTEMPTS => {
                    tracing::debug!(%order_id, attempt, "order moved, re-recording payment");
                }
                outcome => return outcome,
            }
        }
    }

    pub async fn get_order(&self, order_id: AggregateId) -> Result<Order, DomainError> {
        self.handler.load_required(order_id).await
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, DomainError> {
        self.handler.load_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::order::{Money, OrderItem};
    use common::{CustomerId, GeoPoint, ProductId, RestaurantId};
    use event_store::InMemoryEventStore;

    fn place_cmd() -> PlaceOrder {
        PlaceOrder {
            order_id: AggregateId::new(),
            checkout_id: None,
            customer_id: CustomerId::new(7),
            restaurant_id: RestaurantId::new(1),
            items: vec![OrderItem {
                product_id: ProductId::new(10),
                product_name: "Bun cha".into(),
                unit_price: Money::from_minor(60000),
                quantity: 1,
                weight_kg: 0.6,
            }],
            delivery_address: "12 Nguyen Hue".into(),
            delivery_location: GeoPoint::new(10.7740, 106.7030),
            restaurant_location: GeoPoint::new(10.7626, 106.6602),
            notes: None,
        }
    }

    #[tokio::test]
    async fn lifecycle_through_the_service() {
        let store = InMemoryEventStore::new();
        let service = OrderService::new(store.clone());
        let restaurant = Actor::restaurant(RestaurantId::new(1));

        let order_id = service.place_order(place_cmd()).await.unwrap().aggregate.id().unwrap();
        service.accept_order(order_id, restaurant, None).await.unwrap();
        for to in [OrderStatus::Preparing, OrderStatus::Ready] {
            service
                .update_status(order_id, TransitionRequest::new(to, restaurant))
                .await
                .unwrap();
        }
        let drone = AggregateId::new();
        service.dispatch_order(order_id, drone).await.unwrap();
        let done = service.complete_delivery(order_id).await.unwrap();

        assert_eq!(done.aggregate.status(), OrderStatus::Delivered);
        assert_eq!(done.aggregate.drone_id(), Some(drone));
        assert_eq!(store.get_aggregate_version(order_id).await.unwrap().unwrap().as_i64(), 6);
    }

    #[tokio::test]
    async fn second_accept_is_stale() {
        let service = OrderService::new(InMemoryEventStore::new());
        let restaurant = Actor::restaurant(RestaurantId::new(1));
        let order_id = service.place_order(place_cmd()).await.unwrap().aggregate.id().unwrap();

        service.accept_order(order_id, restaurant, None).await.unwrap();
        let err = service.accept_order(order_id, restaurant, None).await.unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::StaleState);
    }

    #[tokio::test]
    async fn concurrent_accept_and_cancel_has_one_winner() {
        let store = InMemoryEventStore::new();
        let service = OrderService::new(store.clone());
        let order_id = service.place_order(place_cmd()).await.unwrap().aggregate.id().unwrap();

        let accept = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .accept_order(order_id, Actor::restaurant(RestaurantId::new(1)), None)
                    .await
            })
        };
        let cancel = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .update_status(
                        order_id,
                        TransitionRequest::new(OrderStatus::Cancelled, Actor::customer(CustomerId::new(7)))
                            .expecting(OrderStatus::WaitingConfirmation),
                    )
                    .await
            })
        };

        let outcomes = [accept.await.unwrap(), cancel.await.unwrap()];
        let winners = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        for outcome in outcomes.iter().filter_map(|r| r.as_ref().err()) {
            assert!(outcome.is_stale(), "{outcome}");
        }

        let order = service.get_order(order_id).await.unwrap();
        assert_eq!(order.history().len(), 2);
        assert_eq!(store.get_events_for_aggregate(order_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let service = OrderService::new(InMemoryEventStore::new());
        let err = service
            .cancel_order(AggregateId::new(), Actor::admin(1), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    }
}
