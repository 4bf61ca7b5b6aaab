//! Order board: one summary row per order, for listings and dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, CustomerId, RestaurantId, Role};
use domain::{Aggregate, Money, Order, OrderEvent, OrderStatus, PaymentStatus};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub order_id: AggregateId,
    pub checkout_id: Option<AggregateId>,
    pub customer_id: CustomerId,
    pub restaurant_id: RestaurantId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub item_count: usize,
    pub total_weight_kg: f64,
    pub distance_km: f64,
    pub drone_id: Option<AggregateId>,
    pub payment_status: Option<PaymentStatus>,
    /// When the order last entered `Ready`; cleared once it leaves.
    pub ready_since: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderSummary {
    fn visible_to(&self, actor: &Actor) -> bool {
        match actor.role {
            Role::Admin | Role::Scheduler => true,
            Role::Customer => self.customer_id.get() == actor.user_id,
            Role::Restaurant => self.restaurant_id.get() == actor.user_id,
        }
    }
}

#[derive(Default)]
struct Board {
    orders: HashMap<AggregateId, OrderSummary>,
    position: ProjectionPosition,
}

impl Board {
    fn apply(&mut self, order_id: AggregateId, event: OrderEvent) {
        match event {
            OrderEvent::OrderPlaced(data) => {
                let total_amount = data.items.iter().map(|i| i.line_total()).sum();
                let total_weight_kg = data.items.iter().map(|i| i.line_weight_kg()).sum();
                self.orders.insert(
                    data.order_id,
                    OrderSummary {
                        order_id: data.order_id,
                        checkout_id: data.checkout_id,
                        customer_id: data.customer_id,
                        restaurant_id: data.restaurant_id,
                        status: OrderStatus::WaitingConfirmation,
                        total_amount,
                        item_count: data.items.len(),
                        total_weight_kg,
                        distance_km: data.distance_km,
                        drone_id: None,
                        payment_status: None,
                        ready_since: None,
                        created_at: data.placed_at,
                        updated_at: data.placed_at,
                    },
                );
            }
            OrderEvent::OrderStatusChanged(data) => {
                let Some(summary) = self.orders.get_mut(&order_id) else {
                    tracing::warn!(%order_id, "status change for unknown order");
                    return;
                };
                summary.status = data.to;
                summary.updated_at = data.changed_at;
                summary.ready_since = (data.to == OrderStatus::Ready).then_some(data.changed_at);
                if !data.to.carries_drone() {
                    summary.drone_id = None;
                } else if data.drone_id.is_some() {
                    summary.drone_id = data.drone_id;
                }
            }
            OrderEvent::OrderPaymentRecorded(data) => {
                if let Some(summary) = self.orders.get_mut(&order_id) {
                    summary.payment_status = Some(data.status);
                    summary.updated_at = summary.updated_at.max(data.recorded_at);
                }
            }
        }
    }
}

/// Denormalized view of every order.
#[derive(Clone, Default)]
pub struct OrderBoardView {
    board: Arc<RwLock<Board>>,
}

impl OrderBoardView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, order_id: AggregateId) -> Option<OrderSummary> {
        self.board.read().await.orders.get(&order_id).cloned()
    }

    /// Orders `actor` may see, newest first.
    pub async fn for_actor(&self, actor: &Actor, status: Option<OrderStatus>) -> Vec<OrderSummary> {
        let board = self.board.read().await;
        let mut orders: Vec<_> = board
            .orders
            .values()
            .filter(|o| o.visible_to(actor))
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.order_id.cmp(&b.order_id)));
        orders
    }

    pub async fn by_status(&self, status: OrderStatus) -> Vec<OrderSummary> {
        self.for_actor(&Actor::scheduler(), Some(status)).await
    }

    /// Ready orders still waiting for a drone, longest waiting first.
    pub async fn ready_without_drone(&self) -> Vec<OrderSummary> {
        let board = self.board.read().await;
        let mut orders: Vec<_> = board
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Ready && o.drone_id.is_none())
            .cloned()
            .collect();
        orders.sort_by_key(|o| (o.ready_since.unwrap_or(o.updated_at), o.created_at));
        orders
    }

    pub async fn in_delivery(&self) -> Vec<OrderSummary> {
        let board = self.board.read().await;
        let mut orders: Vec<_> = board
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::InDelivery)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.updated_at);
        orders
    }
}

#[async_trait]
impl Projection for OrderBoardView {
    fn name(&self) -> &'static str {
        "OrderBoardView"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        let mut board = self.board.write().await;
        if board.position.covers(envelope.sequence) {
            return Ok(());
        }
        if envelope.aggregate_type == Order::aggregate_type() {
            let event: OrderEvent = envelope.decode()?;
            board.apply(envelope.aggregate_id, event);
        }
        board.position = board.position.advance_to(envelope.sequence);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.board.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.board.write().await = Board::default();
        Ok(())
    }
}

impl ReadModel for OrderBoardView {
    fn name(&self) -> &'static str {
        "OrderBoardView"
    }

    fn count(&self) -> usize {
        self.board.try_read().map(|b| b.orders.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{GeoPoint, ProductId};
    use domain::order::{OrderPlacedData, PaymentRecordedData, StatusChangedData};
    use domain::{DomainEvent, OrderItem, PaymentMethod};
    use event_store::Version;

    fn envelope(order_id: AggregateId, version: i64, sequence: u64, event: &OrderEvent) -> EventEnvelope {
        let mut envelope = EventEnvelope::builder()
            .aggregate_id(order_id)
            .aggregate_type("Order")
            .event_type(event.event_type())
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap();
        envelope.sequence = sequence;
        envelope
    }

    fn placed(order_id: AggregateId, customer: u64, restaurant: u64, at: DateTime<Utc>) -> OrderEvent {
        OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            checkout_id: None,
            customer_id: CustomerId::new(customer),
            restaurant_id: RestaurantId::new(restaurant),
            items: vec![OrderItem {
                product_id: ProductId::new(1),
                product_name: "Pho bo".into(),
                unit_price: Money::from_minor(45000),
                quantity: 2,
                weight_kg: 0.6,
            }],
            delivery_address: "12 Nguyen Hue".into(),
            delivery_location: GeoPoint::new(10.7769, 106.7009),
            restaurant_location: GeoPoint::new(10.7626, 106.6602),
            notes: None,
            distance_km: 4.7,
            placed_at: at,
        })
    }

    fn moved(from: OrderStatus, to: OrderStatus, at: DateTime<Utc>) -> OrderEvent {
        OrderEvent::OrderStatusChanged(StatusChangedData {
            from,
            to,
            actor: Actor::admin(1),
            note: None,
            rejection_reason: None,
            drone_id: None,
            changed_at: at,
        })
    }

    #[tokio::test]
    async fn placement_creates_a_summary() {
        let view = OrderBoardView::new();
        let id = AggregateId::new();
        view.handle(&envelope(id, 1, 1, &placed(id, 7, 1, Utc::now()))).await.unwrap();

        let summary = view.get(id).await.unwrap();
        assert_eq!(summary.status, OrderStatus::WaitingConfirmation);
        assert_eq!(summary.total_amount, Money::from_minor(90000));
        assert!((summary.total_weight_kg - 1.2).abs() < 1e-9);
        assert_eq!(ReadModel::count(&view), 1);
    }

    #[tokio::test]
    async fn redelivered_events_are_ignored() {
        let view = OrderBoardView::new();
        let id = AggregateId::new();
        let now = Utc::now();
        view.handle(&envelope(id, 1, 1, &placed(id, 7, 1, now))).await.unwrap();
        view.handle(&envelope(id, 2, 2, &moved(OrderStatus::WaitingConfirmation, OrderStatus::Confirmed, now)))
            .await
            .unwrap();
        view.handle(&envelope(id, 1, 1, &placed(id, 7, 1, now))).await.unwrap();

        assert_eq!(view.get(id).await.unwrap().status, OrderStatus::Confirmed);
        assert_eq!(view.position().await.last_sequence, 2);
    }

    #[tokio::test]
    async fn listings_respect_ownership() {
        let view = OrderBoardView::new();
        let now = Utc::now();
        let (a, b) = (AggregateId::new(), AggregateId::new());
        view.handle(&envelope(a, 1, 1, &placed(a, 7, 1, now))).await.unwrap();
        view.handle(&envelope(b, 1, 2, &placed(b, 8, 2, now + Duration::seconds(1)))).await.unwrap();

        let mine = view.for_actor(&Actor::customer(CustomerId::new(7)), None).await;
        assert_eq!(mine.iter().map(|o| o.order_id).collect::<Vec<_>>(), vec![a]);

        let kitchen = view.for_actor(&Actor::restaurant(RestaurantId::new(2)), None).await;
        assert_eq!(kitchen.iter().map(|o| o.order_id).collect::<Vec<_>>(), vec![b]);

        let all = view.for_actor(&Actor::admin(1), None).await;
        assert_eq!(all.iter().map(|o| o.order_id).collect::<Vec<_>>(), vec![b, a]);
        assert!(view.for_actor(&Actor::admin(1), Some(OrderStatus::Ready)).await.is_empty());
    }

    #[tokio::test]
    async fn ready_queue_is_oldest_first_and_tracks_payment() {
        let view = OrderBoardView::new();
        let t0 = Utc::now();
        let (late, early) = (AggregateId::new(), AggregateId::new());
        view.handle(&envelope(late, 1, 1, &placed(late, 7, 1, t0))).await.unwrap();
        view.handle(&envelope(early, 1, 2, &placed(early, 7, 1, t0))).await.unwrap();
        view.handle(&envelope(early, 2, 3, &moved(OrderStatus::Preparing, OrderStatus::Ready, t0 + Duration::minutes(1))))
            .await
            .unwrap();
        view.handle(&envelope(late, 2, 4, &moved(OrderStatus::Preparing, OrderStatus::Ready, t0 + Duration::minutes(2))))
            .await
            .unwrap();

        let paid = OrderEvent::OrderPaymentRecorded(PaymentRecordedData {
            payment_id: AggregateId::new(),
            amount: Money::from_minor(90000),
            method: PaymentMethod::Cash,
            status: PaymentStatus::Completed,
            transaction_id: Some("TXN-1".into()),
            recorded_at: t0,
        });
        view.handle(&envelope(late, 3, 5, &paid)).await.unwrap();

        let queue: Vec<_> = view.ready_without_drone().await.iter().map(|o| o.order_id).collect();
        assert_eq!(queue, vec![early, late]);
        assert_eq!(view.get(late).await.unwrap().payment_status, Some(PaymentStatus::Completed));
    }

    #[tokio::test]
    async fn dispatch_moves_order_out_of_the_ready_queue() {
        let view = OrderBoardView::new();
        let id = AggregateId::new();
        let drone = AggregateId::new();
        let now = Utc::now();
        view.handle(&envelope(id, 1, 1, &placed(id, 7, 1, now))).await.unwrap();
        view.handle(&envelope(id, 2, 2, &moved(OrderStatus::Preparing, OrderStatus::Ready, now))).await.unwrap();

        let dispatched = OrderEvent::OrderStatusChanged(StatusChangedData {
            from: OrderStatus::Ready,
            to: OrderStatus::InDelivery,
            actor: Actor::scheduler(),
            note: None,
            rejection_reason: None,
            drone_id: Some(drone),
            changed_at: now,
        });
        view.handle(&envelope(id, 3, 3, &dispatched)).await.unwrap();

        assert!(view.ready_without_drone().await.is_empty());
        let flying = view.in_delivery().await;
        assert_eq!(flying[0].drone_id, Some(drone));
        assert!(flying[0].ready_since.is_none());
    }

    #[tokio::test]
    async fn an_order_sent_back_to_ready_is_queued_again() {
        let view = OrderBoardView::new();
        let id = AggregateId::new();
        let now = Utc::now();
        view.handle(&envelope(id, 1, 1, &placed(id, 7, 1, now))).await.unwrap();
        view.handle(&envelope(id, 2, 2, &moved(OrderStatus::Preparing, OrderStatus::Ready, now))).await.unwrap();

        let dispatched = OrderEvent::OrderStatusChanged(StatusChangedData {
            from: OrderStatus::Ready,
            to: OrderStatus::InDelivery,
            actor: Actor::scheduler(),
            note: None,
            rejection_reason: None,
            drone_id: Some(AggregateId::new()),
            changed_at: now,
        });
        view.handle(&envelope(id, 3, 3, &dispatched)).await.unwrap();

        let recalled = OrderEvent::OrderStatusChanged(StatusChangedData {
            from: OrderStatus::InDelivery,
            to: OrderStatus::Ready,
            actor: Actor::admin(1),
            note: Some("drone lost".into()),
            rejection_reason: None,
            drone_id: None,
            changed_at: now,
        });
        view.handle(&envelope(id, 4, 4, &recalled)).await.unwrap();

        let queue = view.ready_without_drone().await;
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].order_id, id);
        assert!(queue[0].drone_id.is_none());
    }

    #[tokio::test]
    async fn other_aggregates_only_advance_the_position() {
        let view = OrderBoardView::new();
        let mut other = EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("Drone")
            .event_type("DroneLanded")
            .version(Version::new(1))
            .payload_raw(serde_json::json!({"type": "DroneLanded"}))
            .build()
            .unwrap();
        other.sequence = 9;
        view.handle(&other).await.unwrap();

        assert_eq!(ReadModel::count(&view), 0);
        assert_eq!(view.position().await.last_sequence, 9);

        view.reset().await.unwrap();
        assert_eq!(view.position().await, ProjectionPosition::zero());
    }
}
