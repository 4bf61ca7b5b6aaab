//! Integration tests for the order, payment and drone aggregates.
//!
//! These tests run the services against the in-memory event store and check
//! the lifecycle properties end to end: persisted history, payment
//! uniqueness, and exclusive drone reservation.

use common::{Actor, AggregateId, CustomerId, GeoPoint, ProductId, RestaurantId};
use domain::{
    Aggregate, DomainError, DroneService, DroneSpec, DroneStatus, ErrorKind, Mission, Money,
    OrderError, OrderEvent, OrderItem, OrderPayment, OrderService, OrderStatus, PaymentService,
    PaymentMethod, PaymentStatus, PlaceOrder, TransitionRequest,
};
use event_store::{EventStore, InMemoryEventStore, Version};

const DEPOT: GeoPoint = GeoPoint::new(10.762622, 106.660172);
const CUSTOMER_HOME: GeoPoint = GeoPoint::new(10.776889, 106.700806);
const CUSTOMER: CustomerId = CustomerId::new(7);
const RESTAURANT: RestaurantId = RestaurantId::new(1);

fn create_service() -> (InMemoryEventStore, OrderService<InMemoryEventStore>) {
    let store = InMemoryEventStore::new();
    (store.clone(), OrderService::new(store))
}

fn place_cmd(quantity: u32, unit_price: i64) -> PlaceOrder {
    PlaceOrder {
        order_id: AggregateId::new(),
        checkout_id: None,
        customer_id: CUSTOMER,
        restaurant_id: RESTAURANT,
        items: vec![OrderItem {
            product_id: ProductId::new(1),
            product_name: "Com tam".into(),
            unit_price: Money::from_minor(unit_price),
            quantity,
            weight_kg: 0.5,
        }],
        delivery_address: "1 Le Loi, District 1".into(),
        delivery_location: CUSTOMER_HOME,
        restaurant_location: DEPOT,
        notes: None,
    }
}

async fn placed(service: &OrderService<InMemoryEventStore>) -> AggregateId {
    service
        .place_order(place_cmd(2, 50000))
        .await
        .unwrap()
        .aggregate
        .id()
        .unwrap()
}

async fn restaurant_moves(service: &OrderService<InMemoryEventStore>, order_id: AggregateId, to: OrderStatus) {
    service
        .update_status(order_id, TransitionRequest::new(to, Actor::restaurant(RESTAURANT)))
        .await
        .unwrap();
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn placed_order_totals_are_derived() {
        let (_, service) = create_service();
        let result = service.place_order(place_cmd(2, 50000)).await.unwrap();

        assert_eq!(result.aggregate.status(), OrderStatus::WaitingConfirmation);
        assert_eq!(result.aggregate.total_amount(), Money::from_minor(100000));
        assert_eq!(result.new_version, Version::first());
    }

    #[tokio::test]
    async fn history_is_persisted_in_event_order() {
        let (store, service) = create_service();
        let order_id = placed(&service).await;

        for to in [OrderStatus::Confirmed, OrderStatus::Preparing, OrderStatus::Ready] {
            restaurant_moves(&service, order_id, to).await;
        }

        let order = service.get_order(order_id).await.unwrap();
        let statuses: Vec<_> = order.history().iter().map(|h| h.status).collect();
        assert_eq!(
            statuses,
            vec![
                OrderStatus::WaitingConfirmation,
                OrderStatus::Confirmed,
                OrderStatus::Preparing,
                OrderStatus::Ready
            ]
        );

        let events = store.get_events_for_aggregate(order_id).await.unwrap();
        let versions: Vec<_> = events.iter().map(|e| e.version.as_i64()).collect();
        assert_eq!(versions, vec![1, 2, 3, 4]);
        let last: OrderEvent = events[3].decode().unwrap();
        assert!(matches!(last, OrderEvent::OrderStatusChanged(ref d) if d.to == OrderStatus::Ready));
    }

    #[tokio::test]
    async fn rejection_records_reason() {
        let (_, service) = create_service();
        let order_id = placed(&service).await;

        let result = service
            .reject_order(order_id, Actor::restaurant(RESTAURANT), "kitchen closed")
            .await
            .unwrap();

        assert_eq!(result.aggregate.status(), OrderStatus::Rejected);
        assert_eq!(result.aggregate.rejection_reason(), Some("kitchen closed"));
        assert!(result.aggregate.status().is_terminal());
    }
}

mod transitions {
    use super::*;

    #[tokio::test]
    async fn cancel_after_preparing_is_invalid_and_leaves_state() {
        let (store, service) = create_service();
        let order_id = placed(&service).await;
        restaurant_moves(&service, order_id, OrderStatus::Confirmed).await;
        restaurant_moves(&service, order_id, OrderStatus::Preparing).await;

        let err = service
            .cancel_order(order_id, Actor::customer(CUSTOMER), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidTransition {
                from: OrderStatus::Preparing,
                to: OrderStatus::Cancelled,
                ..
            })
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        let order = service.get_order(order_id).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Preparing);
        assert_eq!(store.get_events_for_aggregate(order_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn every_illegal_edge_is_refused_without_writing() {
        let (store, service) = create_service();
        let order_id = placed(&service).await;

        let actors = [
            Actor::customer(CUSTOMER),
            Actor::restaurant(RESTAURANT),
            Actor::scheduler(),
        ];
        for actor in actors {
            for to in OrderStatus::ALL {
                if OrderStatus::WaitingConfirmation.permits(to, actor.role) {
                    continue;
                }
                let err = service
                    .update_status(order_id, TransitionRequest::new(to, actor))
                    .await
                    .unwrap_err();
                assert_eq!(err.kind(), ErrorKind::InvalidTransition, "{actor} -> {to}");
            }
        }

        assert_eq!(store.get_events_for_aggregate(order_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stranger_is_forbidden() {
        let (_, service) = create_service();
        let order_id = placed(&service).await;

        let err = service
            .accept_order(order_id, Actor::restaurant(RestaurantId::new(99)), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn admin_can_reopen_a_delivered_order() {
        let (_, service) = create_service();
        let order_id = placed(&service).await;
        service
            .update_status(
                order_id,
                TransitionRequest::new(OrderStatus::Delivered, Actor::admin(1)).note("manual"),
            )
            .await
            .unwrap();

        let result = service
            .update_status(order_id, TransitionRequest::new(OrderStatus::Ready, Actor::admin(1)))
            .await
            .unwrap();

        assert_eq!(result.aggregate.status(), OrderStatus::Ready);
        assert_eq!(result.aggregate.history().len(), 3);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn cancel_racing_preparing_has_one_winner() {
        let (_, service) = create_service();
        let order_id = placed(&service).await;
        restaurant_moves(&service, order_id, OrderStatus::Confirmed).await;

        let preparing = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .update_status(
                        order_id,
                        TransitionRequest::new(OrderStatus::Preparing, Actor::restaurant(RESTAURANT))
                            .expecting(OrderStatus::Confirmed),
                    )
                    .await
            })
        };
        let cancel = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .update_status(
                        order_id,
                        TransitionRequest::new(OrderStatus::Cancelled, Actor::customer(CUSTOMER))
                            .expecting(OrderStatus::Confirmed),
                    )
                    .await
            })
        };

        let results = [preparing.await.unwrap(), cancel.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(loser.kind(), ErrorKind::StaleState);

        let order = service.get_order(order_id).await.unwrap();
        assert_eq!(order.history().len(), 3);
    }
}

mod payments {
    use super::*;

    #[tokio::test]
    async fn payment_state_is_mirrored_on_the_order() {
        let (store, service) = create_service();
        let payments = PaymentService::new(store.clone());
        let order_id = placed(&service).await;
        let total = service.get_order(order_id).await.unwrap().total_amount();

        let attempt = payments.open(order_id, total, PaymentMethod::CreditCard).await.unwrap();
        let payment = payments
            .complete(order_id, attempt.payment().id, "TXN-1001".into())
            .await
            .unwrap();

        let mirrored = OrderPayment {
            payment_id: payment.id,
            amount: payment.amount,
            method: payment.method,
            status: payment.status,
            transaction_id: payment.transaction_id.clone(),
        };
        service.record_payment(order_id, mirrored.clone()).await.unwrap();
        let again = service.record_payment(order_id, mirrored).await.unwrap();

        assert!(again.events.is_empty());
        assert_eq!(again.aggregate.payment().unwrap().status, PaymentStatus::Completed);
        assert_eq!(again.aggregate.status(), OrderStatus::WaitingConfirmation);
    }

    #[tokio::test]
    async fn retried_checkout_never_charges_twice() {
        let store = InMemoryEventStore::new();
        let payments = PaymentService::new(store);
        let order_id = AggregateId::new();

        for _ in 0..5 {
            payments
                .open(order_id, Money::from_minor(100000), PaymentMethod::Cash)
                .await
                .unwrap();
        }

        let all = payments.payments_for(order_id).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, PaymentStatus::Pending);
    }
}

mod drones {
    use super::*;

    fn spec(name: &str, battery: f64) -> DroneSpec {
        DroneSpec {
            name: name.into(),
            model: "DJI Mavic 3".into(),
            max_payload_kg: 3.0,
            max_distance_km: 15.0,
            battery_level: battery,
            base: DEPOT,
            status: DroneStatus::Idle,
        }
    }

    #[tokio::test]
    async fn one_drone_two_orders_one_reservation() {
        let store = InMemoryEventStore::new();
        let drones = DroneService::new(store);
        let drone_id = drones.commission(spec("Falcon Beta", 95.0)).await.unwrap().aggregate.id().unwrap();

        let mission = |order_id| Mission {
            order_id,
            destination: CUSTOMER_HOME,
            weight_kg: 1.0,
            distance_km: DEPOT.distance_km(&CUSTOMER_HOME),
            min_battery: 25.0,
        };
        let first = mission(AggregateId::new());
        let second = mission(AggregateId::new());

        let a = {
            let drones = drones.clone();
            tokio::spawn(async move { drones.reserve(drone_id, &first).await })
        };
        let b = {
            let drones = drones.clone();
            tokio::spawn(async move { drones.reserve(drone_id, &second).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let drone = drones.get_drone(drone_id).await.unwrap();
        assert_eq!(drone.status(), DroneStatus::InUse);
        assert!(drone.order_id() == Some(first.order_id) || drone.order_id() == Some(second.order_id));
    }

    #[tokio::test]
    async fn maintenance_requires_explicit_release() {
        let drones = DroneService::new(InMemoryEventStore::new());
        let drone_id = drones.commission(spec("Falcon Alpha", 100.0)).await.unwrap().aggregate.id().unwrap();

        drones.enter_maintenance(drone_id, Actor::admin(1)).await.unwrap();
        let err = drones.charge(drone_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        let released = drones.release_maintenance(drone_id, Actor::admin(1)).await.unwrap();
        assert_eq!(released.aggregate.status(), DroneStatus::Idle);
    }
}
