use chrono::Utc;
use common::{Actor, AggregateId, CustomerId, GeoPoint, ProductId, RestaurantId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Aggregate, DomainEvent, Drone, DroneEvent, DroneStatus, Money, Order, OrderEvent, OrderItem,
    OrderService, OrderStatus, PlaceOrder, TransitionRequest,
};
use event_store::{AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, Version};

const DEPOT: GeoPoint = GeoPoint::new(10.762622, 106.660172);
const CUSTOMER: GeoPoint = GeoPoint::new(10.776889, 106.700806);

fn make_envelope<E: DomainEvent>(aggregate_id: AggregateId, aggregate_type: &str, version: i64, event: &E) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type(aggregate_type)
        .event_type(event.event_type())
        .version(Version::new(version))
        .payload(event)
        .unwrap()
        .build()
        .unwrap()
}

fn place_cmd() -> PlaceOrder {
    PlaceOrder {
        order_id: AggregateId::new(),
        checkout_id: None,
        customer_id: CustomerId::new(1),
        restaurant_id: RestaurantId::new(1),
        items: vec![OrderItem {
            product_id: ProductId::new(1),
            product_name: "Com tam".into(),
            unit_price: Money::from_minor(50000),
            quantity: 2,
            weight_kg: 0.4,
        }],
        delivery_address: "1 Le Loi".into(),
        delivery_location: CUSTOMER,
        restaurant_location: DEPOT,
        notes: None,
    }
}

fn bench_place_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/place_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = OrderService::new(InMemoryEventStore::new());
                service.place_order(place_cmd()).await.unwrap();
            });
        });
    });
}

fn bench_order_lifecycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let restaurant = Actor::restaurant(RestaurantId::new(1));

    c.bench_function("domain/order_lifecycle", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = OrderService::new(InMemoryEventStore::new());
                let cmd = place_cmd();
                let order_id = cmd.order_id;
                service.place_order(cmd).await.unwrap();
                for to in [OrderStatus::Confirmed, OrderStatus::Preparing, OrderStatus::Ready] {
                    service
                        .update_status(order_id, TransitionRequest::new(to, restaurant))
                        .await
                        .unwrap();
                }
                service.dispatch_order(order_id, AggregateId::new()).await.unwrap();
                service.complete_delivery(order_id).await.unwrap();
            });
        });
    });
}

fn bench_order_replay(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let cmd = place_cmd();
    let order_id = cmd.order_id;

    // 1 placement + 49 admin overrides bouncing between two statuses.
    rt.block_on(async {
        let mut order = Order::default();
        let mut envelopes = Vec::new();
        let placed = order.place(cmd, Utc::now()).unwrap();
        envelopes.push(make_envelope(order_id, "Order", 1, &placed[0]));
        order.apply_events(placed);

        for v in 2..=50 {
            let to = if v % 2 == 0 { OrderStatus::Confirmed } else { OrderStatus::WaitingConfirmation };
            let events = order
                .transition(TransitionRequest::new(to, Actor::admin(1)), &Default::default())
                .unwrap();
            envelopes.push(make_envelope(order_id, "Order", v, &events[0]));
            order.apply_events(events);
        }
        store.append(envelopes, AppendOptions::new()).await.unwrap();
    });

    c.bench_function("domain/replay_order_50_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let events = store.get_events_for_aggregate(order_id).await.unwrap();
                let mut order = Order::default();
                for envelope in &events {
                    let event: OrderEvent = envelope.decode().unwrap();
                    order.apply(event);
                }
                assert_eq!(order.history().len(), 50);
            });
        });
    });
}

fn bench_drone_replay(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let drone_id = AggregateId::new();

    rt.block_on(async {
        let now = Utc::now();
        let mut envelopes = vec![make_envelope(
            drone_id,
            "Drone",
            1,
            &DroneEvent::DroneCommissioned {
                drone_id,
                name: "Falcon Alpha".into(),
                model: "DJI Matrice 300".into(),
                max_payload_kg: 6.0,
                max_distance_km: 20.0,
                battery_level: 100.0,
                base: DEPOT,
                status: DroneStatus::Idle,
                at: now,
            },
        )];
        for v in 2..=200 {
            let moved = DroneEvent::DroneMoved {
                position: DEPOT,
                battery_level: 100.0 - v as f64 * 0.1,
                travelled_km: 0.1,
                remaining_km: 1.0,
                flight_hours: 0.002,
                at: now,
            };
            envelopes.push(make_envelope(drone_id, "Drone", v, &moved));
        }
        store.append(envelopes, AppendOptions::new()).await.unwrap();
    });

    c.bench_function("domain/replay_drone_200_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let events = store.get_events_for_aggregate(drone_id).await.unwrap();
                let mut drone = Drone::default();
                for envelope in &events {
                    let event: DroneEvent = envelope.decode().unwrap();
                    drone.apply(event);
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_place_order,
    bench_order_lifecycle,
    bench_order_replay,
    bench_drone_replay,
);
criterion_main!(benches);
