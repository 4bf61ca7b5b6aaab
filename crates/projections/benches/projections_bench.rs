use common::{Actor, AggregateId, CustomerId, GeoPoint, ProductId, RestaurantId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Money, OrderItem, OrderService, OrderStatus, PlaceOrder, TransitionRequest};
use event_store::InMemoryEventStore;
use projections::{OrderBoardView, Projection, ProjectionProcessor};

const DEPOT: GeoPoint = GeoPoint::new(10.762622, 106.660172);
const HOME: GeoPoint = GeoPoint::new(10.776889, 106.700806);

/// Places `n` orders and moves each to `Ready`: four events per order.
async fn populate_store(store: &InMemoryEventStore, n: u64) {
    let service = OrderService::new(store.clone());
    let restaurant = RestaurantId::new(1);

    for i in 0..n {
        let order_id = AggregateId::new();
        service
            .place_order(PlaceOrder {
                order_id,
                checkout_id: None,
                customer_id: CustomerId::new(i % 50 + 1),
                restaurant_id: restaurant,
                items: vec![OrderItem {
                    product_id: ProductId::new(1),
                    product_name: "Banh mi".into(),
                    unit_price: Money::from_minor(30000),
                    quantity: 2,
                    weight_kg: 0.3,
                }],
                delivery_address: "1 Le Loi".into(),
                delivery_location: HOME,
                restaurant_location: DEPOT,
                notes: None,
            })
            .await
            .unwrap();
        for to in [OrderStatus::Confirmed, OrderStatus::Preparing, OrderStatus::Ready] {
            service
                .update_status(order_id, TransitionRequest::new(to, Actor::restaurant(restaurant)))
                .await
                .unwrap();
        }
    }
}

fn bench_catch_up(c: &mut Criterion, orders: u64) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, orders));

    c.bench_function(&format!("projections/catch_up_{}_events", orders * 4), |b| {
        b.iter(|| {
            rt.block_on(async {
                let view = OrderBoardView::new();
                let mut processor = ProjectionProcessor::new(store.clone());
                processor.register(Box::new(view.clone()) as Box<dyn Projection>);
                processor.run_catch_up().await.unwrap();
            });
        });
    });
}

fn bench_catch_up_100_orders(c: &mut Criterion) {
    bench_catch_up(c, 100);
}

fn bench_catch_up_1000_orders(c: &mut Criterion) {
    bench_catch_up(c, 1000);
}

fn bench_ready_queue(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let view = OrderBoardView::new();

    rt.block_on(async {
        populate_store(&store, 1000).await;
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(view.clone()));
        processor.run_catch_up().await.unwrap();
    });

    c.bench_function("projections/ready_without_drone_1000", |b| {
        b.iter(|| rt.block_on(view.ready_without_drone()));
    });
}

criterion_group!(
    benches,
    bench_catch_up_100_orders,
    bench_catch_up_1000_orders,
    bench_ready_queue,
);
criterion_main!(benches);
