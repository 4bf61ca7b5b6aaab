//! Shared application state and its wiring.

use std::sync::Arc;

use checkout::{
    CheckoutCoordinator, InMemoryLocationService, InMemoryPaymentProvider, InMemoryProductCatalog,
};
use common::{GeoPoint, ProductId, RestaurantId};
use dispatch::{DispatchScheduler, FleetManager};
use domain::{CatalogEntry, Money, OrderService};
use event_store::EventStore;

use crate::config::Config;

pub type Checkout<S> =
    CheckoutCoordinator<S, InMemoryProductCatalog, InMemoryPaymentProvider, InMemoryLocationService>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub store: S,
    pub orders: OrderService<S>,
    pub checkout: Checkout<S>,
    pub scheduler: Arc<DispatchScheduler<S>>,
    pub catalog: InMemoryProductCatalog,
    pub provider: InMemoryPaymentProvider,
    pub location: InMemoryLocationService,
    /// Default base for drones commissioned without one.
    pub depot: GeoPoint,
}

impl<S: EventStore + Clone> AppState<S> {
    pub fn fleet(&self) -> &FleetManager<S> {
        self.scheduler.fleet()
    }
}

/// Wires services, collaborators and the scheduler over one event store.
pub fn create_state<S: EventStore + Clone + 'static>(store: S, config: &Config) -> Arc<AppState<S>> {
    let catalog = InMemoryProductCatalog::with_entries(demo_catalog());
    let provider = InMemoryPaymentProvider::new();
    let location = InMemoryLocationService::around(config.depot);

    let checkout = CheckoutCoordinator::new(
        store.clone(),
        catalog.clone(),
        provider.clone(),
        location.clone(),
        config.checkout(),
    );
    let scheduler = DispatchScheduler::new(store.clone(), config.fleet(), config.scheduler());

    Arc::new(AppState {
        orders: OrderService::with_policy(store.clone(), config.order_policy()),
        store,
        checkout,
        scheduler: Arc::new(scheduler),
        catalog,
        provider,
        location,
        depot: config.depot,
    })
}

/// State with default configuration, for tests and local runs.
pub fn create_default_state<S: EventStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    create_state(store, &Config::default())
}

/// Products offered by the two demo restaurants.
pub fn demo_catalog() -> Vec<CatalogEntry> {
    let entry = |product: u64, restaurant: u64, name: &str, price: i64, weight_kg: f64| CatalogEntry {
        product_id: ProductId::new(product),
        restaurant_id: RestaurantId::new(restaurant),
        name: name.to_string(),
        unit_price: Money::from_minor(price),
        weight_kg,
        available: true,
    };

    vec![
        entry(1, 1, "Com tam suon bi cha", 50000, 0.5),
        entry(2, 1, "Tra da", 10000, 0.3),
        entry(3, 1, "Banh flan", 15000, 0.15),
        entry(4, 2, "Pho bo tai", 45000, 0.6),
        entry(5, 2, "Banh mi thit", 25000, 0.25),
        entry(6, 2, "Family hotpot", 320000, 7.5),
    ]
}
