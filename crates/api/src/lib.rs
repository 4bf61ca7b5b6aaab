//! HTTP surface of the drone delivery order core.
//!
//! Exposes checkout, order transitions and fleet administration over
//! axum, with structured logging (tracing) and Prometheus metrics. The
//! dispatch scheduler runs beside the server as one background task.

pub mod caller;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use common::{Actor, GeoPoint};
use dispatch::{DispatchError, FleetManager};
use domain::{DroneSpec, DroneStatus};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::{AppState, create_default_state, create_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout", post(routes::checkout::create::<S>))
        .route("/checkouts/{id}", get(routes::checkout::get::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/events", get(routes::orders::events::<S>))
        .route("/orders/{id}/accept", post(routes::orders::accept::<S>))
        .route("/orders/{id}/reject", post(routes::orders::reject::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .route("/orders/{id}/payment", post(routes::orders::pay::<S>))
        .route(
            "/drones",
            get(routes::drones::list::<S>).post(routes::drones::commission::<S>),
        )
        .route(
            "/drones/{id}",
            get(routes::drones::get::<S>).put(routes::drones::set_status::<S>),
        )
        .route("/drones/{id}/tracking", get(routes::drones::tracking::<S>))
        .route("/drones/{id}/charge", post(routes::drones::charge::<S>))
        .route("/drones/{id}/maintenance", post(routes::drones::maintenance::<S>))
        .route("/drones/{id}/release", post(routes::drones::release::<S>))
        .route("/drones/{id}/return", post(routes::drones::return_to_base::<S>))
        .route("/dispatch/tick", post(routes::dispatch::tick::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Commissions the demo fleet at `depot` unless the store already has drones.
///
/// Returns how many drones were added.
pub async fn seed_demo_fleet<S: EventStore + Clone>(
    fleet: &FleetManager<S>,
    depot: GeoPoint,
) -> Result<usize, DispatchError> {
    if !fleet.list().await?.is_empty() {
        return Ok(0);
    }

    let demo = [
        ("Falcon Alpha", "DJI Matrice 300", 6.0, 20.0, 100.0, DroneStatus::Idle),
        ("Falcon Beta", "DJI Mavic 3", 3.0, 15.0, 95.0, DroneStatus::Idle),
        ("Falcon Gamma", "Custom FPV", 2.0, 10.0, 20.0, DroneStatus::Charging),
    ];
    let seeder = Actor::admin(0);
    for (name, model, max_payload_kg, max_distance_km, battery_level, status) in demo {
        let spec = DroneSpec {
            name: name.to_string(),
            model: model.to_string(),
            max_payload_kg,
            max_distance_km,
            battery_level,
            base: depot,
            status,
        };
        fleet.commission(spec, seeder).await?;
    }

    tracing::info!(count = demo.len(), "demo fleet commissioned");
    Ok(demo.len())
}
