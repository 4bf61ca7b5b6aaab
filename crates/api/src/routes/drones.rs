//! Fleet administration and drone tracking.
//!
//! Reads are open to any authenticated caller; every mutation is admin-only.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AggregateId, GeoPoint};
use domain::{Aggregate, Drone, DroneSpec, DroneStatus, TelemetrySample};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::{json_body, parse_aggregate_id};
use crate::caller::Caller;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_TRACKING_LIMIT: usize = 20;
const MAX_TRACKING_LIMIT: usize = 500;

// -- Request types --

#[derive(Deserialize)]
pub struct CommissionBody {
    pub name: String,
    pub model: String,
    pub max_payload_kg: f64,
    pub max_distance_km: f64,
    #[serde(default = "full_battery")]
    pub battery_level: f64,
    /// Defaults to the configured depot.
    pub base: Option<GeoPoint>,
    #[serde(default)]
    pub status: DroneStatus,
}

fn full_battery() -> f64 {
    100.0
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: DroneStatus,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct TrackingQuery {
    pub limit: Option<usize>,
}

// -- Response types --

#[derive(Serialize)]
pub struct DroneResponse {
    pub id: Option<AggregateId>,
    pub name: String,
    pub model: String,
    pub status: DroneStatus,
    pub battery_level: f64,
    pub max_payload_kg: f64,
    pub max_distance_km: f64,
    pub position: GeoPoint,
    pub base: GeoPoint,
    pub order_id: Option<AggregateId>,
    pub destination: Option<GeoPoint>,
    pub remaining_km: Option<f64>,
    pub total_distance_km: f64,
    pub flight_hours: f64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Drone> for DroneResponse {
    fn from(drone: &Drone) -> Self {
        Self {
            id: drone.id(),
            name: drone.name().to_string(),
            model: drone.model().to_string(),
            status: drone.status(),
            battery_level: drone.battery_level(),
            max_payload_kg: drone.max_payload_kg(),
            max_distance_km: drone.max_distance_km(),
            position: drone.position(),
            base: drone.base(),
            order_id: drone.order_id(),
            destination: drone.destination(),
            remaining_km: drone.remaining_km(),
            total_distance_km: drone.total_distance_km(),
            flight_hours: drone.flight_hours(),
            updated_at: drone.updated_at(),
        }
    }
}

type DroneResult = Result<Json<DroneResponse>, ApiError>;

// -- Handlers --

/// POST /drones
#[tracing::instrument(skip(state, body))]
pub async fn commission<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
    body: Bytes,
) -> Result<(StatusCode, Json<DroneResponse>), ApiError> {
    let body: CommissionBody = json_body(&body)?;
    let spec = DroneSpec {
        name: body.name,
        model: body.model,
        max_payload_kg: body.max_payload_kg,
        max_distance_km: body.max_distance_km,
        battery_level: body.battery_level,
        base: body.base.unwrap_or(state.depot),
        status: body.status,
    };

    let drone = state.fleet().commission(spec, actor).await?;
    Ok((StatusCode::CREATED, Json(DroneResponse::from(&drone))))
}

/// GET /drones?status= : the fleet as the roster sees it, by name.
#[tracing::instrument(skip(state, query))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(_actor): Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<DroneResponse>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<DroneStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    state.scheduler.catch_up().await?;
    let roster = state.scheduler.roster();
    let drones = match status {
        Some(status) => roster.by_status(status).await,
        None => roster.all().await,
    };
    Ok(Json(drones.iter().map(DroneResponse::from).collect()))
}

/// GET /drones/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(_actor): Caller,
    Path(id): Path<String>,
) -> DroneResult {
    let drone = state.fleet().get(parse_aggregate_id(&id)?).await?;
    Ok(Json(DroneResponse::from(&drone)))
}

/// GET /drones/{id}/tracking?limit= : recent telemetry, newest first.
#[tracing::instrument(skip(state, query))]
pub async fn tracking<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(_actor): Caller,
    Path(id): Path<String>,
    Query(query): Query<TrackingQuery>,
) -> Result<Json<Vec<TelemetrySample>>, ApiError> {
    let drone_id = parse_aggregate_id(&id)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TRACKING_LIMIT)
        .clamp(1, MAX_TRACKING_LIMIT);
    Ok(Json(state.fleet().tracking(drone_id, limit).await?))
}

/// POST /drones/{id}/charge
#[tracing::instrument(skip(state))]
pub async fn charge<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> DroneResult {
    let drone = state.fleet().charge(parse_aggregate_id(&id)?, actor).await?;
    Ok(Json(DroneResponse::from(&drone)))
}

/// POST /drones/{id}/maintenance
#[tracing::instrument(skip(state))]
pub async fn maintenance<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> DroneResult {
    let drone = state.fleet().maintenance(parse_aggregate_id(&id)?, actor).await?;
    Ok(Json(DroneResponse::from(&drone)))
}

/// POST /drones/{id}/release: maintenance back to idle.
#[tracing::instrument(skip(state))]
pub async fn release<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> DroneResult {
    let drone = state
        .fleet()
        .release_maintenance(parse_aggregate_id(&id)?, actor)
        .await?;
    Ok(Json(DroneResponse::from(&drone)))
}

/// POST /drones/{id}/return
#[tracing::instrument(skip(state))]
pub async fn return_to_base<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> DroneResult {
    let drone = state.fleet().return_to_base(parse_aggregate_id(&id)?, actor).await?;
    Ok(Json(DroneResponse::from(&drone)))
}

/// PUT /drones/{id}: admin status override.
#[tracing::instrument(skip(state, body))]
pub async fn set_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> DroneResult {
    let drone_id = parse_aggregate_id(&id)?;
    let body: StatusBody = json_body(&body)?;
    let drone = state.fleet().set_status(drone_id, body.status, actor).await?;
    Ok(Json(DroneResponse::from(&drone)))
}
