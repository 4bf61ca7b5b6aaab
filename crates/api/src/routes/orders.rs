//! Order queries, role-gated transitions and payment retry.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use checkout::OrderOutcome;
use common::{Actor, AggregateId, CustomerId, GeoPoint, RestaurantId};
use domain::{
    DomainError, HistoryEntry, Money, Order, OrderItem, OrderPayment, OrderStatus, PaymentMethod,
    TransitionRequest,
};
use event_store::EventStore;
use projections::OrderSummary;
use serde::{Deserialize, Serialize};

use super::{json_body, optional_json_body, parse_aggregate_id};
use crate::caller::Caller;
use crate::error::{ApiError, status_for};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct NoteBody {
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct RejectBody {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub reason: Option<String>,
    /// Only meaningful for an admin moving an order into delivery.
    pub drone_id: Option<AggregateId>,
}

#[derive(Deserialize, Default)]
pub struct PaymentBody {
    pub payment_method: Option<PaymentMethod>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: AggregateId,
    pub checkout_id: Option<AggregateId>,
    pub customer_id: Option<CustomerId>,
    pub restaurant_id: Option<RestaurantId>,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub total_weight_kg: f64,
    pub delivery_address: String,
    pub delivery_location: Option<GeoPoint>,
    pub restaurant_location: Option<GeoPoint>,
    pub distance_km: f64,
    pub estimated_delivery_minutes: i64,
    pub notes: Option<String>,
    pub drone_id: Option<AggregateId>,
    pub rejection_reason: Option<String>,
    pub payment: Option<OrderPayment>,
    pub history: Vec<HistoryEntry>,
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderResponse {
    fn new(id: AggregateId, order: &Order) -> Self {
        Self {
            id,
            checkout_id: order.checkout_id(),
            customer_id: order.customer_id(),
            restaurant_id: order.restaurant_id(),
            status: order.status(),
            items: order.items().to_vec(),
            total_amount: order.total_amount(),
            total_weight_kg: order.total_weight_kg(),
            delivery_address: order.delivery_address().to_string(),
            delivery_location: order.delivery_location(),
            restaurant_location: order.restaurant_location(),
            distance_km: order.distance_km(),
            estimated_delivery_minutes: order.estimated_delivery_minutes(),
            notes: order.notes().map(String::from),
            drone_id: order.drone_id(),
            rejection_reason: order.rejection_reason().map(String::from),
            payment: order.payment().cloned(),
            history: order.history().to_vec(),
            created_at: order.created_at(),
        }
    }
}

#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub version: i64,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub metadata: HashMap<String, serde_json::Value>,
}

// -- Handlers --

/// GET /orders?status= : the caller's orders, newest first.
#[tracing::instrument(skip(state, query))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    state.scheduler.catch_up().await?;
    Ok(Json(state.scheduler.board().for_actor(&actor, status).await))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let order = visible_order(&state, order_id, &actor).await?;
    Ok(Json(OrderResponse::new(order_id, &order)))
}

/// GET /orders/{id}/events: the raw event stream, oldest first.
#[tracing::instrument(skip(state))]
pub async fn events<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    visible_order(&state, order_id, &actor).await?;

    let envelopes = state
        .store
        .get_events_for_aggregate(order_id)
        .await
        .map_err(DomainError::from)?;

    let responses = envelopes
        .into_iter()
        .map(|e| EventEnvelopeResponse {
            event_id: e.event_id.to_string(),
            event_type: e.event_type,
            version: e.version.as_i64(),
            sequence: e.sequence,
            timestamp: e.timestamp,
            payload: e.payload,
            metadata: e.metadata,
        })
        .collect();

    Ok(Json(responses))
}

/// POST /orders/{id}/accept
#[tracing::instrument(skip(state, body))]
pub async fn accept<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let body: NoteBody = optional_json_body(&body)?;

    let result = state.orders.accept_order(order_id, actor, body.note).await?;
    Ok(Json(OrderResponse::new(order_id, &result.aggregate)))
}

/// POST /orders/{id}/reject
#[tracing::instrument(skip(state, body))]
pub async fn reject<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let body: RejectBody = json_body(&body)?;

    let result = state.orders.reject_order(order_id, actor, body.reason).await?;
    Ok(Json(OrderResponse::new(order_id, &result.aggregate)))
}

/// PUT /orders/{id}/status: any edge of the transition table, cancellation
/// included.
#[tracing::instrument(skip(state, body))]
pub async fn update_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let body: StatusBody = json_body(&body)?;

    let mut request = TransitionRequest::new(body.status, actor);
    request.note = body.note;
    request.reason = body.reason;
    request.drone_id = body.drone_id;

    let result = state.orders.update_status(order_id, request).await?;
    Ok(Json(OrderResponse::new(order_id, &result.aggregate)))
}

/// POST /orders/{id}/payment: retries the payment step of one order.
///
/// Answers with the outcome either way; the status reflects a failed charge.
#[tracing::instrument(skip(state, body))]
pub async fn pay<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<OrderOutcome>), ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let body: PaymentBody = optional_json_body(&body)?;

    let outcome = state
        .checkout
        .pay_order(order_id, actor, body.payment_method)
        .await?;
    let status = outcome
        .error
        .as_ref()
        .map_or(StatusCode::OK, |failure| status_for(failure.kind));
    Ok((status, Json(outcome)))
}

async fn visible_order<S: EventStore + Clone>(
    state: &AppState<S>,
    order_id: AggregateId,
    actor: &Actor,
) -> Result<Order, ApiError> {
    let order = state.orders.get_order(order_id).await?;
    if !order.is_visible_to(actor) {
        return Err(ApiError::Forbidden(format!("order {order_id} is not visible to {actor}")));
    }
    Ok(order)
}
