//! Checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{CheckoutRequest, CheckoutResult};
use common::{AggregateId, CustomerId, Role};
use domain::{CartItem, Money, PaymentMethod};
use event_store::EventStore;
use serde::Deserialize;

use super::{json_body, parse_aggregate_id};
use crate::caller::Caller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CheckoutBody {
    /// Idempotency key chosen by the client.
    pub checkout_id: Option<AggregateId>,
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub delivery_address: String,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
    /// The total the client showed the customer.
    pub client_total: Option<Money>,
}

/// POST /checkout
///
/// 201 for a new checkout, 200 when the checkout id was already known.
/// Per-order payment failures are reported inside the body.
#[tracing::instrument(skip(state, body), fields(caller = %caller.0))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    body: Bytes,
) -> Result<(StatusCode, Json<CheckoutResult>), ApiError> {
    let Caller(actor) = caller;
    if actor.role != Role::Customer {
        return Err(ApiError::Forbidden("only customers check out".into()));
    }
    let body: CheckoutBody = json_body(&body)?;

    let result = state
        .checkout
        .checkout(CheckoutRequest {
            checkout_id: body.checkout_id,
            customer_id: CustomerId::new(actor.user_id),
            items: body.items,
            delivery_address: body.delivery_address,
            notes: body.notes,
            payment_method: body.payment_method,
            client_total: body.client_total,
        })
        .await?;

    let status = if result.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(result)))
}

/// GET /checkouts/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
    Path(id): Path<String>,
) -> Result<Json<CheckoutResult>, ApiError> {
    let checkout_id = parse_aggregate_id(&id)?;
    Ok(Json(state.checkout.get_checkout(checkout_id, actor).await?))
}
