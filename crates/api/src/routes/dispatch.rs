//! Manual control of the dispatch scheduler.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use dispatch::TickReport;
use event_store::EventStore;

use super::require_admin;
use crate::caller::Caller;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /dispatch/tick: runs one scheduler tick now (admin).
#[tracing::instrument(skip(state))]
pub async fn tick<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(actor): Caller,
) -> Result<Json<TickReport>, ApiError> {
    require_admin(&actor)?;
    Ok(Json(state.scheduler.tick().await?))
}
