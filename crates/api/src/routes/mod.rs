pub mod checkout;
pub mod dispatch;
pub mod drones;
pub mod health;
pub mod metrics;
pub mod orders;

use axum::body::Bytes;
use common::{Actor, AggregateId};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

pub(crate) fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}

pub(crate) fn json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
}

/// Like [`json_body`], but an empty body yields the default.
pub(crate) fn optional_json_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    json_body(body)
}

pub(crate) fn require_admin(actor: &Actor) -> Result<(), ApiError> {
    if !actor.is_admin() {
        return Err(ApiError::Forbidden(format!("{} may not do this", actor.role)));
    }
    Ok(())
}
