//! Caller identity as issued by the upstream identity service.
//!
//! The gateway authenticates the user and forwards `x-user-role` and
//! `x-user-id`; handlers receive them as an explicit [`Actor`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{Actor, Role};

use crate::error::ApiError;

pub const ROLE_HEADER: &str = "x-user-role";
pub const USER_HEADER: &str = "x-user-id";

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let role: Role = header(parts, ROLE_HEADER)?
            .parse()
            .map_err(ApiError::Unauthenticated)?;
        if role == Role::Scheduler {
            return Err(ApiError::Unauthenticated(
                "the scheduler role cannot be used over HTTP".into(),
            ));
        }

        let raw_id = header(parts, USER_HEADER)?;
        let user_id = raw_id
            .parse()
            .map_err(|_| ApiError::Unauthenticated(format!("invalid {USER_HEADER} '{raw_id}'")))?;

        Ok(Caller(Actor { role, user_id }))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated(format!("{name} header is required")))
}
