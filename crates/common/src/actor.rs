//! Request-scoped caller context.
//!
//! Every core operation receives the acting party explicitly; nothing infers
//! identity from shared state.

use serde::{Deserialize, Serialize};

use crate::{CustomerId, RestaurantId};

/// The role a caller acts under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Restaurant,
    Admin,
    /// The background dispatch scheduler.
    Scheduler,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Restaurant => "restaurant",
            Role::Admin => "admin",
            Role::Scheduler => "scheduler",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "restaurant" => Ok(Role::Restaurant),
            "admin" => Ok(Role::Admin),
            "scheduler" => Ok(Role::Scheduler),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Who is performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: Role,
    /// Identity-service user id. For restaurants this is the restaurant id,
    /// for the scheduler it is always 0.
    pub user_id: u64,
}

impl Actor {
    pub fn customer(id: CustomerId) -> Self {
        Self {
            role: Role::Customer,
            user_id: id.get(),
        }
    }

    pub fn restaurant(id: RestaurantId) -> Self {
        Self {
            role: Role::Restaurant,
            user_id: id.get(),
        }
    }

    pub fn admin(user_id: u64) -> Self {
        Self {
            role: Role::Admin,
            user_id,
        }
    }

    pub fn scheduler() -> Self {
        Self {
            role: Role::Scheduler,
            user_id: 0,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.role, self.user_id)
    }
}
