//! Order status and the role-gated transition table.

use common::Role;
use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// ```text
/// waiting_confirmation ──► confirmed ──► preparing ──► ready ──► in_delivery ──► delivered
///        │    │                │
///        │    └──► rejected    │
///        └─────────────────────┴──► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    WaitingConfirmation,
    Confirmed,
    Preparing,
    Ready,
    InDelivery,
    Delivered,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::WaitingConfirmation,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::InDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Rejected,
    ];

    /// Whether `role` may move an order from `self` to `to`.
    ///
    /// Admins may force any change of status; every other role is limited
    /// to its own edges.
    pub fn permits(&self, to: OrderStatus, role: Role) -> bool {
        use OrderStatus::*;

        if *self == to {
            return false;
        }

        match role {
            Role::Admin => true,
            Role::Restaurant => matches!(
                (*self, to),
                (WaitingConfirmation, Confirmed)
                    | (WaitingConfirmation, Rejected)
                    | (Confirmed, Preparing)
                    | (Preparing, Ready)
            ),
            Role::Customer => matches!(
                (*self, to),
                (WaitingConfirmation, Cancelled) | (Confirmed, Cancelled)
            ),
            Role::Scheduler => matches!((*self, to), (Ready, InDelivery) | (InDelivery, Delivered)),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// Statuses in which the order keeps its assigned drone. Moving to any
    /// other status frees the order for a fresh assignment.
    pub fn carries_drone(&self) -> bool {
        matches!(self, OrderStatus::InDelivery | OrderStatus::Delivered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::WaitingConfirmation => "waiting_confirmation",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::InDelivery => "in_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const NON_ADMIN: [Role; 3] = [Role::Customer, Role::Restaurant, Role::Scheduler];

    fn allowed_edges(role: Role) -> Vec<(OrderStatus, OrderStatus)> {
        let mut edges = Vec::new();
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                if from.permits(to, role) {
                    edges.push((from, to));
                }
            }
        }
        edges
    }

    #[test]
    fn restaurant_edges() {
        assert_eq!(
            allowed_edges(Role::Restaurant),
            vec![
                (WaitingConfirmation, Confirmed),
                (WaitingConfirmation, Rejected),
                (Confirmed, Preparing),
                (Preparing, Ready),
            ]
        );
    }

    #[test]
    fn customer_can_only_cancel_before_preparation() {
        assert_eq!(
            allowed_edges(Role::Customer),
            vec![(WaitingConfirmation, Cancelled), (Confirmed, Cancelled)]
        );
        assert!(!Preparing.permits(Cancelled, Role::Customer));
    }

    #[test]
    fn scheduler_edges() {
        assert_eq!(
            allowed_edges(Role::Scheduler),
            vec![(Ready, InDelivery), (InDelivery, Delivered)]
        );
    }

    #[test]
    fn admin_may_override_any_change() {
        assert_eq!(allowed_edges(Role::Admin).len(), 8 * 7);
        assert!(Delivered.permits(Ready, Role::Admin));
        assert!(!Ready.permits(Ready, Role::Admin));
    }

    #[test]
    fn terminal_states_have_no_non_admin_exits() {
        for from in OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in OrderStatus::ALL {
                for role in NON_ADMIN {
                    assert!(!from.permits(to, role), "{role} {from} -> {to}");
                }
            }
        }
    }

    #[test]
    fn status_names_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
