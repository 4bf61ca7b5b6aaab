//! Checkout saga status.

use serde::{Deserialize, Serialize};

/// ```text
/// NotStarted ──► Running ──┬──► Completed
///                          ├──► PartiallyCompleted
///                          └──► Failed
/// ```
///
/// A finished checkout can be re-finished after a payment retry, e.g.
/// `PartiallyCompleted → Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    #[default]
    NotStarted,
    Running,
    /// Every order placed and paid.
    Completed,
    /// Some orders placed and paid, others not.
    PartiallyCompleted,
    /// No order was both placed and paid.
    Failed,
}

impl CheckoutStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            CheckoutStatus::Completed | CheckoutStatus::PartiallyCompleted | CheckoutStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStatus::NotStarted => "not_started",
            CheckoutStatus::Running => "running",
            CheckoutStatus::Completed => "completed",
            CheckoutStatus::PartiallyCompleted => "partially_completed",
            CheckoutStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CheckoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
