//! Checkout settings.

use std::time::Duration;

use domain::CartPolicy;

#[derive(Debug, Clone, Copy)]
pub struct CheckoutConfig {
    pub cart_policy: CartPolicy,
    /// A provider call running longer than this counts as a failed payment.
    pub payment_timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            cart_policy: CartPolicy::default(),
            payment_timeout: Duration::from_secs(10),
        }
    }
}
