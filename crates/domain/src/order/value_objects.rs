//! Value objects for the order domain.

use std::iter::Sum;
use std::ops::Add;

use common::ProductId;
use serde::{Deserialize, Serialize};

/// Money in the smallest currency unit.
///
/// Catalog prices are whole amounts (e.g. 50000), so integer arithmetic is
/// exact and totals never drift.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const fn from_minor(amount: i64) -> Self {
        Self(amount)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Saturates instead of wrapping; validated carts never get near the
    /// limit.
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(i64::from(quantity)))
    }

    pub fn checked_times(&self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Self)
    }

    pub fn checked_add(&self, rhs: Money) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A priced line of an order. Prices and weights come from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub weight_kg: f64,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    pub fn line_weight_kg(&self) -> f64 {
        self.weight_kg * f64::from(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_sums_exactly() {
        let total: Money = [Money::from_minor(50000), Money::from_minor(25000)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_minor(75000));
        assert_eq!(Money::from_minor(50000).times(2).minor(), 100000);
        assert!(!Money::zero().is_positive());
    }

    #[test]
    fn line_totals_use_quantity() {
        let item = OrderItem {
            product_id: ProductId::new(1),
            product_name: "Pho bo".into(),
            unit_price: Money::from_minor(45000),
            quantity: 3,
            weight_kg: 0.5,
        };
        assert_eq!(item.line_total(), Money::from_minor(135000));
        assert!((item.line_weight_kg() - 1.5).abs() < f64::EPSILON);
    }
}
