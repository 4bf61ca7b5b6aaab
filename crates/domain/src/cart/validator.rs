//! Pure cart validation against the authoritative catalog.

use std::collections::{BTreeMap, HashMap};

use common::{ProductId, RestaurantId};
use serde::{Deserialize, Serialize};

use super::{CartError, CartItem};
use crate::order::{Money, OrderItem};

/// Catalog data for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub product_id: ProductId,
    pub restaurant_id: RestaurantId,
    pub name: String,
    pub unit_price: Money,
    pub weight_kg: f64,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CartPolicy {
    /// Split a mixed cart into one order per restaurant instead of
    /// rejecting it.
    pub allow_multi_restaurant: bool,
}

/// The lines of one future order, priced from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct RestaurantGroup {
    pub restaurant_id: RestaurantId,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub total_weight_kg: f64,
}

/// Checks a submitted cart and groups it by restaurant.
///
/// Prices, names and weights in the result always come from `catalog`.
/// Duplicate lines for one product are merged. Groups are ordered by
/// restaurant id. `client_total`, when given, must equal the recomputed
/// total of the whole cart.
pub fn validate(
    items: &[CartItem],
    catalog: &HashMap<ProductId, CatalogEntry>,
    policy: &CartPolicy,
    client_total: Option<Money>,
) -> Result<Vec<RestaurantGroup>, CartError> {
    if items.is_empty() {
        return Err(CartError::EmptyCart);
    }

    let mut grouped: BTreeMap<RestaurantId, Vec<OrderItem>> = BTreeMap::new();

    for item in items {
        let product_id = item.product_id;
        if item.quantity <= 0 {
            return Err(CartError::NonPositiveQuantity { product_id });
        }
        let entry = catalog
            .get(&product_id)
            .ok_or(CartError::UnknownProduct { product_id })?;
        if !entry.available {
            return Err(CartError::ProductUnavailable { product_id });
        }
        if entry.restaurant_id != item.restaurant_id {
            return Err(CartError::RestaurantMismatch {
                product_id,
                submitted: item.restaurant_id,
                actual: entry.restaurant_id,
            });
        }
        if entry.unit_price != item.unit_price {
            return Err(CartError::PriceMismatch {
                product_id,
                submitted: item.unit_price,
                actual: entry.unit_price,
            });
        }

        let quantity = item.quantity.unsigned_abs();
        let lines = grouped.entry(entry.restaurant_id).or_default();
        match lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or(CartError::QuantityTooLarge { product_id })?;
            }
            None => lines.push(OrderItem {
                product_id,
                product_name: entry.name.clone(),
                unit_price: entry.unit_price,
                quantity,
                weight_kg: entry.weight_kg,
            }),
        }
    }

    if grouped.len() > 1 && !policy.allow_multi_restaurant {
        return Err(CartError::MixedRestaurants {
            count: grouped.len(),
        });
    }

    let groups = grouped
        .into_iter()
        .map(|(restaurant_id, items)| {
            Ok(RestaurantGroup {
                restaurant_id,
                total: checked_total(&items)?,
                total_weight_kg: items.iter().map(OrderItem::line_weight_kg).sum(),
                items,
            })
        })
        .collect::<Result<Vec<_>, CartError>>()?;

    if let Some(submitted) = client_total {
        let actual = groups
            .iter()
            .try_fold(Money::zero(), |sum, g| sum.checked_add(g.total))
            .ok_or(CartError::TotalTooLarge)?;
        if submitted != actual {
            return Err(CartError::TotalMismatch { submitted, actual });
        }
    }

    Ok(groups)
}

fn checked_total(items: &[OrderItem]) -> Result<Money, CartError> {
    items.iter().try_fold(Money::zero(), |sum, item| {
        item.unit_price
            .checked_times(item.quantity)
            .and_then(|line| sum.checked_add(line))
            .ok_or(CartError::QuantityTooLarge {
                product_id: item.product_id,
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(product: u64, restaurant: u64, price: i64) -> CatalogEntry {
        CatalogEntry {
            product_id: ProductId::new(product),
            restaurant_id: RestaurantId::new(restaurant),
            name: format!("dish {product}"),
            unit_price: Money::from_minor(price),
            weight_kg: 0.5,
            available: true,
        }
    }

    fn catalog() -> HashMap<ProductId, CatalogEntry> {
        [entry(1, 1, 50000), entry(2, 1, 30000), entry(3, 2, 45000)]
            .into_iter()
            .map(|e| (e.product_id, e))
            .collect()
    }

    fn line(product: u64, restaurant: u64, price: i64, quantity: i32) -> CartItem {
        CartItem {
            restaurant_id: RestaurantId::new(restaurant),
            product_id: ProductId::new(product),
            product_name: "client name".into(),
            unit_price: Money::from_minor(price),
            quantity,
            weight_kg: 9.9,
        }
    }

    #[test]
    fn single_restaurant_cart_becomes_one_group() {
        let groups = validate(
            &[line(1, 1, 50000, 2)],
            &catalog(),
            &CartPolicy::default(),
            Some(Money::from_minor(100000)),
        )
        .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].total, Money::from_minor(100000));
        assert_eq!(groups[0].items[0].product_name, "dish 1");
        assert!((groups[0].total_weight_kg - 1.0).abs() < 1e-9);
    }

    #[test]
    fn duplicate_lines_are_merged() {
        let groups = validate(
            &[line(1, 1, 50000, 1), line(2, 1, 30000, 1), line(1, 1, 50000, 2)],
            &catalog(),
            &CartPolicy::default(),
            None,
        )
        .unwrap();

        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[0].items[0].quantity, 3);
        assert_eq!(groups[0].total, Money::from_minor(180000));
    }

    #[test]
    fn oversized_quantities_are_rejected() {
        let huge = line(1, 1, 50000, i32::MAX);
        assert_eq!(
            validate(&[huge.clone(), huge.clone(), huge], &catalog(), &CartPolicy::default(), None),
            Err(CartError::QuantityTooLarge {
                product_id: ProductId::new(1)
            })
        );

        let mut expensive = catalog();
        expensive.insert(ProductId::new(9), entry(9, 1, i64::MAX / 2));
        let result = validate(&[line(9, 1, i64::MAX / 2, 3)], &expensive, &CartPolicy::default(), None);
        assert_eq!(
            result,
            Err(CartError::QuantityTooLarge {
                product_id: ProductId::new(9)
            })
        );
    }

    #[test]
    fn mixed_cart_is_rejected_unless_allowed() {
        let items = [line(3, 2, 45000, 1), line(1, 1, 50000, 1)];

        assert_eq!(
            validate(&items, &catalog(), &CartPolicy::default(), None),
            Err(CartError::MixedRestaurants { count: 2 })
        );

        let policy = CartPolicy {
            allow_multi_restaurant: true,
        };
        let groups = validate(&items, &catalog(), &policy, None).unwrap();
        let restaurants: Vec<_> = groups.iter().map(|g| g.restaurant_id.get()).collect();
        assert_eq!(restaurants, vec![1, 2]);
    }

    #[test]
    fn rejects_bad_input() {
        let policy = CartPolicy::default();
        assert_eq!(validate(&[], &catalog(), &policy, None), Err(CartError::EmptyCart));
        assert!(matches!(
            validate(&[line(1, 1, 50000, -1)], &catalog(), &policy, None),
            Err(CartError::NonPositiveQuantity { .. })
        ));
        assert!(matches!(
            validate(&[line(99, 1, 50000, 1)], &catalog(), &policy, None),
            Err(CartError::UnknownProduct { .. })
        ));
        assert!(matches!(
            validate(&[line(3, 1, 45000, 1)], &catalog(), &policy, None),
            Err(CartError::RestaurantMismatch { .. })
        ));
    }

    #[test]
    fn client_prices_are_never_trusted() {
        let result = validate(&[line(1, 1, 1, 2)], &catalog(), &CartPolicy::default(), None);
        assert_eq!(
            result,
            Err(CartError::PriceMismatch {
                product_id: ProductId::new(1),
                submitted: Money::from_minor(1),
                actual: Money::from_minor(50000),
            })
        );

        let result = validate(
            &[line(1, 1, 50000, 2)],
            &catalog(),
            &CartPolicy::default(),
            Some(Money::from_minor(99999)),
        );
        assert!(matches!(result, Err(CartError::TotalMismatch { .. })));
    }

    #[test]
    fn unavailable_products_are_rejected() {
        let mut catalog = catalog();
        if let Some(e) = catalog.get_mut(&ProductId::new(2)) {
            e.available = false;
        }
        assert!(matches!(
            validate(&[line(2, 1, 30000, 1)], &catalog, &CartPolicy::default(), None),
            Err(CartError::ProductUnavailable { .. })
        ));
    }
}
