//! Turns a cart into a checkout plan against a locked stock snapshot.

use std::collections::HashMap;

use super::{from_cents, to_cents, DomainError};

#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product_id: i64,
    pub size: Option<String>,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizeStock {
    pub size: String,
    pub stock: i32,
}

/// Product state as read inside the checkout transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct StockSnapshot {
    pub id: i64,
    pub name: String,
    pub cost_price: f64,
    pub sale_price: f64,
    pub stock: i32,
    pub sizes: Vec<SizeStock>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLine {
    pub product_id: i64,
    pub product_name: String,
    pub size: Option<String>,
    pub quantity: i32,
    pub unit_cost: f64,
    pub unit_price: f64,
}

/// Net stock change for one product/size pair. `size` is `None` for products tracked only in aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct StockDecrement {
    pub product_id: i64,
    pub size: Option<String>,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutPlan {
    pub lines: Vec<PlannedLine>,
    pub decrements: Vec<StockDecrement>,
    pub subtotal: f64,
    pub total_cost: f64,
    pub discount: f64,
    pub total: f64,
}

/// Discount only applies for elevated callers; everybody else sells at list price.
pub fn effective_discount(requested: Option<f64>, elevated: bool) -> f64 {
    if elevated {
        requested.unwrap_or(0.0)
    } else {
        0.0
    }
}

/// Validates every line against `products` and computes totals and stock decrements.
///
/// Lines for the same product and size draw from the same remaining stock, so a
/// cart can never take more than what the snapshot holds. On error nothing in the
/// plan is applied.
pub fn plan_checkout(
    cart: &[CartLine],
    products: &HashMap<i64, StockSnapshot>,
    discount: f64,
) -> Result<CheckoutPlan, DomainError> {
    if cart.is_empty() {
        return Err(DomainError::Validation("Cart must contain at least one item".into()));
    }
    if !discount.is_finite() || discount < 0.0 {
        return Err(DomainError::Validation("Discount cannot be negative".into()));
    }

    let mut taken: HashMap<(i64, Option<String>), i32> = HashMap::new();
    let mut order_of_keys: Vec<(i64, Option<String>)> = Vec::new();
    let mut lines = Vec::with_capacity(cart.len());
    let mut subtotal: i64 = 0;
    let mut total_cost: i64 = 0;

    for line in cart {
        if line.quantity <= 0 {
            return Err(DomainError::Validation("Quantity must be greater than 0".into()));
        }

        let product = products
            .get(&line.product_id)
            .ok_or_else(|| DomainError::NotFound(format!("Product {} not found", line.product_id)))?;

        let (size, available) = resolve_size(product, line.size.as_deref())?;
        let key = (product.id, size.clone());
        let already = taken.get(&key).copied().unwrap_or(0);

        // Overflowing i32 can never be covered by stock either.
        let wanted = match already.checked_add(line.quantity) {
            Some(wanted) if wanted <= available => wanted,
            _ => {
                return Err(DomainError::InsufficientStock {
                    product: product.name.clone(),
                    size,
                    requested: already.saturating_add(line.quantity),
                    available,
                })
            }
        };

        if already == 0 {
            order_of_keys.push(key.clone());
        }
        taken.insert(key, wanted);

        subtotal = add_line_cents(subtotal, product.sale_price, line.quantity)?;
        total_cost = add_line_cents(total_cost, product.cost_price, line.quantity)?;

        lines.push(PlannedLine {
            product_id: product.id,
            product_name: product.name.clone(),
            size,
            quantity: line.quantity,
            unit_cost: product.cost_price,
            unit_price: product.sale_price,
        });
    }

    let discount = to_cents(discount);
    if discount > subtotal {
        return Err(DomainError::Validation(format!(
            "Discount ({:.2}) cannot exceed the subtotal ({:.2})",
            from_cents(discount),
            from_cents(subtotal)
        )));
    }

    let decrements = order_of_keys
        .into_iter()
        .map(|key| {
            let quantity = taken[&key];
            StockDecrement { product_id: key.0, size: key.1, quantity }
        })
        .collect();

    Ok(CheckoutPlan {
        lines,
        decrements,
        subtotal: from_cents(subtotal),
        total_cost: from_cents(total_cost),
        discount: from_cents(discount),
        total: from_cents(subtotal - discount),
    })
}

fn add_line_cents(acc: i64, unit_price: f64, quantity: i32) -> Result<i64, DomainError> {
    to_cents(unit_price)
        .checked_mul(i64::from(quantity))
        .and_then(|line| acc.checked_add(line))
        .ok_or_else(|| DomainError::Validation("Order total is too large".into()))
}

/// Matches the requested size against the product's size list (case-insensitive).
/// Returns the canonical size name and its stock.
fn resolve_size(product: &StockSnapshot, requested: Option<&str>) -> Result<(Option<String>, i32), DomainError> {
    match (requested.map(str::trim).filter(|s| !s.is_empty()), product.sizes.is_empty()) {
        (None, true) => Ok((None, product.stock)),
        (None, false) => Err(DomainError::Validation(format!(
            "A size is required for product '{}'",
            product.name
        ))),
        (Some(size), _) => product
            .sizes
            .iter()
            .find(|s| s.size.eq_ignore_ascii_case(size))
            .map(|s| (Some(s.size.clone()), s.stock))
            .ok_or_else(|| {
                DomainError::NotFound(format!("Size {size} not found for product '{}'", product.name))
            }),
    }
}

/// Applies decrements to the snapshot in memory. Sized products get their aggregate
/// recomputed from the size list. Stock never drops below zero.
pub fn apply_decrements(products: &mut HashMap<i64, StockSnapshot>, decrements: &[StockDecrement]) {
    for d in decrements {
        if let Some(product) = products.get_mut(&d.product_id) {
            match &d.size {
                Some(size) => {
                    if let Some(entry) = product.sizes.iter_mut().find(|s| &s.size == size) {
                        entry.stock = entry.stock.saturating_sub(d.quantity).max(0);
                    }
                    product.stock = product.sizes.iter().fold(0i32, |acc, s| acc.saturating_add(s.stock));
                }
                None => product.stock = product.stock.saturating_sub(d.quantity).max(0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shirt() -> StockSnapshot {
        StockSnapshot {
            id: 1,
            name: "Linen shirt".into(),
            cost_price: 20.0,
            sale_price: 49.9,
            stock: 20,
            sizes: vec![
                SizeStock { size: "M".into(), stock: 15 },
                SizeStock { size: "L".into(), stock: 5 },
            ],
        }
    }

    fn belt() -> StockSnapshot {
        StockSnapshot {
            id: 2,
            name: "Leather belt".into(),
            cost_price: 12.5,
            sale_price: 35.0,
            stock: 3,
            sizes: vec![],
        }
    }

    fn catalog() -> HashMap<i64, StockSnapshot> {
        [shirt(), belt()].into_iter().map(|p| (p.id, p)).collect()
    }

    fn line(product_id: i64, size: Option<&str>, quantity: i32) -> CartLine {
        CartLine { product_id, size: size.map(String::from), quantity }
    }

    #[test]
    fn two_shirts_in_m() {
        let mut products = catalog();
        let plan = plan_checkout(&[line(1, Some("M"), 2)], &products, 0.0).unwrap();

        assert_eq!(plan.subtotal, 99.8);
        assert_eq!(plan.total, 99.8);
        assert_eq!(plan.total_cost, 40.0);
        assert_eq!(plan.decrements, vec![StockDecrement { product_id: 1, size: Some("M".into()), quantity: 2 }]);

        apply_decrements(&mut products, &plan.decrements);
        let p = &products[&1];
        assert_eq!(p.sizes[0].stock, 13);
        assert_eq!(p.stock, 18);
    }

    #[test]
    fn decrements_sum_to_requested_quantity() {
        let mut products = catalog();
        let cart = [line(1, Some("M"), 2), line(1, Some("l"), 1), line(1, Some("M"), 3), line(2, None, 2)];
        let plan = plan_checkout(&cart, &products, 10.0).unwrap();

        let requested: i32 = cart.iter().map(|l| l.quantity).sum();
        let decremented: i32 = plan.decrements.iter().map(|d| d.quantity).sum();
        assert_eq!(requested, decremented);
        assert_eq!(plan.decrements.len(), 3);

        let before: i32 = products.values().map(|p| p.stock).sum();
        apply_decrements(&mut products, &plan.decrements);
        let after: i32 = products.values().map(|p| p.stock).sum();
        assert_eq!(before - after, requested);
        assert_eq!(products[&1].sizes[1].stock, 4);
        assert_eq!(products[&1].stock, products[&1].sizes.iter().map(|s| s.stock).sum::<i32>());
    }

    #[test]
    fn insufficient_stock_rejects_whole_cart() {
        let products = catalog();
        let err = plan_checkout(&[line(2, None, 1), line(1, Some("L"), 6)], &products, 0.0).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                product: "Linen shirt".into(),
                size: Some("L".into()),
                requested: 6,
                available: 5,
            }
        );
    }

    #[test]
    fn repeated_lines_share_the_same_stock() {
        let products = catalog();
        let err = plan_checkout(&[line(1, Some("L"), 3), line(1, Some("L"), 3)], &products, 0.0).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { requested: 6, available: 5, .. }));
    }

    #[test]
    fn huge_quantity_is_insufficient_stock_not_overflow() {
        let products = catalog();
        let err = plan_checkout(&[line(1, Some("M"), 1), line(1, Some("M"), i32::MAX)], &products, 0.0).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                product: "Linen shirt".into(),
                size: Some("M".into()),
                requested: i32::MAX,
                available: 15,
            }
        );

        assert!(matches!(
            plan_checkout(&[line(2, None, i32::MAX)], &products, 0.0),
            Err(DomainError::InsufficientStock { available: 3, .. })
        ));
    }

    #[test]
    fn applying_an_oversized_decrement_stops_at_zero() {
        let mut products = catalog();
        apply_decrements(&mut products, &[
            StockDecrement { product_id: 1, size: Some("L".into()), quantity: i32::MAX },
            StockDecrement { product_id: 2, size: None, quantity: i32::MAX },
        ]);
        assert_eq!(products[&1].sizes[1].stock, 0);
        assert_eq!(products[&1].stock, 15);
        assert_eq!(products[&2].stock, 0);
    }

    #[test]
    fn second_checkout_sees_first_decrement() {
        // Two buyers want 3 of the 5 L shirts; once the first plan is applied the second must fail.
        let mut products = catalog();
        let first = plan_checkout(&[line(1, Some("L"), 3)], &products, 0.0).unwrap();
        apply_decrements(&mut products, &first.decrements);

        let second = plan_checkout(&[line(1, Some("L"), 3)], &products, 0.0);
        assert!(matches!(second, Err(DomainError::InsufficientStock { available: 2, .. })));
    }

    #[test]
    fn unknown_product_or_size_is_not_found() {
        let products = catalog();
        assert!(matches!(
            plan_checkout(&[line(9, Some("M"), 1)], &products, 0.0),
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            plan_checkout(&[line(1, Some("XXL"), 1)], &products, 0.0),
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            plan_checkout(&[line(2, Some("M"), 1)], &products, 0.0),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn sized_product_requires_size() {
        let products = catalog();
        assert!(matches!(
            plan_checkout(&[line(1, None, 1)], &products, 0.0),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn empty_cart_and_bad_quantity_are_rejected() {
        let products = catalog();
        assert!(matches!(plan_checkout(&[], &products, 0.0), Err(DomainError::Validation(_))));
        assert!(matches!(
            plan_checkout(&[line(1, Some("M"), 0)], &products, 0.0),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn discount_cannot_exceed_subtotal() {
        let products = catalog();
        assert!(plan_checkout(&[line(2, None, 1)], &products, 35.0).is_ok());
        assert!(matches!(
            plan_checkout(&[line(2, None, 1)], &products, 35.01),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            plan_checkout(&[line(2, None, 1)], &products, -1.0),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn totals_are_exact_to_the_cent() {
        let mut products = catalog();
        if let Some(belt) = products.get_mut(&2) {
            belt.sale_price = 0.1;
            belt.cost_price = 0.07;
            belt.stock = 30;
        }
        let plan = plan_checkout(&[line(2, None, 30)], &products, 0.2).unwrap();
        assert_eq!(plan.subtotal, 3.0);
        assert_eq!(plan.total_cost, 2.1);
        assert_eq!(plan.total, 2.8);
    }

    #[test]
    fn total_beyond_cent_range_is_rejected() {
        let mut products = catalog();
        if let Some(belt) = products.get_mut(&2) {
            belt.sale_price = 1e15;
            belt.stock = i32::MAX;
        }
        assert!(matches!(
            plan_checkout(&[line(2, None, i32::MAX)], &products, 0.0),
            Err(DomainError::Validation(msg)) if msg == "Order total is too large"
        ));
    }

    #[test]
    fn discount_is_dropped_for_regular_cashiers() {
        assert_eq!(effective_discount(Some(15.0), false), 0.0);
        assert_eq!(effective_discount(Some(15.0), true), 15.0);
        assert_eq!(effective_discount(None, true), 0.0);
    }
}
