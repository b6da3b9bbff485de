//! # Price Resolution
//!
//! Selects the unit price of a product for a quantity at a shop.
//!
//! ## Algorithm
//! ```text
//! candidates = tiers where
//!                  product matches
//!              AND (category matches | wholesale row is active)
//!              AND min_quantity <= quantity
//!              AND (shop_id == shop OR shop_id IS NULL)
//!
//! order by   shop-specific first, then min_quantity DESC, then price ASC
//! take first → price, else product.selling_price
//! ```
//!
//! The function is pure: the database layer loads the candidate rows for a
//! product and hands them in, so identical inputs always give identical
//! prices.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use crate::money::Money;
use crate::types::{PriceRule, Product, WholesalePrice};

/// Which price list a line is priced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "category_id", rename_all = "snake_case")]
pub enum PriceSelector {
    /// Always the product's selling price.
    Base,
    /// Tiered rules of one price category.
    Category(i64),
    /// Wholesale quantity breaks.
    Wholesale,
}

impl PriceSelector {
    /// Category id recorded on the transaction line, if any.
    pub fn category_id(&self) -> Option<i64> {
        match self {
            PriceSelector::Category(id) => Some(*id),
            PriceSelector::Base | PriceSelector::Wholesale => None,
        }
    }
}

/// A quantity-break price row.
pub trait PriceTier {
    fn shop_id(&self) -> Option<&str>;
    fn min_quantity(&self) -> i64;
    fn price(&self) -> Money;
}

impl PriceTier for PriceRule {
    fn shop_id(&self) -> Option<&str> {
        self.shop_id.as_deref()
    }
    fn min_quantity(&self) -> i64 {
        self.min_quantity
    }
    fn price(&self) -> Money {
        self.price
    }
}

impl PriceTier for WholesalePrice {
    fn shop_id(&self) -> Option<&str> {
        self.shop_id.as_deref()
    }
    fn min_quantity(&self) -> i64 {
        self.min_quantity
    }
    fn price(&self) -> Money {
        self.price
    }
}

/// Picks the winning tier for `shop_id` and `quantity`.
///
/// Rows for other shops and rows whose minimum exceeds the quantity never
/// match. Exact ties (same specificity, same minimum) go to the lower price.
pub fn select_tier<'a, T: PriceTier>(
    tiers: impl IntoIterator<Item = &'a T>,
    shop_id: &str,
    quantity: i64,
) -> Option<&'a T>
where
    T: 'a,
{
    tiers
        .into_iter()
        .filter(|t| t.min_quantity() <= quantity)
        .filter(|t| t.shop_id().map_or(true, |s| s == shop_id))
        .max_by_key(|t| rank(*t))
}

fn rank<T: PriceTier>(t: &T) -> (bool, i64, Reverse<Money>) {
    (t.shop_id().is_some(), t.min_quantity(), Reverse(t.price()))
}

/// Resolves the unit price of `product`.
///
/// `rules` and `wholesale` may contain rows of any category or shop; only
/// matching rows are considered. A category without a matching rule, and a
/// quantity below every tier, fall back to the selling price.
pub fn resolve_price(
    product: &Product,
    rules: &[PriceRule],
    wholesale: &[WholesalePrice],
    selector: PriceSelector,
    shop_id: &str,
    quantity: i64,
) -> Money {
    let selected = match selector {
        PriceSelector::Base => None,
        PriceSelector::Category(category) => select_tier(
            rules
                .iter()
                .filter(|r| r.product_id == product.id && r.price_category_id == category),
            shop_id,
            quantity,
        )
        .map(PriceTier::price),
        PriceSelector::Wholesale => select_tier(
            wholesale
                .iter()
                .filter(|w| w.product_id == product.id && w.is_active),
            shop_id,
            quantity,
        )
        .map(PriceTier::price),
    };

    selected.unwrap_or(product.selling_price)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(price: i64) -> Product {
        Product {
            id: "p-1".into(),
            sku: "KOPI-1".into(),
            name: "Kopi".into(),
            selling_price: Money::from_cents(price),
            purchase_price: Money::from_cents(price / 2),
            uses_stock: true,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn rule(id: &str, shop: Option<&str>, category: i64, min: i64, price: i64) -> PriceRule {
        PriceRule {
            id: id.into(),
            product_id: "p-1".into(),
            shop_id: shop.map(str::to_string),
            price_category_id: category,
            min_quantity: min,
            price: Money::from_cents(price),
        }
    }

    fn tie_break_rules() -> Vec<PriceRule> {
        vec![
            rule("r1", None, 1, 1, 100),
            rule("r2", Some("A"), 1, 5, 90),
            rule("r3", Some("A"), 1, 1, 95),
        ]
    }

    #[test]
    fn test_tie_break_shop_then_min_quantity() {
        let p = product(120);
        let rules = tie_break_rules();
        let at = |shop: &str, qty: i64| {
            resolve_price(&p, &rules, &[], PriceSelector::Category(1), shop, qty).cents()
        };

        assert_eq!(at("A", 5), 90);
        assert_eq!(at("A", 3), 95);
        assert_eq!(at("B", 1), 100);
    }

    #[test]
    fn test_shop_specific_beats_higher_global_tier() {
        let p = product(120);
        let rules = vec![rule("g", None, 1, 10, 70), rule("s", Some("A"), 1, 1, 95)];
        let price = resolve_price(&p, &rules, &[], PriceSelector::Category(1), "A", 10);
        assert_eq!(price.cents(), 95);
    }

    #[test]
    fn test_below_every_tier_falls_back_to_base() {
        let p = product(120);
        let rules = vec![rule("r", None, 1, 5, 90)];
        let price = resolve_price(&p, &rules, &[], PriceSelector::Category(1), "A", 4);
        assert_eq!(price.cents(), 120);
    }

    #[test]
    fn test_category_without_rules_falls_back_to_base() {
        let p = product(120);
        let price = resolve_price(&p, &tie_break_rules(), &[], PriceSelector::Category(7), "A", 5);
        assert_eq!(price.cents(), 120);
    }

    #[test]
    fn test_base_selector_ignores_rules() {
        let p = product(120);
        let price = resolve_price(&p, &tie_break_rules(), &[], PriceSelector::Base, "A", 5);
        assert_eq!(price.cents(), 120);
    }

    #[test]
    fn test_wholesale_uses_active_rows_only() {
        let p = product(120);
        let wholesale = vec![
            WholesalePrice {
                id: "w1".into(),
                product_id: "p-1".into(),
                shop_id: None,
                min_quantity: 12,
                price: Money::from_cents(80),
                is_active: true,
            },
            WholesalePrice {
                id: "w2".into(),
                product_id: "p-1".into(),
                shop_id: None,
                min_quantity: 24,
                price: Money::from_cents(60),
                is_active: false,
            },
        ];
        let at = |qty| resolve_price(&p, &[], &wholesale, PriceSelector::Wholesale, "A", qty);
        assert_eq!(at(11).cents(), 120);
        assert_eq!(at(12).cents(), 80);
        assert_eq!(at(30).cents(), 80);
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let p = product(120);
        let rules = tie_break_rules();
        let first = resolve_price(&p, &rules, &[], PriceSelector::Category(1), "A", 7);
        for _ in 0..10 {
            assert_eq!(
                resolve_price(&p, &rules, &[], PriceSelector::Category(1), "A", 7),
                first
            );
        }
    }
}
