//! Shared fixtures for the engine tests.

use kasir_core::{Actor, Money, MovementReference, MovementType, Product, Role, Shop, Visibility};

use crate::engine::StockAdjustment;
use crate::pool::{Database, DbConfig};
use crate::repository::product::NewProduct;

/// Two shops, an owner who sees both and a cashier of shop A.
pub(crate) struct Fixture {
    pub db: Database,
    pub shop_a: Shop,
    pub shop_b: Shop,
    pub owner: Actor,
    pub cashier: Actor,
}

pub(crate) async fn fixture() -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let shop_a = db.shops().insert("Toko Makmur").await.unwrap();
    let shop_b = db.shops().insert("Warung Sejahtera").await.unwrap();
    let owner = Actor::new("u-owner", "Budi", Role::Owner, Visibility::All);
    let cashier = Actor::new(
        "u-cashier",
        "Sari",
        Role::Cashier,
        Visibility::shops([shop_a.id.clone()]),
    );

    Fixture {
        db,
        shop_a,
        shop_b,
        owner,
        cashier,
    }
}

pub(crate) async fn product(db: &Database, sku: &str, price_cents: i64, uses_stock: bool) -> Product {
    db.products()
        .insert(NewProduct {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            selling_price: Money::from_cents(price_cents),
            purchase_price: Money::from_cents(price_cents / 2),
            uses_stock,
        })
        .await
        .unwrap()
}

/// Puts `quantity` units on the shelf through the ledger.
pub(crate) async fn stock_up(db: &Database, product_id: &str, shop_id: &str, quantity: i64) {
    db.ledger()
        .adjust(StockAdjustment {
            product_id: product_id.to_string(),
            shop_id: shop_id.to_string(),
            quantity,
            movement_type: MovementType::Purchase,
            reference: MovementReference::ManualAdjustment,
            user_id: "u-owner".to_string(),
            notes: Some("opening stock".to_string()),
        })
        .await
        .unwrap();
}
