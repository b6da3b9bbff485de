//! # Seed Data Generator
//!
//! Populates a development database with shops, a priced catalog and
//! opening stock.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database (kasir.toml / KASIR_DATABASE_PATH)
//! cargo run -p kasir-db --bin seed
//!
//! # Seed a specific file with a larger opening stock
//! cargo run -p kasir-db --bin seed -- --db ./kasir_dev.db --stock 250
//! ```
//!
//! ## Generated Data
//! - Two shops
//! - One product per catalog entry and size, SKU `{CATEGORY}-{SHORT}-{NNN}`
//! - A member price (category 2) and one wholesale break per product
//! - Opening stock in every shop, written through the stock ledger so the
//!   movement history replays to the seeded levels
//!
//! Set `RUST_LOG` to tune output (default `info,kasir=debug,sqlx=warn`).

use std::env;
use std::path::PathBuf;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kasir_core::{Money, MovementReference, MovementType};
use kasir_db::{Database, EngineConfig, NewPriceRule, NewProduct, NewWholesalePrice, StockAdjustment};

/// Catalog entries per category.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "MNM",
        &["Teh Botol", "Air Mineral", "Kopi Susu", "Susu UHT", "Jus Jeruk"],
    ),
    (
        "SNK",
        &["Keripik Singkong", "Kacang Atom", "Wafer Coklat", "Biskuit Kelapa"],
    ),
    (
        "SMB",
        &["Beras Pandan", "Minyak Goreng", "Gula Pasir", "Tepung Terigu", "Garam Halus"],
    ),
    (
        "RTG",
        &["Sabun Mandi", "Sampo Sachet", "Pasta Gigi", "Deterjen Bubuk"],
    ),
];

/// Size label and price addon in cents.
const SIZES: &[(&str, i64)] = &[("Kecil", 0), ("Sedang", 150_000), ("Besar", 400_000)];

const SHOPS: &[&str] = &["Toko Makmur", "Warung Sejahtera"];

const SEED_USER: &str = "seed";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,kasir=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut opening_stock: i64 = 100;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if let Some(value) = args.get(i + 1) {
                    db_path = Some(PathBuf::from(value));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if let Some(value) = args.get(i + 1) {
                    config_path = Some(PathBuf::from(value));
                    i += 1;
                }
            }
            "--stock" | "-s" => {
                if let Some(value) = args.get(i + 1) {
                    opening_stock = value.parse().unwrap_or(100);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kasir Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (default: from config)");
                println!("  -c, --config <PATH>   Config file (default: platform config dir)");
                println!("  -s, --stock <N>       Opening stock per product and shop (default: 100)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let config = EngineConfig::load(config_path)?;
    let mut db_config = config.db_config();
    if let Some(path) = db_path {
        db_config.database_path = path;
    }

    info!(path = %db_config.database_path.display(), "Seeding database");
    let db = Database::new(db_config).await?.with_policy(config.policy());

    if !db.shops().list().await?.is_empty() {
        warn!("Database already has shops, skipping seed to avoid duplicates");
        return Ok(());
    }

    let start = std::time::Instant::now();

    let mut shops = Vec::with_capacity(SHOPS.len());
    for name in SHOPS {
        shops.push(db.shops().insert(name).await?);
    }

    let ledger = db.ledger();
    let mut generated = 0usize;
    for (category_idx, (category, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, addon)) in SIZES.iter().enumerate() {
                let seed = category_idx * 100 + name_idx * 10 + size_idx;
                let new = catalog_entry(category, name, size, *addon, seed);
                let selling = new.selling_price;

                let product = match db.products().insert(new).await {
                    Ok(product) => product,
                    Err(e) => {
                        warn!(error = %e, "Failed to insert product");
                        continue;
                    }
                };

                db.products()
                    .add_price_rule(NewPriceRule {
                        product_id: product.id.clone(),
                        shop_id: None,
                        price_category_id: 2,
                        min_quantity: 1,
                        price: percent_of(selling, 95),
                    })
                    .await?;
                db.products()
                    .add_wholesale_price(NewWholesalePrice {
                        product_id: product.id.clone(),
                        shop_id: None,
                        min_quantity: 12,
                        price: percent_of(selling, 90),
                    })
                    .await?;

                for shop in &shops {
                    ledger
                        .adjust(StockAdjustment {
                            product_id: product.id.clone(),
                            shop_id: shop.id.clone(),
                            quantity: opening_stock,
                            movement_type: MovementType::Adjustment,
                            reference: MovementReference::ManualAdjustment,
                            user_id: SEED_USER.to_string(),
                            notes: Some("Opening stock".to_string()),
                        })
                        .await?;
                }
                generated += 1;
            }
        }
    }

    let elapsed = start.elapsed();
    info!(
        shops = shops.len(),
        products = generated,
        opening_stock,
        ?elapsed,
        "Seed complete"
    );

    Ok(())
}

/// Builds one catalog product with deterministic prices.
fn catalog_entry(category: &str, name: &str, size: &str, addon: i64, seed: usize) -> NewProduct {
    let short: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{}-{}-{:03}", category, short, seed);

    // 3.000 - 12.950 rupiah before the size addon
    let base = 300_000 + ((seed as i64 * 17_000) % 1_000_000);
    let selling = base + addon;
    let cost_pct = 60 + (seed as i64 % 20);

    NewProduct {
        sku,
        name: format!("{} {}", name, size),
        selling_price: Money::from_cents(selling),
        purchase_price: Money::from_cents(selling * cost_pct / 100),
        uses_stock: true,
    }
}

fn percent_of(amount: Money, percent: i64) -> Money {
    Money::from_cents(amount.cents() * percent / 100)
}
