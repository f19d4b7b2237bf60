//! # Seed Data Generator
//!
//! Populates the database with a demo catalog and debtors for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p ombor-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p ombor-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p ombor-db --bin seed -- --db ./data/ombor.db
//! ```
//!
//! ## Generated Data
//! - One category per entry in [`CATALOG`]
//! - Products cycling through each category's names and pack sizes, with
//!   barcode `478{seed:010}`, price from 2 000 plus a size addon, cost 60-80% of price
//! - A handful of debtors, some with an opening balance

use std::env;

use ombor_core::{Money, NewCategory, NewDebtor, NewProduct};
use ombor_db::{Database, DbConfig};

/// Categories with their color and product names.
const CATALOG: &[(&str, &str, &[&str])] = &[
    (
        "Ichimliklar",
        "#3B82F6",
        &[
            "Coca-Cola",
            "Pepsi",
            "Fanta",
            "Sprite",
            "Nestle suv",
            "Hydrolife suv",
            "Olma sharbati",
            "Apelsin sharbati",
            "Ko'k choy",
            "Qora choy",
        ],
    ),
    (
        "Shirinliklar",
        "#F59E0B",
        &[
            "Snickers",
            "Twix",
            "KitKat",
            "Alpen Gold",
            "Chokopie",
            "Pechenye",
            "Vafli",
            "Marmelad",
        ],
    ),
    (
        "Sut mahsulotlari",
        "#10B981",
        &[
            "Sut",
            "Qatiq",
            "Tvorog",
            "Smetana",
            "Sariyog'",
            "Pishloq",
            "Kefir",
            "Yogurt",
        ],
    ),
    (
        "Oziq-ovqat",
        "#EF4444",
        &[
            "Guruch",
            "Un",
            "Shakar",
            "Tuz",
            "Makaron",
            "Grechka",
            "Yog'",
            "No'xat",
            "Mosh",
            "Tuxum",
        ],
    ),
];

/// Pack sizes with a price addon in minor units.
const SIZES: &[(&str, i64)] = &[
    ("0.5 L", 0),
    ("1 L", 3_000),
    ("1.5 L", 5_000),
    ("2 L", 7_000),
    ("kichik", 0),
    ("katta", 4_000),
];

const DEBTORS: &[(&str, i64)] = &[
    ("Aziz Karimov", 0),
    ("Dilnoza Rahimova", 150_000),
    ("Jasur Toshmatov", 0),
    ("Malika Yusupova", 42_500),
    ("Sardor Aliyev", 0),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./data/ombor.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Ombor Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./data/ombor.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Ombor Seed Data Generator");
    println!("===========================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Categories
    let mut category_ids = Vec::with_capacity(CATALOG.len());
    for (name, color, _) in CATALOG {
        let category = db
            .categories()
            .create(&NewCategory {
                name: name.to_string(),
                color: Some(color.to_string()),
                ..Default::default()
            })
            .await?;
        category_ids.push(category.id);
    }
    println!("✓ Created {} categories", category_ids.len());

    // Products
    println!();
    println!("Generating products...");

    let start = std::time::Instant::now();
    let mut generated = 0;
    let mut seed = 0;

    'outer: for (size_name, price_addon) in SIZES {
        for ((_, _, names), category_id) in CATALOG.iter().zip(&category_ids) {
            for name in names.iter() {
                if generated >= count {
                    break 'outer;
                }
                seed += 1;

                let product = generate_product(category_id, name, size_name, *price_addon, seed);
                if let Err(e) = db.products().create(&product).await {
                    eprintln!("Failed to insert {}: {}", product.name, e);
                    continue;
                }

                generated += 1;
                if generated % 50 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    // Debtors
    for (idx, (name, opening)) in DEBTORS.iter().enumerate() {
        db.debtors()
            .create(&NewDebtor {
                name: name.to_string(),
                phone: format!("+998 90 {:03} {:04}", 100 + idx, 1000 + idx * 37),
                debt_amount: Some(Money::from_minor(*opening)),
                ..Default::default()
            })
            .await?;
    }
    println!("✓ Created {} debtors", DEBTORS.len());

    let stats = db.products().stats().await?;
    println!();
    println!("  Stock value: {}", stats.total_value);
    println!("  Low stock:   {}", stats.low_stock_products);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds one product from deterministic seed data.
fn generate_product(
    category_id: &str,
    name: &str,
    size: &str,
    price_addon: i64,
    seed: usize,
) -> NewProduct {
    // 2 000 - 34 900 + size addon
    let price = 2_000 + ((seed * 1_700) % 33_000) as i64 + price_addon;

    // 60-80% of price
    let cost = price * (60 + (seed % 20) as i64) / 100;

    NewProduct {
        name: format!("{} {}", name, size),
        barcode: Some(format!("478{:010}", seed)),
        category: category_id.to_string(),
        price: Some(Money::from_minor(price)),
        cost: Some(Money::from_minor(cost)),
        // 0 - 60, so some land under the low-stock threshold
        quantity: Some((seed * 7 % 61) as i64),
        unit: None,
        description: None,
        min_stock: None,
    }
}
