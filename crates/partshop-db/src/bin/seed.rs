//! # Seed Data Generator
//!
//! Populates a store with demo electronics inventory for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 items (default)
//! cargo run -p partshop-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p partshop-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p partshop-db --bin seed -- --db ./data/partshop.db
//! ```
//!
//! ## Generated Data
//! - One category per part family (Resistors, Capacitors, ...)
//! - Items named `{value}` or `{value} {package}` with stock 0 - 100
//! - A handful of shopping list entries, some pointing at Uncategorized

use std::env;

use partshop_core::NewItem;
use partshop_db::{Database, DbConfig};

/// Part families and the values generated for each.
const FAMILIES: &[(&str, &[&str])] = &[
    (
        "Resistors",
        &["10R", "100R", "220R", "330R", "1k", "2k2", "4k7", "10k", "47k", "100k", "1M"],
    ),
    (
        "Capacitors",
        &["10pF", "22pF", "100pF", "1nF", "10nF", "100nF", "1uF", "10uF", "100uF", "470uF"],
    ),
    (
        "Diodes",
        &["1N4148", "1N4007", "1N5819", "BAT54", "Zener 3V3", "Zener 5V1"],
    ),
    (
        "Transistors",
        &["2N2222", "2N3904", "2N3906", "BC547", "BC557", "IRLZ44N", "AO3400"],
    ),
    (
        "ICs",
        &["NE555", "LM358", "LM7805", "AMS1117-3.3", "ATmega328P", "ESP32-WROOM", "CH340G"],
    ),
    ("LEDs", &["Red 3mm", "Green 3mm", "Red 5mm", "Blue 5mm", "WS2812B"]),
];

/// Package variants appended to item names after the plain value.
const PACKAGES: &[&str] = &["", "0603", "0805", "THT"];

/// Shopping list entries: (category, name, quantity).
const SHOPPING: &[(Option<&str>, &str, i64)] = &[
    (Some("Resistors"), "10k", 50),
    (Some("ICs"), "NE555", 5),
    (None, "Solder wire", 1),
    (None, "Flux pen", 2),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./partshop_dev.db");

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
                println!("PartShop Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of items to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./partshop_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("PartShop Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Items:    {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, schema up to date");

    let existing = db.items().count().await?;
    if existing > 0 {
        println!("⚠ Store already has {} items", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Run `partshop wipe --confirm` or delete the file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0;

    'outer: for package in PACKAGES {
        for (family_idx, (family, values)) in FAMILIES.iter().enumerate() {
            let category = match db.categories().find_by_name(family).await? {
                Some(category) => category,
                None => db.categories().create(family, None).await?,
            };

            for (value_idx, value) in values.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let name = if package.is_empty() {
                    value.to_string()
                } else {
                    format!("{value} {package}")
                };
                let quantity = ((family_idx * 37 + value_idx * 13 + generated) % 101) as i64;

                if let Err(e) = db
                    .items()
                    .create(NewItem::new(category.id, &name).quantity(quantity))
                    .await
                {
                    eprintln!("Failed to insert {}: {}", name, e);
                    continue;
                }
                generated += 1;
            }
        }
    }

    for (family, name, quantity) in SHOPPING {
        let category_id = match family {
            Some(family) => db.categories().find_by_name(family).await?.map(|c| c.id),
            None => None,
        };
        db.shopping_list().create(category_id, name, *quantity).await?;
    }

    let elapsed = start.elapsed();
    println!("✓ Generated {} items in {:?}", generated, elapsed);
    println!("✓ Added {} shopping list entries", SHOPPING.len());

    let hits = db.items().search("555", None).await?;
    println!("  Search '555': {} results", hits.len());

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
