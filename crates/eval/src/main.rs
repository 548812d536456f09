//! Evaluation CLI for exercising the catalog engine against seeded data.
//!
//! Usage:
//!     ckeval matrix
//!     ckeval versus "Phone A" "Rival X"
//!     ckeval recommend "Phone A" "Phone B"
//!     ckeval history "Phone A" RAM

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comparekit_catalog::{
    Catalog, FeatureSeed, IdentityResolver, OfferDraft, ProductDraft, TokenTable,
};
use comparekit_compare::{cross_owner_comparison, owner_comparison};
use comparekit_model::{Comparison, ProductId, WorkspaceId};
use comparekit_recommend::recommend;
use comparekit_store::{CatalogStore, MemoryStore};

#[derive(Parser)]
#[command(name = "ckeval")]
#[command(about = "Exercise the comparekit engine on a seeded demo catalog")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Comparison matrix for the primary demo workspace
    Matrix,

    /// Cross-owner comparison of two products by name
    Versus {
        /// First product name
        left: String,
        /// Second product name
        right: String,
    },

    /// Buy recommendation between two primary-workspace products
    Recommend {
        /// First product name
        left: String,
        /// Second product name
        right: String,
    },

    /// Version-chain history of one (product, feature) pair
    History {
        /// Product name
        product: String,
        /// Feature name
        feature: String,
    },
}

/// Demo workspaces: the primary one holds two phones with full chains and
/// offers; the rival one exists to exercise the cross-owner path.
const PRIMARY: WorkspaceId = WorkspaceId(1);
const RIVAL: WorkspaceId = WorkspaceId(2);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("comparekit=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let catalog = Catalog::new(MemoryStore::new());
    seed(&catalog)?;
    tracing::debug!("demo catalog seeded");

    // Owner identity goes through the token capability, as it would behind
    // the HTTP layer.
    let tokens = TokenTable::new();
    tokens.insert("demo-token", PRIMARY);
    let owner = tokens.resolve_owner("demo-token")?;

    match cli.command {
        Commands::Matrix => {
            let matrix = owner_comparison(catalog.store(), owner)?;
            print_matrix(&matrix, &cli.format)?;
        }
        Commands::Versus { left, right } => {
            let left = product_by_name(&catalog, &left)?;
            let right = product_by_name(&catalog, &right)?;
            let matrix = cross_owner_comparison(catalog.store(), left, right)?;
            print_matrix(&matrix, &cli.format)?;
        }
        Commands::Recommend { left, right } => {
            let left = product_by_name(&catalog, &left)?;
            let right = product_by_name(&catalog, &right)?;
            let result = recommend(&catalog, owner, left, right)?;
            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                let name = catalog
                    .store()
                    .product(result.winner)?
                    .map(|p| p.name)
                    .unwrap_or_default();
                println!("Winner: {} ({})", name, result.winner.0);
                println!("Reason: {}", result.reason);
            }
        }
        Commands::History { product, feature } => {
            let product = product_by_name(&catalog, &product)?;
            let feature = feature_by_name(&catalog, &feature)?;
            let history = catalog.value_history(owner, product, feature)?;
            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                for entry in &history {
                    println!(
                        "v{:<3} {:<20} changed={:<5} trend={:?} at {}",
                        entry.version, entry.value, entry.changed, entry.trend, entry.updated_at
                    );
                }
                println!("---");
                println!("{} entries", history.len());
            }
        }
    }

    Ok(())
}

fn seed(catalog: &Catalog<MemoryStore>) -> Result<()> {
    catalog.ensure_default_features(PRIMARY)?;

    let phone_a = catalog.add_product(
        PRIMARY,
        &ProductDraft {
            name: "Phone A".to_string(),
            category: Some("Phones".to_string()),
            list_price: Some(799.0),
            buy_link: Some("https://shop.example/phone-a".to_string()),
            features: vec![
                seed_feature("RAM", "8 GB"),
                seed_feature("Battery", "4000 mAh"),
                seed_feature("Display", "6.1 inch OLED"),
            ],
            ..Default::default()
        },
    )?;
    let phone_b = catalog.add_product(
        PRIMARY,
        &ProductDraft {
            name: "Phone B".to_string(),
            category: Some("Phones".to_string()),
            list_price: Some(699.0),
            features: vec![
                seed_feature("RAM", "12 GB"),
                seed_feature("Battery", "5000 mAh"),
                seed_feature("Display", "6.5 inch LCD"),
            ],
            ..Default::default()
        },
    )?;

    // A second RAM generation on Phone A so history and trends show up.
    let ram = catalog
        .find_or_create_feature(PRIMARY, "RAM")
        .context("seeding RAM feature")?;
    catalog.update_feature_value(PRIMARY, phone_a.id, ram.id, "12 GB")?;

    catalog.add_store_offer(
        PRIMARY,
        phone_a.id,
        &OfferDraft {
            store_name: "Amazon".to_string(),
            price: Some(749.0),
            buy_link: "https://amazon.example/phone-a".to_string(),
        },
    )?;
    catalog.add_store_offer(
        PRIMARY,
        phone_a.id,
        &OfferDraft {
            store_name: "BestBuy".to_string(),
            price: Some(729.0),
            buy_link: "https://bestbuy.example/phone-a".to_string(),
        },
    )?;
    catalog.add_store_offer(
        PRIMARY,
        phone_b.id,
        &OfferDraft {
            store_name: "Amazon".to_string(),
            price: Some(679.0),
            buy_link: "https://amazon.example/phone-b".to_string(),
        },
    )?;

    // The rival workspace shares some feature names (different casing) and
    // adds one of its own.
    catalog.add_product(
        RIVAL,
        &ProductDraft {
            name: "Rival X".to_string(),
            category: Some("Phones".to_string()),
            features: vec![
                seed_feature("ram", "16 GB"),
                seed_feature("Camera", "48 MP"),
            ],
            ..Default::default()
        },
    )?;

    Ok(())
}

fn seed_feature(name: &str, value: &str) -> FeatureSeed {
    FeatureSeed {
        name: name.to_string(),
        value: value.to_string(),
        price: String::new(),
    }
}

fn product_by_name(catalog: &Catalog<MemoryStore>, name: &str) -> Result<ProductId> {
    for product in catalog.public_products()? {
        if product.name.eq_ignore_ascii_case(name) {
            return Ok(product.id);
        }
    }
    bail!("no demo product named '{name}'");
}

fn feature_by_name(
    catalog: &Catalog<MemoryStore>,
    name: &str,
) -> Result<comparekit_model::FeatureId> {
    catalog
        .store()
        .feature_by_name(PRIMARY, name)?
        .map(|feature| feature.id)
        .with_context(|| format!("no demo feature named '{name}'"))
}

fn print_matrix(matrix: &Comparison, format: &str) -> Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(matrix)?);
        return Ok(());
    }

    let header: Vec<&str> = matrix
        .products
        .iter()
        .map(|product| product.name.as_str())
        .collect();
    println!("{:<20} {}", "feature", header.join(" | "));
    println!("---");

    for row in &matrix.rows {
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|cell| {
                let marker = if cell.changed {
                    format!(" ({:?})", cell.trend)
                } else {
                    String::new()
                };
                format!("{}{}", cell.value, marker)
            })
            .collect();
        println!("{:<20} {}", row.name, cells.join(" | "));
    }

    println!("---");
    println!(
        "{} features x {} products",
        matrix.features.len(),
        matrix.products.len()
    );
    Ok(())
}
