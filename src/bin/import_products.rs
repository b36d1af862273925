//! Bulk product import.
//!
//! Reads a JSON array of `{id, name, category, price, stock?}` and upserts each
//! product by id, creating missing categories by name.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::config::{normalize_whatsapp, sqlite_url};
use storefront::domain::aggregates::ImportedProduct;
use storefront::{parse_money, storage};

#[derive(Debug, Parser)]
#[command(name = "import_products")]
#[command(about = "Upsert products from a JSON file into the storefront database")]
struct Args {
    /// JSON file with the product list
    #[arg(long)]
    file: PathBuf,

    /// Database URL; defaults to the local SQLite file
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// SQLite file used when no database URL is given
    #[arg(long, env = "DB_PATH", default_value = "database.sqlite3")]
    db_path: String,

    /// Seed contact number written if the database is new
    #[arg(long, env = "STORE_WHATSAPP_NUMBER", default_value = storefront::Config::DEFAULT_WHATSAPP)]
    store_whatsapp: String,
}

#[derive(Debug, Deserialize)]
struct ImportRecord {
    id: i64,
    name: String,
    category: String,
    /// Number (`7.99`) or text (`"7,99"`).
    price: serde_json::Value,
    #[serde(default)]
    stock: Option<i64>,
}

fn price_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let args = Args::parse();
    let raw = std::fs::read_to_string(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let records: Vec<ImportRecord> = serde_json::from_str(&raw).context("parsing product list")?;

    let url = match args.database_url.filter(|u| !u.trim().is_empty()) {
        Some(url) => url,
        None => sqlite_url(&args.db_path),
    };
    let store = storage::connect(&url).await?;
    store.migrate().await?;
    store.seed(&normalize_whatsapp(&args.store_whatsapp)?).await?;

    for record in &records {
        let name = record.name.trim();
        let category = record.category.trim();
        if name.is_empty() || category.is_empty() {
            bail!("product {} is missing a name or category", record.id);
        }
        let price = price_text(&record.price).with_context(|| format!("product {} has no price", record.id))?;
        let price_cents = parse_money(&price).with_context(|| format!("product {}", record.id))?;

        let category_id = store.upsert_category(category).await?;
        store
            .import_product(&ImportedProduct {
                id: record.id,
                name: name.to_string(),
                price_cents,
                category_id,
                stock: record.stock.filter(|s| *s >= 0),
            })
            .await?;
    }

    info!(count = records.len(), "Imported products");
    Ok(())
}
