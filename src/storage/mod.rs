//! Persistence behind a backend-agnostic repository.
//!
//! [`CatalogStore`] exposes typed operations; [`PgStore`] and [`SqliteStore`]
//! implement it with their own SQL dialect. Callers hold an
//! `Arc<dyn CatalogStore>` from [`connect`] and never branch on the backend.

mod postgres;
mod sqlite;

pub use postgres::PgStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::aggregates::{Category, ImportedProduct, NewProduct, ProductRow};

/// Settings key holding the store contact number.
pub const WHATSAPP_SETTING: &str = "whatsapp_number";

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Unique constraint violated
    #[error("{entity} already exists: {name}")]
    AlreadyExists { entity: &'static str, name: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Apply the embedded schema migrations.
    async fn migrate(&self) -> Result<()>;

    /// Insert the default contact number and base categories when missing.
    async fn seed(&self, default_whatsapp: &str) -> Result<()>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>>;
    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    /// Active only, by name; otherwise active first, then name.
    async fn list_categories(&self, active_only: bool) -> Result<Vec<Category>>;
    async fn create_category(&self, name: &str, is_active: bool) -> Result<Category>;
    /// Get-or-create by name, returning the id.
    async fn upsert_category(&self, name: &str) -> Result<i64>;
    async fn toggle_category(&self, id: i64) -> Result<Category>;
    /// Clears the reference on linked products before deleting.
    async fn delete_category(&self, id: i64) -> Result<()>;

    /// Ordered by display category then name; inactive products last when
    /// `active_only` is false.
    async fn list_products(&self, active_only: bool) -> Result<Vec<ProductRow>>;
    async fn get_product(&self, id: i64) -> Result<ProductRow>;
    async fn create_product(&self, product: &NewProduct) -> Result<i64>;
    /// Full replace of mutable fields; the image only when one is supplied.
    async fn update_product(&self, id: i64, product: &NewProduct) -> Result<()>;
    async fn delete_product(&self, id: i64) -> Result<()>;
    /// Insert or overwrite a product under an explicit id.
    async fn import_product(&self, product: &ImportedProduct) -> Result<()>;
}

/// Connect to the backend named by `url`: `postgres://` or `postgresql://`
/// selects Postgres, anything else is treated as a SQLite URL.
pub async fn connect(url: &str) -> Result<Arc<dyn CatalogStore>> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Ok(Arc::new(PgStore::connect(url).await?))
    } else {
        Ok(Arc::new(SqliteStore::connect(url).await?))
    }
}

/// Store number from settings, falling back to the configured default.
pub async fn store_whatsapp(store: &dyn CatalogStore, default: &str) -> Result<String> {
    Ok(store.get_setting(WHATSAPP_SETTING).await?.filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string()))
}

fn map_unique<'a>(entity: &'static str, name: &'a str) -> impl FnOnce(sqlx::Error) -> StoreError + 'a {
    move |err| {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::AlreadyExists { entity, name: name.to_string() };
            }
        }
        StoreError::Sqlx(err)
    }
}
