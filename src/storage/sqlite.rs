//! SQLite adapter.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::{map_unique, CatalogStore, Result, StoreError, WHATSAPP_SETTING};
use crate::domain::aggregates::{Category, ImportedProduct, NewProduct, ProductRow, SEED_CATEGORIES};

// Prices are cast so a stray text value reads as 0 instead of failing the row.
const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.name, p.description,
           CAST(p.price_cents AS INTEGER) AS price_cents,
           CAST(p.promo_price_cents AS INTEGER) AS promo_price_cents,
           p.is_promo, p.image_url, p.category_id, p.category, c.name AS category_name,
           p.stock, p.is_active
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
"#;

const DISPLAY_ORDER: &str = "COALESCE(NULLIF(c.name, ''), NULLIF(p.category, ''), 'Outros'), p.name";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    const DEFAULT_POOL_SIZE: u32 = 5;

    /// Connect to a SQLite database, e.g. `sqlite:database.sqlite3?mode=rwc`.
    ///
    /// In-memory URLs get a single long-lived connection so every query sees
    /// the same database.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:");
        let pool_size = if in_memory { 1 } else { Self::DEFAULT_POOL_SIZE };
        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(30));
        if in_memory {
            pool_options = pool_options.idle_timeout(None::<Duration>).max_lifetime(None::<Duration>);
        }
        let pool = pool_options.connect_with(options).await?;

        tracing::info!(url, pool_size, "Connected to SQLite");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool { &self.pool }
}

fn product_write_error(product: &NewProduct) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
    move |err| {
        if let (sqlx::Error::Database(db), Some(category_id)) = (&err, product.category_id) {
            if db.is_foreign_key_violation() {
                return StoreError::NotFound { entity: "category", id: category_id };
            }
        }
        StoreError::Sqlx(err)
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn migrate(&self) -> Result<()> {
        tracing::info!("Running SQLite migrations...");
        sqlx::migrate!("./migrations/sqlite").run(&self.pool).await?;
        Ok(())
    }

    async fn seed(&self, default_whatsapp: &str) -> Result<()> {
        sqlx::query("INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO NOTHING")
            .bind(WHATSAPP_SETTING).bind(default_whatsapp).execute(&self.pool).await?;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories").fetch_one(&self.pool).await?;
        if count == 0 {
            for name in SEED_CATEGORIES {
                sqlx::query("INSERT OR IGNORE INTO categories (name, is_active) VALUES (?, 1)")
                    .bind(*name).execute(&self.pool).await?;
            }
            tracing::info!(count = SEED_CATEGORIES.len(), "Seeded base categories");
        }
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, Option<String>>("SELECT value FROM settings WHERE key = ?")
            .bind(key).fetch_optional(&self.pool).await?;
        Ok(value.flatten())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value")
            .bind(key).bind(value).execute(&self.pool).await?;
        Ok(())
    }

    async fn list_categories(&self, active_only: bool) -> Result<Vec<Category>> {
        let sql = if active_only {
            "SELECT id, name, is_active FROM categories WHERE is_active = 1 ORDER BY name"
        } else {
            "SELECT id, name, is_active FROM categories ORDER BY is_active DESC, name"
        };
        Ok(sqlx::query_as::<_, Category>(sql).fetch_all(&self.pool).await?)
    }

    async fn create_category(&self, name: &str, is_active: bool) -> Result<Category> {
        let id = sqlx::query("INSERT INTO categories (name, is_active) VALUES (?, ?)")
            .bind(name).bind(is_active).execute(&self.pool).await
            .map_err(map_unique("category", name))?
            .last_insert_rowid();
        Ok(Category { id, name: name.to_string(), is_active })
    }

    async fn upsert_category(&self, name: &str) -> Result<i64> {
        let name = name.trim();
        let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM categories WHERE name = ?")
            .bind(name).fetch_optional(&self.pool).await?;
        if let Some(id) = existing {
            return Ok(id);
        }
        let created = sqlx::query("INSERT INTO categories (name, is_active) VALUES (?, 1)").bind(name).execute(&self.pool).await?;
        Ok(created.last_insert_rowid())
    }

    async fn toggle_category(&self, id: i64) -> Result<Category> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET is_active = CASE WHEN is_active = 1 THEN 0 ELSE 1 END WHERE id = ? RETURNING id, name, is_active",
        )
        .bind(id).fetch_optional(&self.pool).await?
        .ok_or(StoreError::NotFound { entity: "category", id })
    }

    async fn delete_category(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE products SET category_id = NULL WHERE category_id = ?").bind(id).execute(&mut *tx).await?;
        let deleted = sqlx::query("DELETE FROM categories WHERE id = ?").bind(id).execute(&mut *tx).await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "category", id });
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_products(&self, active_only: bool) -> Result<Vec<ProductRow>> {
        let sql = if active_only {
            format!("{PRODUCT_SELECT} WHERE p.is_active = 1 ORDER BY {DISPLAY_ORDER}")
        } else {
            format!("{PRODUCT_SELECT} ORDER BY p.is_active DESC, {DISPLAY_ORDER}")
        };
        Ok(sqlx::query_as::<_, ProductRow>(&sql).fetch_all(&self.pool).await?)
    }

    async fn get_product(&self, id: i64) -> Result<ProductRow> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = ?");
        sqlx::query_as::<_, ProductRow>(&sql).bind(id).fetch_optional(&self.pool).await?
            .ok_or(StoreError::NotFound { entity: "product", id })
    }

    async fn create_product(&self, p: &NewProduct) -> Result<i64> {
        let created = sqlx::query(
            r#"
            INSERT INTO products
              (name, description, price_cents, image_url, category_id, is_active, is_promo, promo_price_cents, stock)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&p.name).bind(&p.description).bind(p.price_cents).bind(&p.image_url).bind(p.category_id)
        .bind(p.is_active).bind(p.is_promo).bind(p.promo_price_cents).bind(p.stock)
        .execute(&self.pool).await
        .map_err(product_write_error(p))?;
        Ok(created.last_insert_rowid())
    }

    async fn update_product(&self, id: i64, p: &NewProduct) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET name = ?, description = ?, price_cents = ?, image_url = COALESCE(?, image_url),
                category_id = ?, is_active = ?, is_promo = ?, promo_price_cents = ?, stock = ?
            WHERE id = ?
            "#,
        )
        .bind(&p.name).bind(&p.description).bind(p.price_cents).bind(&p.image_url).bind(p.category_id)
        .bind(p.is_active).bind(p.is_promo).bind(p.promo_price_cents).bind(p.stock).bind(id)
        .execute(&self.pool).await
        .map_err(product_write_error(p))?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "product", id });
        }
        Ok(())
    }

    async fn delete_product(&self, id: i64) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM products WHERE id = ?").bind(id).execute(&self.pool).await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "product", id });
        }
        Ok(())
    }

    async fn import_product(&self, p: &ImportedProduct) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products
              (id, name, description, price_cents, image_url, category_id, category, is_active, is_promo, promo_price_cents, stock)
            VALUES (?, ?, '', ?, '', ?, NULL, 1, 0, NULL, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                price_cents = excluded.price_cents,
                category_id = excluded.category_id,
                stock = excluded.stock,
                is_active = 1
            "#,
        )
        .bind(p.id).bind(&p.name).bind(p.price_cents).bind(p.category_id).bind(p.stock)
        .execute(&self.pool).await?;
        Ok(())
    }
}
