//! Postgres adapter.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{map_unique, CatalogStore, Result, StoreError, WHATSAPP_SETTING};
use crate::domain::aggregates::{Category, ImportedProduct, NewProduct, ProductRow, SEED_CATEGORIES};

const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.name, p.description, p.price_cents, p.promo_price_cents, p.is_promo,
           p.image_url, p.category_id, p.category, c.name AS category_name, p.stock, p.is_active
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
"#;

const DISPLAY_ORDER: &str = "COALESCE(NULLIF(c.name, ''), NULLIF(p.category, ''), 'Outros'), p.name";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    const DEFAULT_POOL_SIZE: u32 = 10;

    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(Self::DEFAULT_POOL_SIZE).connect(url).await?;
        tracing::info!(pool_size = Self::DEFAULT_POOL_SIZE, "Connected to Postgres");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool { &self.pool }
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
impl CatalogStore for PgStore {
    async fn migrate(&self) -> Result<()> {
        tracing::info!("Running Postgres migrations...");
        sqlx::migrate!("./migrations/postgres").run(&self.pool).await?;
        Ok(())
    }

    async fn seed(&self, default_whatsapp: &str) -> Result<()> {
        sqlx::query("INSERT INTO settings (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING")
            .bind(WHATSAPP_SETTING).bind(default_whatsapp).execute(&self.pool).await?;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories").fetch_one(&self.pool).await?;
        if count == 0 {
            for name in SEED_CATEGORIES {
                sqlx::query("INSERT INTO categories (name, is_active) VALUES ($1, TRUE) ON CONFLICT (name) DO NOTHING")
                    .bind(*name).execute(&self.pool).await?;
            }
            tracing::info!(count = SEED_CATEGORIES.len(), "Seeded base categories");
        }
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, Option<String>>("SELECT value FROM settings WHERE key = $1")
            .bind(key).fetch_optional(&self.pool).await?;
        Ok(value.flatten())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT INTO settings (key, value) VALUES ($1, $2) ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value")
            .bind(key).bind(value).execute(&self.pool).await?;
        Ok(())
    }

    async fn list_categories(&self, active_only: bool) -> Result<Vec<Category>> {
        let sql = if active_only {
            "SELECT id, name, is_active FROM categories WHERE is_active ORDER BY name"
        } else {
            "SELECT id, name, is_active FROM categories ORDER BY is_active DESC, name"
        };
        Ok(sqlx::query_as::<_, Category>(sql).fetch_all(&self.pool).await?)
    }

    async fn create_category(&self, name: &str, is_active: bool) -> Result<Category> {
        sqlx::query_as::<_, Category>("INSERT INTO categories (name, is_active) VALUES ($1, $2) RETURNING id, name, is_active")
            .bind(name).bind(is_active).fetch_one(&self.pool).await
            .map_err(map_unique("category", name))
    }

    async fn upsert_category(&self, name: &str) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO categories (name, is_active) VALUES ($1, TRUE) ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id",
        )
        .bind(name.trim()).fetch_one(&self.pool).await?;
        Ok(id)
    }

    async fn toggle_category(&self, id: i64) -> Result<Category> {
        sqlx::query_as::<_, Category>("UPDATE categories SET is_active = NOT is_active WHERE id = $1 RETURNING id, name, is_active")
            .bind(id).fetch_optional(&self.pool).await?
            .ok_or(StoreError::NotFound { entity: "category", id })
    }

    async fn delete_category(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE products SET category_id = NULL WHERE category_id = $1").bind(id).execute(&mut *tx).await?;
        let deleted = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&mut *tx).await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "category", id });
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_products(&self, active_only: bool) -> Result<Vec<ProductRow>> {
        let sql = if active_only {
            format!("{PRODUCT_SELECT} WHERE p.is_active ORDER BY {DISPLAY_ORDER}")
        } else {
            format!("{PRODUCT_SELECT} ORDER BY p.is_active DESC, {DISPLAY_ORDER}")
        };
        Ok(sqlx::query_as::<_, ProductRow>(&sql).fetch_all(&self.pool).await?)
    }

    async fn get_product(&self, id: i64) -> Result<ProductRow> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = $1");
        sqlx::query_as::<_, ProductRow>(&sql).bind(id).fetch_optional(&self.pool).await?
            .ok_or(StoreError::NotFound { entity: "product", id })
    }

    async fn create_product(&self, p: &NewProduct) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO products
              (name, description, price_cents, image_url, category_id, is_active, is_promo, promo_price_cents, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(&p.name).bind(&p.description).bind(p.price_cents).bind(&p.image_url).bind(p.category_id)
        .bind(p.is_active).bind(p.is_promo).bind(p.promo_price_cents).bind(p.stock)
        .fetch_one(&self.pool).await
        .map_err(product_write_error(p))
    }

    async fn update_product(&self, id: i64, p: &NewProduct) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET name = $1, description = $2, price_cents = $3, image_url = COALESCE($4, image_url),
                category_id = $5, is_active = $6, is_promo = $7, promo_price_cents = $8, stock = $9
            WHERE id = $10
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
        let deleted = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&self.pool).await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "product", id });
        }
        Ok(())
    }

    async fn import_product(&self, p: &ImportedProduct) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO products
              (id, name, description, price_cents, image_url, category_id, category, is_active, is_promo, promo_price_cents, stock)
            VALUES ($1, $2, '', $3, '', $4, NULL, TRUE, FALSE, NULL, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                category_id = EXCLUDED.category_id,
                stock = EXCLUDED.stock,
                is_active = TRUE
            "#,
        )
        .bind(p.id).bind(&p.name).bind(p.price_cents).bind(p.category_id).bind(p.stock)
        .execute(&mut *tx).await?;
        // Explicit ids bypass the sequence; move it past them.
        sqlx::query("SELECT setval(pg_get_serial_sequence('products', 'id'), (SELECT COALESCE(MAX(id), 1) FROM products))")
            .execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
