//! Product Aggregate

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{format_money, parse_money};
use crate::StorefrontError;

/// Catch-all bucket for products without a category.
pub const DEFAULT_CATEGORY: &str = "Outros";

/// Product as stored, joined with its category name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub promo_price_cents: Option<i64>,
    pub is_promo: bool,
    pub image_url: Option<String>,
    pub category_id: Option<i64>,
    /// Legacy free-text label, used when no category row is linked.
    pub category: Option<String>,
    pub category_name: Option<String>,
    pub stock: Option<i64>,
    pub is_active: bool,
}

/// Render-ready product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub price: String,
    pub promo_price_cents: Option<i64>,
    pub promo_price: Option<String>,
    pub is_promo: bool,
    pub effective_price_cents: i64,
    pub effective_price: String,
    pub image_url: String,
    pub category: String,
    pub category_id: Option<i64>,
    pub stock: Option<i64>,
    pub is_active: bool,
}

/// Display category: linked category, then free text, then [`DEFAULT_CATEGORY`].
pub fn resolve_category(structured: Option<&str>, free_text: Option<&str>) -> String {
    [structured, free_text]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string()
}

/// Returns `(effective_cents, promo_is_active)`.
///
/// A promotion only applies when enabled with a positive price; anything else
/// falls back to the base price so a zero price never reaches customers.
pub fn resolve_effective_price(base_cents: i64, promo_enabled: bool, promo_cents: Option<i64>) -> (i64, bool) {
    match promo_cents {
        Some(promo) if promo_enabled && promo > 0 => (promo, true),
        _ => (base_cents, false),
    }
}

/// Never fails: missing or negative amounts are coerced to zero.
pub fn build_view(row: &ProductRow) -> ProductView {
    let base = row.price_cents.unwrap_or(0).max(0);
    let promo = row.promo_price_cents.filter(|p| *p > 0);
    let (effective, is_promo) = resolve_effective_price(base, row.is_promo, promo);
    ProductView {
        id: row.id,
        name: row.name.clone(),
        description: row.description.clone().unwrap_or_default(),
        price_cents: base,
        price: format_money(base),
        promo_price_cents: promo,
        promo_price: promo.map(format_money),
        is_promo,
        effective_price_cents: effective,
        effective_price: format_money(effective),
        image_url: row.image_url.clone().unwrap_or_default(),
        category: resolve_category(row.category_name.as_deref(), row.category.as_deref()),
        category_id: row.category_id,
        stock: row.stock,
        is_active: row.is_active,
    }
}

/// Raw admin submission for creating or editing a product.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProductForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub is_active: Option<String>,
    pub is_promo: Option<String>,
    pub promo_price: Option<String>,
    pub category_id: Option<String>,
    pub stock: Option<String>,
}

/// Validated product fields ready for persistence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub is_active: bool,
    pub is_promo: bool,
    pub promo_price_cents: Option<i64>,
    pub category_id: Option<i64>,
    pub stock: Option<i64>,
    /// Replaces the stored image only when set.
    pub image_url: Option<String>,
}

/// Product row written by the bulk importer, keyed by an explicit id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedProduct {
    pub id: i64,
    pub name: String,
    pub price_cents: i64,
    pub category_id: i64,
    pub stock: Option<i64>,
}

/// HTML checkbox semantics.
pub fn is_checked(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("on" | "true" | "1"))
}

fn trimmed(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or_default()
}

impl ProductForm {
    pub fn validate(&self) -> Result<NewProduct, StorefrontError> {
        let name = trimmed(&self.name);
        if name.is_empty() { return Err(StorefrontError::MissingName); }

        let price = trimmed(&self.price);
        let price_cents = parse_money(if price.is_empty() { "0" } else { price })?;

        let mut is_promo = is_checked(self.is_promo.as_deref());
        let promo_raw = trimmed(&self.promo_price);
        let promo_price_cents = match (is_promo, promo_raw.is_empty()) {
            (true, false) => Some(parse_money(promo_raw)?),
            (true, true) => { is_promo = false; None }
            (false, _) => None,
        };

        Ok(NewProduct {
            name: name.to_string(),
            description: trimmed(&self.description).to_string(),
            price_cents,
            is_active: is_checked(self.is_active.as_deref()),
            is_promo,
            promo_price_cents,
            category_id: trimmed(&self.category_id).parse().ok(),
            stock: trimmed(&self.stock).parse::<i64>().ok().filter(|s| *s >= 0),
            image_url: None,
        })
    }
}
