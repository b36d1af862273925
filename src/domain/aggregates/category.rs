//! Category Aggregate

use serde::{Deserialize, Serialize};

use crate::StorefrontError;

/// Base categories created on first boot.
pub const SEED_CATEGORIES: &[&str] = &["Cervejas", "Refrigerantes", "Águas", "Outros"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CategoryForm {
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl CategoryForm {
    /// Returns the trimmed name and active flag.
    pub fn validate(&self) -> Result<(String, bool), StorefrontError> {
        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() { return Err(StorefrontError::MissingName); }
        Ok((name.to_string(), self.is_active))
    }
}
