//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::domain::value_objects::WhatsappNumber;

/// Storefront configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// Postgres or SQLite connection URL.
    pub database_url: String,
    /// Store name shown in order messages.
    pub store_name: String,
    /// Contact number seeded on first boot.
    pub default_whatsapp: String,
    pub admin_user: String,
    pub admin_password: String,
    /// Directory holding normalized product images.
    pub upload_dir: PathBuf,
    /// Maximum request body size for admin uploads.
    pub max_upload_bytes: usize,
    /// Edge length of product thumbnails in pixels.
    pub thumbnail_size: u32,
}

impl Config {
    pub const DEFAULT_STORE_NAME: &'static str = "Distribuidora de Bebidas Nova Cidade";
    pub const DEFAULT_WHATSAPP: &'static str = "5531999999999";

    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `PORT` | HTTP port on `0.0.0.0` | `8083` |
    /// | `DATABASE_URL` | Postgres URL; selects Postgres when set | (unset) |
    /// | `DB_PATH` | SQLite file used otherwise | `database.sqlite3` |
    /// | `STORE_NAME` | Store name | `Distribuidora de Bebidas Nova Cidade` |
    /// | `STORE_WHATSAPP_NUMBER` | Seed contact number | `5531999999999` |
    /// | `ADMIN_USER` | Admin login | `admin` |
    /// | `ADMIN_PASSWORD` | Admin password | `NovaCidade@2026` |
    /// | `UPLOAD_FOLDER` | Image directory | `static/uploads` |
    /// | `MAX_UPLOAD_BYTES` | Upload body limit | `12582912` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8083".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = match env::var("DATABASE_URL").map(|v| v.trim().to_string()) {
            Ok(url) if !url.is_empty() => url,
            _ => sqlite_url(&env::var("DB_PATH").unwrap_or_else(|_| "database.sqlite3".to_string())),
        };

        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidUploadLimit)?,
            Err(_) => 12 * 1024 * 1024,
        };

        let default_whatsapp = normalize_whatsapp(&env::var("STORE_WHATSAPP_NUMBER").unwrap_or_else(|_| Self::DEFAULT_WHATSAPP.to_string()))?;

        Ok(Self {
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
            database_url,
            store_name: env::var("STORE_NAME").unwrap_or_else(|_| Self::DEFAULT_STORE_NAME.to_string()),
            default_whatsapp,
            admin_user: env::var("ADMIN_USER").unwrap_or_else(|_| "admin".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "NovaCidade@2026".to_string()),
            upload_dir: env::var("UPLOAD_FOLDER").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("static/uploads")),
            max_upload_bytes,
            thumbnail_size: 800,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8083)),
            database_url: "sqlite::memory:".to_string(),
            store_name: Self::DEFAULT_STORE_NAME.to_string(),
            default_whatsapp: Self::DEFAULT_WHATSAPP.to_string(),
            admin_user: "admin".to_string(),
            admin_password: "admin".to_string(),
            upload_dir: env::temp_dir().join("storefront-uploads"),
            max_upload_bytes: 12 * 1024 * 1024,
            thumbnail_size: 800,
        }
    }
}

/// `sqlite:<path>?mode=rwc` so the file is created on first boot.
pub fn sqlite_url(path: &str) -> String {
    format!("sqlite:{path}?mode=rwc")
}

/// Seed contact number in stored form; rejected at startup when it has no digits.
pub fn normalize_whatsapp(raw: &str) -> Result<String, ConfigError> {
    WhatsappNumber::parse(raw).map(|n| n.to_string()).map_err(|_| ConfigError::InvalidWhatsappNumber(raw.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid MAX_UPLOAD_BYTES value")]
    InvalidUploadLimit,

    #[error("Invalid STORE_WHATSAPP_NUMBER value: {0:?}")]
    InvalidWhatsappNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_sqlite_url() {
        assert_eq!(sqlite_url("data/shop.db"), "sqlite:data/shop.db?mode=rwc");
    }

    #[test]
    fn test_normalize_whatsapp() {
        assert_eq!(normalize_whatsapp("(31) 99999-9999").unwrap(), "5531999999999");
        assert_eq!(normalize_whatsapp(Config::DEFAULT_WHATSAPP).unwrap(), "5531999999999");
        assert!(matches!(normalize_whatsapp("n/a"), Err(ConfigError::InvalidWhatsappNumber(_))));
    }
}
