//! Nova Cidade Storefront
//!
//! Single-store beverage catalog with a WhatsApp checkout.
//!
//! ## Features
//! - Public catalog grouped by category
//! - Promotional pricing
//! - WhatsApp order message and deep link
//! - Admin management of products, categories and the store number
//! - Square thumbnail normalization for product images
//! - SQLite or Postgres persistence

pub mod api;
pub mod config;
pub mod domain;
pub mod imaging;
pub mod storage;

pub use config::Config;
pub use domain::aggregates::{
    build_view, compose_order, group_by_category, resolve_category, resolve_effective_price,
    CartLine, Catalog, Category, OrderRequest, OrderSummary, ProductRow, ProductView,
};
pub use domain::value_objects::{format_money, format_optional_money, parse_money, WhatsappNumber};

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorefrontError {
    #[error("Invalid price format: {0:?}")]
    InvalidPriceFormat(String),

    #[error("Incomplete order data")]
    IncompleteOrder,

    #[error("Empty cart")]
    EmptyCart,

    #[error("Invalid WhatsApp number")]
    InvalidWhatsappNumber,

    #[error("Missing name")]
    MissingName,
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
