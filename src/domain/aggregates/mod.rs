//! Aggregates module
pub mod catalog;
pub mod category;
pub mod order;
pub mod product;

pub use catalog::{group_by_category, Catalog};
pub use category::{Category, CategoryForm, SEED_CATEGORIES};
pub use order::{compose_order, CartLine, OrderRequest, OrderSummary};
pub use product::{
    build_view, resolve_category, resolve_effective_price, ImportedProduct, NewProduct, ProductForm, ProductRow,
    ProductView, DEFAULT_CATEGORY,
};
