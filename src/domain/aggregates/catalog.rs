//! Catalog grouping for display

use indexmap::IndexMap;

use super::product::ProductView;

/// Category name to its products, in first-seen order.
pub type Catalog = IndexMap<String, Vec<ProductView>>;

/// Stable grouping: products keep their input order within each category and
/// categories appear in the order they are first seen.
pub fn group_by_category(views: impl IntoIterator<Item = ProductView>) -> Catalog {
    let mut catalog = Catalog::new();
    for view in views {
        catalog.entry(view.category.clone()).or_default().push(view);
    }
    catalog
}
