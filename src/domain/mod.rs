//! Storefront domain: pricing, catalog and checkout rules
pub mod aggregates;
pub mod value_objects;
