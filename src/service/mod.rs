//! Product persistence, list query parsing and request body validation.

mod listing;
mod products;
mod validation;
pub use listing::ListQuery;
pub use products::{Product, ProductPage, ProductRequest, ProductService, PRODUCTS, PRODUCT_FILTERS};
pub use validation::{FieldRule, FieldType, RequestValidator};
