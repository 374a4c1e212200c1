pub mod geo;
pub mod query;
pub mod service;
pub mod types;

pub use geo::format_distance;
pub use service::{CatalogService, Viewer};
pub use types::{CatalogEntry, CategoryFilter, ModeFilter, QueryParams, SortBy};
