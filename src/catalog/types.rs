use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{Category, Condition, Listing, ListingMode, Profile, Size, UnknownVariant};

/// Ordering applied to the catalog
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SortBy {
    #[default]
    Newest,
    PriceLow,
    PriceHigh,
    Distance,
}

impl FromStr for SortBy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "newest" => Ok(SortBy::Newest),
            "price-low" => Ok(SortBy::PriceLow),
            "price-high" => Ok(SortBy::PriceHigh),
            "distance" => Ok(SortBy::Distance),
            _ => Err(UnknownVariant {
                kind: "sort order",
                value: s.to_string(),
            }),
        }
    }
}

/// `all` or a single category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl FromStr for CategoryFilter {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

/// `all` or a single pricing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeFilter {
    #[default]
    All,
    Only(ListingMode),
}

impl FromStr for ModeFilter {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(ModeFilter::All)
        } else {
            s.parse().map(ModeFilter::Only)
        }
    }
}

/// Catalog query parameters
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    /// Free-text search over title, description and category
    pub query: Option<String>,
    pub category: CategoryFilter,
    pub mode: ModeFilter,
    pub condition: Option<Condition>,
    pub size: Option<Size>,
    /// Inclusive bounds on the daily rate; a missing rate counts as 0
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort_by: SortBy,
    /// Drop located listings farther than this from the viewer
    pub max_distance_km: Option<f64>,
}

/// A listing that survived filtering, with its distance from the viewer if known
#[derive(Debug, Clone, Copy)]
pub struct RankedListing<'a> {
    pub listing: &'a Listing,
    pub distance_km: Option<f64>,
}

/// A catalog row ready for display
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub listing: Listing,
    pub mode: ListingMode,
    pub seller: Option<Profile>,
    pub distance_km: Option<f64>,
    pub is_saved: bool,
}
