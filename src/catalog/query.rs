//! Text search, filters and ordering over a fetched listing collection.

use std::cmp::Ordering;

use crate::catalog::geo::{haversine_km, is_within_radius};
use crate::catalog::types::{CategoryFilter, ModeFilter, QueryParams, RankedListing, SortBy};
use crate::models::{Coordinates, Listing};

/// Filter and order `listings` for display.
///
/// The input is left untouched. Listings missing optional fields are never
/// dropped for it: they pass the text filter on whatever fields they have and
/// sort last by distance.
pub fn query_listings<'a>(
    listings: &'a [Listing],
    params: &QueryParams,
    origin: Option<Coordinates>,
) -> Vec<RankedListing<'a>> {
    let needle = params
        .query
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    let mut ranked: Vec<RankedListing<'a>> = listings
        .iter()
        .filter(|l| needle.as_deref().map_or(true, |n| matches_text(l, n)))
        .filter(|l| matches_category(l, params.category))
        .filter(|l| matches_mode(l, params.mode))
        .filter(|l| params.condition.map_or(true, |c| l.condition == c.as_str()))
        .filter(|l| {
            params
                .size
                .map_or(true, |s| l.size.as_deref() == Some(s.as_str()))
        })
        .filter(|l| in_price_range(l, params.min_price, params.max_price))
        .filter(|l| within_reach(l, origin, params.max_distance_km))
        .map(|listing| RankedListing {
            listing,
            distance_km: origin
                .zip(listing.coordinates())
                .map(|(from, to)| haversine_km(from, to)),
        })
        .collect();

    sort_ranked(&mut ranked, params.sort_by);
    ranked
}

/// `needle` must already be lowercased
fn matches_text(listing: &Listing, needle: &str) -> bool {
    listing.title.to_lowercase().contains(needle)
        || listing
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
        || listing.category.to_lowercase().contains(needle)
}

fn matches_category(listing: &Listing, filter: CategoryFilter) -> bool {
    match filter {
        CategoryFilter::All => true,
        CategoryFilter::Only(category) => listing.category == category.as_str(),
    }
}

fn matches_mode(listing: &Listing, filter: ModeFilter) -> bool {
    match filter {
        ModeFilter::All => true,
        ModeFilter::Only(mode) => listing.mode() == mode,
    }
}

fn in_price_range(listing: &Listing, min: Option<f64>, max: Option<f64>) -> bool {
    let rate = listing.price_per_day.unwrap_or(0.0);
    min.map_or(true, |min| rate >= min) && max.map_or(true, |max| rate <= max)
}

// Unlocated listings are kept; only a known distance can exclude
fn within_reach(listing: &Listing, origin: Option<Coordinates>, radius_km: Option<f64>) -> bool {
    match (origin, listing.coordinates(), radius_km) {
        (Some(from), Some(to), Some(radius)) => is_within_radius(from, to, radius),
        _ => true,
    }
}

/// Stable sort; ties keep input order
fn sort_ranked(ranked: &mut [RankedListing<'_>], sort_by: SortBy) {
    match sort_by {
        SortBy::Newest => ranked.sort_by(|a, b| b.listing.created_at.cmp(&a.listing.created_at)),
        SortBy::PriceLow => ranked.sort_by(|a, b| daily_rate(a).total_cmp(&daily_rate(b))),
        SortBy::PriceHigh => ranked.sort_by(|a, b| daily_rate(b).total_cmp(&daily_rate(a))),
        SortBy::Distance => ranked.sort_by(|a, b| nearest_first(a.distance_km, b.distance_km)),
    }
}

// Price sorts use the rental rate whatever the listing's mode
fn daily_rate(entry: &RankedListing<'_>) -> f64 {
    entry.listing.price_per_day.unwrap_or(0.0)
}

fn nearest_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{at_day, listing};
    use crate::models::{Category, Condition, ListingMode, Size};

    fn ids(ranked: &[RankedListing<'_>]) -> Vec<String> {
        ranked.iter().map(|r| r.listing.id.clone()).collect()
    }

    fn catalog() -> Vec<Listing> {
        let mut a = listing("a", "Black Abaya", "abaya");
        a.description = Some("Flowing crepe, ankle length".into());
        a.price_per_day = Some(15.0);
        a.created_at = Some(at_day(3));
        a.latitude = Some(43.2557);
        a.longitude = Some(-79.8711);

        let mut b = listing("b", "Silk hijab set", "hijab");
        b.sell_price = Some(40.0);
        b.price_per_day = Some(5.0);
        b.created_at = Some(at_day(5));

        let mut c = listing("c", "Eid thobe", "thobe");
        c.deposit_amount = Some(30.0);
        c.created_at = Some(at_day(1));
        c.latitude = Some(43.6532);
        c.longitude = Some(-79.3832);

        let mut d = listing("d", "Prayer mat", "prayer_items");
        d.description = Some("Pairs with any abaya".into());
        d.price_per_day = Some(2.0);
        d.created_at = Some(at_day(3));

        vec![a, b, c, d]
    }

    #[test]
    fn empty_or_blank_query_keeps_everything() {
        let listings = catalog();
        let params = QueryParams {
            query: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(query_listings(&listings, &params, None).len(), 4);
    }

    #[test]
    fn text_search_covers_title_description_and_category() {
        let listings = catalog();
        let params = QueryParams {
            query: Some("  ABAYA ".into()),
            ..Default::default()
        };
        let result = ids(&query_listings(&listings, &params, None));
        // "a" by title and category, "d" by description
        assert_eq!(result, vec!["a", "d"]);

        let params = QueryParams {
            query: Some("prayer_".into()),
            ..Default::default()
        };
        assert_eq!(ids(&query_listings(&listings, &params, None)), vec!["d"]);

        let params = QueryParams {
            query: Some("bikini".into()),
            ..Default::default()
        };
        assert!(query_listings(&listings, &params, None).is_empty());
    }

    #[test]
    fn category_filter_is_an_exact_partition() {
        let mut listings = catalog();
        listings.push(listing("e", "Mint hijab", "hijab"));
        listings.push(listing("f", "Odd", "HIJAB"));

        let params = QueryParams {
            category: CategoryFilter::Only(Category::Hijab),
            ..Default::default()
        };
        let result = query_listings(&listings, &params, None);

        assert!(result.iter().all(|r| r.listing.category == "hijab"));
        let expected = listings.iter().filter(|l| l.category == "hijab").count();
        assert_eq!(result.len(), expected);
    }

    #[test]
    fn mode_filter_uses_derived_mode() {
        let listings = catalog();
        let by_mode = |mode| {
            let params = QueryParams {
                mode: ModeFilter::Only(mode),
                sort_by: SortBy::PriceLow,
                ..Default::default()
            };
            ids(&query_listings(&listings, &params, None))
        };

        assert_eq!(by_mode(ListingMode::Buy), vec!["b"]);
        assert_eq!(by_mode(ListingMode::Borrow), vec!["c"]);
        // "b" has a daily rate but its sale price makes it a buy listing
        assert_eq!(by_mode(ListingMode::Rent), vec!["d", "a"]);
    }

    #[test]
    fn price_range_is_inclusive_on_the_daily_rate() {
        let listings = catalog();
        let params = QueryParams {
            min_price: Some(5.0),
            max_price: Some(15.0),
            ..Default::default()
        };
        // "c" has no daily rate and counts as 0
        assert_eq!(ids(&query_listings(&listings, &params, None)), vec!["b", "a"]);

        let params = QueryParams {
            max_price: Some(2.0),
            ..Default::default()
        };
        assert_eq!(ids(&query_listings(&listings, &params, None)), vec!["d", "c"]);
    }

    #[test]
    fn condition_and_size_match_exactly() {
        let mut listings = catalog();
        listings[0].condition = "like_new".into();
        listings[0].size = Some("M".into());
        listings[1].size = Some("one_size".into());

        let params = QueryParams {
            condition: Some(Condition::LikeNew),
            ..Default::default()
        };
        assert_eq!(ids(&query_listings(&listings, &params, None)), vec!["a"]);

        let params = QueryParams {
            size: Some(Size::OneSize),
            ..Default::default()
        };
        assert_eq!(ids(&query_listings(&listings, &params, None)), vec!["b"]);

        // Listings without a size never match a size filter
        let params = QueryParams {
            size: Some(Size::Small),
            ..Default::default()
        };
        assert!(query_listings(&listings, &params, None).is_empty());
    }

    #[test]
    fn newest_is_descending_stable_and_idempotent() {
        let listings = catalog();
        let params = QueryParams::default();
        let once = ids(&query_listings(&listings, &params, None));
        // "a" and "d" share a timestamp and keep input order
        assert_eq!(once, vec!["b", "a", "d", "c"]);

        let reordered: Vec<Listing> = once
            .iter()
            .map(|id| listings.iter().find(|l| &l.id == id).unwrap().clone())
            .collect();
        assert_eq!(ids(&query_listings(&reordered, &params, None)), once);
    }

    #[test]
    fn missing_timestamps_sort_last_under_newest() {
        let mut listings = catalog();
        listings.insert(0, listing("z", "Undated scarf", "accessories"));
        let result = ids(&query_listings(&listings, &QueryParams::default(), None));
        assert_eq!(result.last().map(String::as_str), Some("z"));
    }

    #[test]
    fn price_sorts_use_daily_rate_with_missing_as_zero() {
        let listings = catalog();
        let low = QueryParams {
            sort_by: SortBy::PriceLow,
            ..Default::default()
        };
        assert_eq!(ids(&query_listings(&listings, &low, None)), vec!["c", "d", "b", "a"]);

        let high = QueryParams {
            sort_by: SortBy::PriceHigh,
            ..Default::default()
        };
        assert_eq!(ids(&query_listings(&listings, &high, None)), vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn distance_sort_puts_unlocated_listings_last() {
        let listings = catalog();
        let params = QueryParams {
            sort_by: SortBy::Distance,
            ..Default::default()
        };
        let toronto = Coordinates::new(43.65, -79.38);

        let result = query_listings(&listings, &params, Some(toronto));
        assert_eq!(ids(&result), vec!["c", "a", "b", "d"]);
        assert!(result[0].distance_km.unwrap() < 1.0);
        assert!(result[2].distance_km.is_none());

        // Without a viewer location nothing has a distance and input order holds
        let result = query_listings(&listings, &params, None);
        assert_eq!(ids(&result), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn radius_excludes_only_far_located_listings() {
        let listings = catalog();
        let params = QueryParams {
            max_distance_km: Some(10.0),
            ..Default::default()
        };
        let toronto = Coordinates::new(43.65, -79.38);

        // "a" is in Hamilton, "b" and "d" have no coordinates
        let result = ids(&query_listings(&listings, &params, Some(toronto)));
        assert_eq!(result, vec!["b", "d", "c"]);

        // No viewer location, nothing to measure against
        assert_eq!(query_listings(&listings, &params, None).len(), 4);
    }

    #[test]
    fn input_is_not_mutated() {
        let listings = catalog();
        let before: Vec<String> = listings.iter().map(|l| l.id.clone()).collect();
        let params = QueryParams {
            sort_by: SortBy::PriceHigh,
            ..Default::default()
        };
        let _ = query_listings(&listings, &params, None);
        let after: Vec<String> = listings.iter().map(|l| l.id.clone()).collect();
        assert_eq!(before, after);
    }
}
