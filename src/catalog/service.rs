use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::query::query_listings;
use crate::catalog::types::{CatalogEntry, QueryParams};
use crate::error::StoreError;
use crate::models::{Coordinates, Listing, Profile};
use crate::store::{
    Filter, Order, RemoteStore, RemoteStoreExt, SelectQuery, FAVORITES, LISTINGS, PROFILES,
};

const LISTING_WITH_IMAGES: &str = "*, listing_images(*)";

/// Who is browsing
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub user_id: Option<String>,
    pub location: Option<Coordinates>,
    /// Saved listing ids when they are already known (e.g. a guest's local set)
    pub saved: Option<HashSet<String>>,
}

/// Fetches the public catalog and runs the query pipeline over it
pub struct CatalogService {
    store: Arc<dyn RemoteStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// All active, approved listings with their images, newest first
    pub async fn active_listings(&self) -> Result<Vec<Listing>, StoreError> {
        let query = SelectQuery::new()
            .columns(LISTING_WITH_IMAGES)
            .filter(Filter::eq("status", "active"))
            .filter(Filter::eq("is_approved", true))
            .order(Order::desc("created_at"));

        let listings: Vec<Listing> = self.store.select_as(LISTINGS, &query).await?;
        // The store filter already guarantees this; rows from older schemas may omit the columns
        let visible: Vec<Listing> = listings
            .into_iter()
            .filter(Listing::is_publicly_visible)
            .collect();

        debug!(count = visible.len(), "Fetched active listings");
        Ok(visible)
    }

    pub async fn listing(&self, id: &str) -> Result<Option<Listing>, StoreError> {
        let query = SelectQuery::new()
            .columns(LISTING_WITH_IMAGES)
            .filter(Filter::eq("id", id));
        self.store.select_one(LISTINGS, &query).await
    }

    /// Profile of a listing's owner, if they have one
    pub async fn seller(&self, owner_id: &str) -> Result<Option<Profile>, StoreError> {
        let query = SelectQuery::new().filter(Filter::eq("id", owner_id));
        self.store.select_one(PROFILES, &query).await
    }

    /// Listings for the "saved" view
    pub async fn saved_listings(&self, ids: &[String]) -> Result<Vec<Listing>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = SelectQuery::new()
            .columns(LISTING_WITH_IMAGES)
            .filter(Filter::in_list("id", ids))
            .order(Order::desc("created_at"));
        self.store.select_as(LISTINGS, &query).await
    }

    pub async fn profiles(&self) -> Result<Vec<Profile>, StoreError> {
        self.store.select_as(PROFILES, &SelectQuery::new()).await
    }

    pub async fn saved_ids(&self, user_id: &str) -> Result<HashSet<String>, StoreError> {
        let query = SelectQuery::new()
            .columns("listing_id")
            .filter(Filter::eq("user_id", user_id));
        let rows: Vec<FavoriteRow> = self.store.select_as(FAVORITES, &query).await?;
        Ok(rows.into_iter().map(|r| r.listing_id).collect())
    }

    /// Fetch everything the browse screen needs and apply `params`
    pub async fn browse(
        &self,
        params: &QueryParams,
        viewer: &Viewer,
    ) -> Result<Vec<CatalogEntry>, StoreError> {
        let listings = self.active_listings().await?;
        let profiles = self.profiles().await?;
        let saved = match (&viewer.saved, &viewer.user_id) {
            (Some(saved), _) => saved.clone(),
            (None, Some(user_id)) => self.saved_ids(user_id).await?,
            (None, None) => HashSet::new(),
        };

        let entries = decorate(&listings, &profiles, &saved, params, viewer.location);
        info!(
            total = listings.len(),
            shown = entries.len(),
            sort = ?params.sort_by,
            "Catalog query complete"
        );
        Ok(entries)
    }
}

/// `favorites` rows fetched with only the listing column
#[derive(serde::Deserialize)]
struct FavoriteRow {
    listing_id: String,
}

/// Run the query pipeline and attach seller and saved state
pub fn decorate(
    listings: &[Listing],
    profiles: &[Profile],
    saved: &HashSet<String>,
    params: &QueryParams,
    origin: Option<Coordinates>,
) -> Vec<CatalogEntry> {
    let sellers: HashMap<&str, &Profile> = profiles.iter().map(|p| (p.id.as_str(), p)).collect();

    query_listings(listings, params, origin)
        .into_iter()
        .map(|ranked| CatalogEntry {
            listing: ranked.listing.clone(),
            mode: ranked.listing.mode(),
            seller: sellers.get(ranked.listing.owner_id.as_str()).map(|p| (*p).clone()),
            distance_km: ranked.distance_km,
            is_saved: saved.contains(&ranked.listing.id),
        })
        .collect()
}
