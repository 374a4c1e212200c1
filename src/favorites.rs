//! The viewer's saved listings.
//!
//! Signed-in users keep favorites in the remote `favorites` table; guests keep
//! them in a JSON file on the device. Changes are applied locally first and
//! rolled back when the write behind them fails.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::FavoritesError;
use crate::models::Favorite;
use crate::store::{Filter, RemoteStore, RemoteStoreExt, SelectQuery, FAVORITES};

/// Where the favorite set lives
#[derive(Clone)]
pub enum FavoritesBackend {
    Remote {
        store: Arc<dyn RemoteStore>,
        user_id: String,
    },
    Local {
        path: PathBuf,
    },
}

pub struct FavoriteSet {
    backend: FavoritesBackend,
    ids: HashSet<String>,
}

#[derive(Serialize)]
struct NewFavorite<'a> {
    user_id: &'a str,
    listing_id: &'a str,
}

impl FavoriteSet {
    pub async fn load(backend: FavoritesBackend) -> Result<Self, FavoritesError> {
        let ids = match &backend {
            FavoritesBackend::Remote { store, user_id } => {
                let query = SelectQuery::new().filter(Filter::eq("user_id", user_id));
                let rows: Vec<Favorite> = store.select_as(FAVORITES, &query).await?;
                rows.into_iter().map(|f| f.listing_id).collect()
            }
            FavoritesBackend::Local { path } => read_local(path).await?,
        };
        debug!(count = ids.len(), "Favorites loaded");
        Ok(Self { backend, ids })
    }

    pub async fn local(path: impl Into<PathBuf>) -> Result<Self, FavoritesError> {
        Self::load(FavoritesBackend::Local { path: path.into() }).await
    }

    pub fn is_saved(&self, listing_id: &str) -> bool {
        self.ids.contains(listing_id)
    }

    pub fn ids(&self) -> &HashSet<String> {
        &self.ids
    }

    /// Sorted copy, for stable output
    pub fn sorted_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns false when the listing was already saved
    pub async fn add(&mut self, listing_id: &str) -> Result<bool, FavoritesError> {
        if !self.ids.insert(listing_id.to_string()) {
            return Ok(false);
        }

        if let Err(e) = self.write_added(listing_id).await {
            warn!(listing_id, error = %e, "Saving favorite failed, rolling back");
            self.ids.remove(listing_id);
            return Err(e);
        }
        info!(listing_id, "❤️  Saved listing");
        Ok(true)
    }

    /// Returns false when the listing was not saved
    pub async fn remove(&mut self, listing_id: &str) -> Result<bool, FavoritesError> {
        if !self.ids.remove(listing_id) {
            return Ok(false);
        }

        if let Err(e) = self.write_removed(listing_id).await {
            warn!(listing_id, error = %e, "Removing favorite failed, rolling back");
            self.ids.insert(listing_id.to_string());
            return Err(e);
        }
        info!(listing_id, "Removed saved listing");
        Ok(true)
    }

    /// Flip the saved state. Returns the new state.
    pub async fn toggle(&mut self, listing_id: &str) -> Result<bool, FavoritesError> {
        if self.is_saved(listing_id) {
            self.remove(listing_id).await?;
            Ok(false)
        } else {
            self.add(listing_id).await?;
            Ok(true)
        }
    }

    async fn write_added(&self, listing_id: &str) -> Result<(), FavoritesError> {
        match &self.backend {
            FavoritesBackend::Remote { store, user_id } => {
                let record = NewFavorite {
                    user_id,
                    listing_id,
                };
                let _: Favorite = store.insert_as(FAVORITES, &record).await?;
                Ok(())
            }
            FavoritesBackend::Local { path } => write_local(path, &self.sorted_ids()).await,
        }
    }

    async fn write_removed(&self, listing_id: &str) -> Result<(), FavoritesError> {
        match &self.backend {
            FavoritesBackend::Remote { store, user_id } => {
                let filters = [
                    Filter::eq("user_id", user_id),
                    Filter::eq("listing_id", listing_id),
                ];
                store.delete(FAVORITES, &filters).await?;
                Ok(())
            }
            FavoritesBackend::Local { path } => write_local(path, &self.sorted_ids()).await,
        }
    }
}

/// A missing file is an empty set
async fn read_local(path: &Path) -> Result<HashSet<String>, FavoritesError> {
    match tokio::fs::read(path).await {
        Ok(raw) if raw.iter().all(u8::is_ascii_whitespace) => Ok(HashSet::new()),
        Ok(raw) => {
            let ids: Vec<String> = serde_json::from_slice(&raw)?;
            Ok(ids.into_iter().collect())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashSet::new()),
        Err(e) => Err(e.into()),
    }
}

async fn write_local(path: &Path, ids: &[String]) -> Result<(), FavoritesError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_vec_pretty(ids)?;
    tokio::fs::write(path, body).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingBackend};
    use serde_json::json;

    async fn remote_set(backend: Arc<RecordingBackend>, user_id: &str) -> FavoriteSet {
        FavoriteSet::load(FavoritesBackend::Remote {
            store: backend,
            user_id: user_id.to_string(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn guest_favorites_round_trip_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("favorites.json");

        let mut set = FavoriteSet::local(&path).await.unwrap();
        assert!(set.ids().is_empty());

        assert!(set.toggle("l2").await.unwrap());
        assert!(set.add("l1").await.unwrap());
        assert!(!set.add("l1").await.unwrap());

        let on_disk: Vec<String> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk, vec!["l1", "l2"]);

        assert!(!set.toggle("l2").await.unwrap());
        let reloaded = FavoriteSet::local(&path).await.unwrap();
        assert!(reloaded.is_saved("l1"));
        assert!(!reloaded.is_saved("l2"));
    }

    #[tokio::test]
    async fn corrupt_guest_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favorites.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FavoriteSet::local(&path).await.err().unwrap();
        assert!(matches!(err, FavoritesError::Corrupt(_)));
    }

    #[tokio::test]
    async fn remote_set_loads_user_rows() {
        let backend = Arc::new(RecordingBackend::new().with_rows(
            FAVORITES,
            vec![
                json!({"user_id": "u1", "listing_id": "l1"}),
                json!({"user_id": "u1", "listing_id": "l3"}),
            ],
        ));
        let set = remote_set(backend.clone(), "u1").await;

        assert_eq!(set.sorted_ids(), vec!["l1", "l3"]);
        assert_eq!(
            backend.calls(),
            vec![Call::Select {
                table: FAVORITES.to_string()
            }]
        );
    }

    #[tokio::test]
    async fn remote_toggle_inserts_then_deletes_by_pair() {
        let backend = Arc::new(RecordingBackend::new());
        let mut set = remote_set(backend.clone(), "u1").await;

        assert!(set.toggle("l9").await.unwrap());
        assert!(!set.toggle("l9").await.unwrap());

        let calls = backend.calls();
        assert!(matches!(&calls[1], Call::Insert { table, record }
            if table == FAVORITES && record == &json!({"user_id": "u1", "listing_id": "l9"})));
        assert_eq!(
            calls[2],
            Call::Delete {
                table: FAVORITES.to_string(),
                filters: vec![Filter::eq("user_id", "u1"), Filter::eq("listing_id", "l9")],
            }
        );
    }

    #[tokio::test]
    async fn failed_remote_writes_roll_back() {
        let mut backend = RecordingBackend::new().with_rows(
            FAVORITES,
            vec![json!({"user_id": "u1", "listing_id": "kept"})],
        );
        backend.fail_inserts_into.insert(FAVORITES.to_string());
        backend.fail_deletes = true;
        let mut set = remote_set(Arc::new(backend), "u1").await;

        assert!(set.add("new").await.is_err());
        assert!(!set.is_saved("new"));

        assert!(set.remove("kept").await.is_err());
        assert!(set.is_saved("kept"));
        assert_eq!(set.ids().len(), 1);
    }
}
