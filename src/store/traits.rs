use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;
use crate::store::types::{Filter, SelectQuery};

/// Generic row access against the hosted relational API
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Value>, StoreError>;

    /// Insert one record and return the stored row
    async fn insert(&self, table: &str, record: Value) -> Result<Value, StoreError>;

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError>;
}

/// Object storage for listing photos
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError>;

    /// Public URL of an object. No network call.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Typed helpers on top of [`RemoteStore`]
#[async_trait]
pub trait RemoteStoreExt: RemoteStore {
    async fn select_as<T>(&self, table: &str, query: &SelectQuery) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        self.select(table, query)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| StoreError::Decode(e.to_string())))
            .collect()
    }

    async fn select_one<T>(&self, table: &str, query: &SelectQuery) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let query = query.clone().limit(1);
        Ok(self.select_as(table, &query).await?.into_iter().next())
    }

    async fn insert_as<R, T>(&self, table: &str, record: &R) -> Result<T, StoreError>
    where
        R: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let value =
            serde_json::to_value(record).map_err(|e| StoreError::Decode(e.to_string()))?;
        let row = self.insert(table, value).await?;
        serde_json::from_value(row).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

impl<S: RemoteStore + ?Sized> RemoteStoreExt for S {}
