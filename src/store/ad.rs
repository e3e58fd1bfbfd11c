//! Advertisement Store

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{OnceCell, RwLock};

use crate::error::StoreError;
use crate::models::{AdStatus, Advertisement, NewAdvertisement};

use super::file::{read_json, write_json};

/// Advertisement persistence
#[async_trait]
pub trait AdStore: Send + Sync {
    async fn insert(&self, ad: NewAdvertisement) -> Result<Advertisement, StoreError>;
    async fn get(&self, id: u64) -> Result<Option<Advertisement>, StoreError>;
    /// All ads, newest first
    async fn list(&self) -> Result<Vec<Advertisement>, StoreError>;
    async fn set_status(&self, id: u64, status: AdStatus) -> Result<Advertisement, StoreError>;
    async fn delete(&self, id: u64) -> Result<bool, StoreError>;
}

/// Ads plus the id high-water mark, so deleted ids are never handed out again
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AdTable {
    next_id: u64,
    ads: BTreeMap<u64, Advertisement>,
}

impl AdTable {
    fn with_new(&self, ad: NewAdvertisement) -> (Self, Advertisement) {
        let mut next = self.clone();
        next.next_id += 1;
        let ad = ad.into_ad(next.next_id, Utc::now());
        next.ads.insert(ad.id, ad.clone());
        (next, ad)
    }

    fn with_status(&self, id: u64, status: AdStatus) -> Result<(Self, Advertisement), StoreError> {
        let mut next = self.clone();
        let ad = next
            .ads
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("advertisement {}", id)))?;
        ad.status = status;
        let ad = ad.clone();
        Ok((next, ad))
    }

    fn list(&self) -> Vec<Advertisement> {
        let mut list: Vec<Advertisement> = self.ads.values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        list
    }
}

/// In-process ad store
#[derive(Default)]
pub struct MemoryAdStore {
    table: Arc<RwLock<AdTable>>,
}

impl MemoryAdStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdStore for MemoryAdStore {
    async fn insert(&self, ad: NewAdvertisement) -> Result<Advertisement, StoreError> {
        let mut table = self.table.write().await;
        let (next, ad) = table.with_new(ad);
        *table = next;
        Ok(ad)
    }

    async fn get(&self, id: u64) -> Result<Option<Advertisement>, StoreError> {
        Ok(self.table.read().await.ads.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Advertisement>, StoreError> {
        Ok(self.table.read().await.list())
    }

    async fn set_status(&self, id: u64, status: AdStatus) -> Result<Advertisement, StoreError> {
        let mut table = self.table.write().await;
        let (next, ad) = table.with_status(id, status)?;
        *table = next;
        Ok(ad)
    }

    async fn delete(&self, id: u64) -> Result<bool, StoreError> {
        Ok(self.table.write().await.ads.remove(&id).is_some())
    }
}

/// Ads kept in one JSON document, rewritten on every change
pub struct JsonFileAdStore {
    path: PathBuf,
    table: OnceCell<RwLock<AdTable>>,
}

impl JsonFileAdStore {
    /// Default file name inside a storage directory
    pub const FILE_NAME: &'static str = "smd_ads.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: OnceCell::new(),
        }
    }

    /// Store at `<dir>/smd_ads.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    async fn table(&self) -> Result<&RwLock<AdTable>, StoreError> {
        self.table
            .get_or_try_init(|| async {
                let table = read_json::<AdTable>(&self.path).await?.unwrap_or_default();
                Ok::<_, StoreError>(RwLock::new(table))
            })
            .await
    }
}

#[async_trait]
impl AdStore for JsonFileAdStore {
    async fn insert(&self, ad: NewAdvertisement) -> Result<Advertisement, StoreError> {
        let mut table = self.table().await?.write().await;
        let (next, ad) = table.with_new(ad);
        write_json(&self.path, &next).await?;
        *table = next;
        Ok(ad)
    }

    async fn get(&self, id: u64) -> Result<Option<Advertisement>, StoreError> {
        Ok(self.table().await?.read().await.ads.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Advertisement>, StoreError> {
        Ok(self.table().await?.read().await.list())
    }

    async fn set_status(&self, id: u64, status: AdStatus) -> Result<Advertisement, StoreError> {
        let mut table = self.table().await?.write().await;
        let (next, ad) = table.with_status(id, status)?;
        write_json(&self.path, &next).await?;
        *table = next;
        Ok(ad)
    }

    async fn delete(&self, id: u64) -> Result<bool, StoreError> {
        let mut table = self.table().await?.write().await;
        if !table.ads.contains_key(&id) {
            return Ok(false);
        }
        let mut next = table.clone();
        next.ads.remove(&id);
        write_json(&self.path, &next).await?;
        *table = next;
        Ok(true)
    }
}
