//! Advertisement Service

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{StoreError, ValidationError};
use crate::models::{AdStatus, Advertisement, NewAdvertisement};
use crate::settings::sanitize_text;
use crate::store::AdStore;

use super::settings::{SettingsError, SettingsStore};

/// Advertisement service error
#[derive(Debug, thiserror::Error)]
pub enum AdError {
    #[error("Invalid advertisement: {0}")]
    Validation(#[from] ValidationError),
    #[error("Advertisement not found: {0}")]
    NotFound(u64),
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Advertisement service
pub struct AdService {
    store: Arc<dyn AdStore>,
    settings: Arc<SettingsStore>,
}

impl AdService {
    pub fn new(store: Arc<dyn AdStore>, settings: Arc<SettingsStore>) -> Self {
        Self { store, settings }
    }

    pub async fn create(&self, mut ad: NewAdvertisement) -> Result<Advertisement, AdError> {
        ad.title = sanitize_text(&ad.title);
        ad.placement = sanitize_text(&ad.placement);

        if ad.title.is_empty() {
            return Err(ValidationError::new("title", "is required").into());
        }
        if ad.placement.is_empty() {
            return Err(ValidationError::new("placement", "is required").into());
        }
        if let (Some(start), Some(end)) = (ad.start_date, ad.end_date) {
            if end <= start {
                return Err(ValidationError::new("end_date", "must be after start_date").into());
            }
        }

        let ad = self.store.insert(ad).await?;
        tracing::info!(id = ad.id, placement = %ad.placement, "Advertisement created");
        Ok(ad)
    }

    /// All ads, newest first
    pub async fn list(&self) -> Result<Vec<Advertisement>, AdError> {
        Ok(self.store.list().await?)
    }

    pub async fn set_status(&self, id: u64, status: AdStatus) -> Result<Advertisement, AdError> {
        match self.store.set_status(id, status).await {
            Ok(ad) => Ok(ad),
            Err(StoreError::NotFound(_)) => Err(AdError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, id: u64) -> Result<(), AdError> {
        if self.store.delete(id).await? {
            Ok(())
        } else {
            Err(AdError::NotFound(id))
        }
    }

    /// Ads to show in a placement at `now`; empty when ads are disabled
    pub async fn active_for(
        &self,
        placement: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Advertisement>, AdError> {
        if !self.settings.get().await?.advertisements_enabled {
            return Ok(Vec::new());
        }

        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|ad| ad.placement == placement && ad.is_live(now))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsUpdate;
    use crate::store::{MemoryAdStore, MemoryOptionStore};
    use chrono::Duration;

    fn service() -> (Arc<SettingsStore>, AdService) {
        let settings = Arc::new(SettingsStore::new(Arc::new(MemoryOptionStore::new())));
        let ads = AdService::new(Arc::new(MemoryAdStore::new()), Arc::clone(&settings));
        (settings, ads)
    }

    fn new_ad(title: &str, placement: &str) -> NewAdvertisement {
        NewAdvertisement {
            title: title.to_string(),
            content: "<p>Buy now</p>".to_string(),
            placement: placement.to_string(),
            start_date: None,
            end_date: None,
            status: AdStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_active_for_placement() {
        let (settings, ads) = service();
        let now = Utc::now();

        ads.create(new_ad("Player banner", "before_player")).await.unwrap();
        ads.create(new_ad("Sidebar", "sidebar")).await.unwrap();
        let paused = ads.create(new_ad("Paused", "before_player")).await.unwrap();
        ads.set_status(paused.id, AdStatus::Inactive).await.unwrap();

        let live = ads.active_for("before_player", now).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].title, "Player banner");

        settings
            .set(&SettingsUpdate { advertisements_enabled: Some(false), ..Default::default() })
            .await
            .unwrap();
        assert!(ads.active_for("before_player", now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation() {
        let (_, ads) = service();

        assert!(matches!(
            ads.create(new_ad("  ", "sidebar")).await.unwrap_err(),
            AdError::Validation(_)
        ));

        let now = Utc::now();
        let mut backwards = new_ad("Backwards", "sidebar");
        backwards.start_date = Some(now);
        backwards.end_date = Some(now - Duration::days(1));
        assert!(ads.create(backwards).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_ad() {
        let (_, ads) = service();
        assert!(matches!(ads.delete(42).await.unwrap_err(), AdError::NotFound(42)));
        assert!(matches!(
            ads.set_status(42, AdStatus::Active).await.unwrap_err(),
            AdError::NotFound(42)
        ));

        let ad = ads.create(new_ad("Once", "footer")).await.unwrap();
        ads.delete(ad.id).await.unwrap();
        assert!(ads.list().await.unwrap().is_empty());
    }
}
