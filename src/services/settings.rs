//! Settings Store
//!
//! Cached, default-merged reads and validated whole-document writes of the
//! plugin settings.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use crate::error::{StoreError, ValidationError};
use crate::settings::{MediaDoctorSettings, SettingsUpdate};
use crate::store::OptionStore;

/// Option slot holding the settings document
pub const SETTINGS_OPTION: &str = "smd_settings";

/// How long a loaded document is served from memory
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Settings store error
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid setting: {0}")]
    Validation(#[from] ValidationError),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

struct CachedSettings {
    settings: Arc<MediaDoctorSettings>,
    /// `None` when the TTL runs past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl CachedSettings {
    fn is_fresh(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// Single source of truth for plugin configuration
///
/// The cache is local to this instance. Another instance writing the same
/// slot is only observed after the TTL expires.
pub struct SettingsStore {
    options: Arc<dyn OptionStore>,
    option_name: String,
    ttl: Duration,
    cache: RwLock<Option<CachedSettings>>,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Create a store over the default option slot
    pub fn new(options: Arc<dyn OptionStore>) -> Self {
        Self::with_options(options, SETTINGS_OPTION, DEFAULT_CACHE_TTL)
    }

    pub fn with_options(
        options: Arc<dyn OptionStore>,
        option_name: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            options,
            option_name: option_name.into(),
            ttl,
            cache: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    pub fn option_name(&self) -> &str {
        &self.option_name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current settings, fully populated
    pub async fn get(&self) -> Result<Arc<MediaDoctorSettings>, SettingsError> {
        {
            let cache = self.cache.read().await;
            if let Some(ref cached) = *cache {
                if cached.is_fresh() {
                    return Ok(Arc::clone(&cached.settings));
                }
            }
        }

        let settings = Arc::new(self.load().await?);

        let mut cache = self.cache.write().await;
        *cache = Some(CachedSettings {
            settings: Arc::clone(&settings),
            expires_at: Instant::now().checked_add(self.ttl),
        });

        Ok(settings)
    }

    /// Validate and persist a partial update, returning the new document.
    ///
    /// Nothing is written when any touched field is invalid.
    pub async fn set(&self, update: &SettingsUpdate) -> Result<Arc<MediaDoctorSettings>, SettingsError> {
        if update.is_empty() {
            return self.get().await;
        }

        let _guard = self.write_lock.lock().await;

        let current = self.load().await?;
        let next = update.apply_to(&current).map_err(|e| {
            tracing::debug!(field = %e.field, "Settings update rejected: {}", e.message);
            e
        })?;

        self.persist(&next).await?;
        self.invalidate().await;

        tracing::info!(
            option = %self.option_name,
            fields = ?update.touched_fields(),
            "Settings updated"
        );

        Ok(Arc::new(next))
    }

    /// Write the default document if the slot is empty.
    ///
    /// Returns true when defaults were written.
    pub async fn initialize(&self) -> Result<bool, SettingsError> {
        let _guard = self.write_lock.lock().await;

        if self.options.get(&self.option_name).await?.is_some() {
            return Ok(false);
        }

        self.persist(&MediaDoctorSettings::default()).await?;
        self.invalidate().await;
        tracing::info!(option = %self.option_name, "Default settings created");
        Ok(true)
    }

    /// Overwrite the stored document with defaults
    pub async fn reset(&self) -> Result<Arc<MediaDoctorSettings>, SettingsError> {
        let _guard = self.write_lock.lock().await;
        let defaults = MediaDoctorSettings::default();
        self.persist(&defaults).await?;
        self.invalidate().await;
        tracing::info!(option = %self.option_name, "Settings reset to defaults");
        Ok(Arc::new(defaults))
    }

    /// Remove the stored document (uninstall)
    pub async fn delete(&self) -> Result<bool, SettingsError> {
        let _guard = self.write_lock.lock().await;
        let removed = self.options.delete(&self.option_name).await?;
        self.invalidate().await;
        Ok(removed)
    }

    /// Drop the cached document
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Social profile links that are set
    pub async fn social_links(&self) -> Result<BTreeMap<String, String>, SettingsError> {
        Ok(self.get().await?.social_links())
    }

    /// Payment method flags
    pub async fn payment_methods(&self) -> Result<BTreeMap<String, bool>, SettingsError> {
        Ok(self.get().await?.payment_methods.clone())
    }

    pub async fn is_donation_enabled(&self) -> Result<bool, SettingsError> {
        Ok(self.get().await?.donation_enabled)
    }

    async fn load(&self) -> Result<MediaDoctorSettings, SettingsError> {
        let stored = self.options.get(&self.option_name).await?;

        let Some(stored) = stored else {
            tracing::debug!(option = %self.option_name, "No stored settings, using defaults");
            return Ok(MediaDoctorSettings::default());
        };

        let (settings, rejected) = MediaDoctorSettings::from_stored(&stored);
        if !rejected.is_empty() {
            tracing::warn!(
                option = %self.option_name,
                keys = ?rejected,
                "Ignoring malformed stored settings"
            );
        }
        Ok(settings)
    }

    async fn persist(&self, settings: &MediaDoctorSettings) -> Result<(), SettingsError> {
        let value = serde_json::to_value(settings).map_err(StoreError::from)?;
        self.options.set(&self.option_name, &value).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryOptionStore;
    use serde_json::json;

    fn store() -> (Arc<MemoryOptionStore>, SettingsStore) {
        let options = Arc::new(MemoryOptionStore::new());
        let settings = SettingsStore::new(options.clone());
        (options, settings)
    }

    #[tokio::test]
    async fn test_defaults_when_empty() {
        let (_, settings) = store();
        let doc = settings.get().await.unwrap();
        assert_eq!(doc.compression_quality, 80);
        assert_eq!(doc.currency, "USD");
        assert!(doc.donation_enabled);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (_, settings) = store();
        let before = settings.get().await.unwrap();

        let update = SettingsUpdate {
            compression_quality: Some(95),
            currency: Some("EUR".to_string()),
            ..Default::default()
        };
        settings.set(&update).await.unwrap();

        let after = settings.get().await.unwrap();
        assert_eq!(after.compression_quality, 95);
        assert_eq!(after.currency, "EUR");

        let mut expected = (*before).clone();
        expected.compression_quality = 95;
        expected.currency = "EUR".to_string();
        assert_eq!(*after, expected);
    }

    #[tokio::test]
    async fn test_clamped_on_write() {
        let (_, settings) = store();

        settings
            .set(&SettingsUpdate { compression_quality: Some(150), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(settings.get().await.unwrap().compression_quality, 100);

        settings
            .set(&SettingsUpdate { compression_quality: Some(-5), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(settings.get().await.unwrap().compression_quality, 1);
    }

    #[tokio::test]
    async fn test_rejected_update_persists_nothing() {
        let (options, settings) = store();

        let update = SettingsUpdate {
            compression_quality: Some(50),
            video_quality: Some("8k".to_string()),
            ..Default::default()
        };
        let err = settings.set(&update).await.unwrap_err();
        assert!(matches!(err, SettingsError::Validation(_)));

        assert!(options.get(SETTINGS_OPTION).await.unwrap().is_none());
        assert_eq!(settings.get().await.unwrap().compression_quality, 80);
    }

    #[tokio::test]
    async fn test_cache_is_stable() {
        let (options, settings) = store();

        let first = settings.get().await.unwrap();
        let second = settings.get().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);

        // Out-of-band write is not seen until invalidation
        options.set(SETTINGS_OPTION, &json!({"currency": "KES"})).await.unwrap();
        assert_eq!(settings.get().await.unwrap().currency, "USD");

        settings.invalidate().await;
        assert_eq!(settings.get().await.unwrap().currency, "KES");
    }

    #[tokio::test]
    async fn test_zero_ttl_always_reloads() {
        let options = Arc::new(MemoryOptionStore::new());
        let settings = SettingsStore::with_options(options.clone(), SETTINGS_OPTION, Duration::ZERO);

        assert_eq!(settings.get().await.unwrap().currency, "USD");
        options.set(SETTINGS_OPTION, &json!({"currency": "UGX"})).await.unwrap();
        assert_eq!(settings.get().await.unwrap().currency, "UGX");
    }

    #[tokio::test]
    async fn test_initialize_only_once() {
        let (options, settings) = store();
        options.set(SETTINGS_OPTION, &json!({"currency": "TZS"})).await.unwrap();

        assert!(!settings.initialize().await.unwrap());
        assert_eq!(settings.get().await.unwrap().currency, "TZS");

        assert!(settings.delete().await.unwrap());
        assert!(settings.initialize().await.unwrap());
        let stored = options.get(SETTINGS_OPTION).await.unwrap().unwrap();
        assert_eq!(stored["compression_quality"], 80);
    }

    #[tokio::test]
    async fn test_partial_stored_document() {
        let (options, settings) = store();
        options
            .set(SETTINGS_OPTION, &json!({"donation_enabled": false, "payment_methods": {"mtn": true}}))
            .await
            .unwrap();

        let doc = settings.get().await.unwrap();
        assert!(!doc.donation_enabled);
        assert_eq!(doc.payment_methods.len(), 1);
        assert_eq!(doc.image_sizes.desktop.width, 1920);
        assert!(!settings.is_donation_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn test_reset() {
        let (_, settings) = store();
        settings
            .set(&SettingsUpdate { enable_logging: Some(false), ..Default::default() })
            .await
            .unwrap();

        let doc = settings.reset().await.unwrap();
        assert!(doc.enable_logging);
        assert!(settings.get().await.unwrap().enable_logging);
    }

    #[tokio::test]
    async fn test_unbounded_ttl_never_expires() {
        let options = Arc::new(MemoryOptionStore::new());
        let settings = SettingsStore::with_options(options.clone(), SETTINGS_OPTION, Duration::MAX);
        assert_eq!(settings.get().await.unwrap().compression_quality, 80);

        options
            .set(SETTINGS_OPTION, &json!({"compression_quality": 40}))
            .await
            .unwrap();
        assert_eq!(settings.get().await.unwrap().compression_quality, 80);

        settings.invalidate().await;
        assert_eq!(settings.get().await.unwrap().compression_quality, 40);
    }
}
