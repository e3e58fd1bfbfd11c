//! Media Doctor Plugin Entry Point

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::config::DoctorConfig;
use crate::handlers::{
    AdsHandler, MediaHandler, PaymentHandler, ReportsHandler, SettingsHandler, StatsHandler,
};
use crate::hooks::{events, HookRegistry};
use crate::services::{
    ActivityError, ActivityLog, AdService, MediaCatalog, MediaProcessor, MemoryCatalog,
    PaymentService, RenameService, SettingsError, SettingsStore,
};
use crate::store::{
    ActivityStore, AdStore, JsonFileAdStore, JsonFileOptionStore, JsonlActivityStore,
    JsonlPaymentStore, MemoryActivityStore, MemoryAdStore, MemoryOptionStore, MemoryPaymentStore,
    OptionStore, PaymentStore,
};

/// Storage backends the plugin is assembled from
pub struct PluginStores {
    pub options: Arc<dyn OptionStore>,
    pub activity: Arc<dyn ActivityStore>,
    pub payments: Arc<dyn PaymentStore>,
    pub ads: Arc<dyn AdStore>,
    pub catalog: Arc<dyn MediaCatalog>,
}

impl PluginStores {
    /// Everything in memory
    pub fn memory() -> Self {
        Self {
            options: Arc::new(MemoryOptionStore::new()),
            activity: Arc::new(MemoryActivityStore::new()),
            payments: Arc::new(MemoryPaymentStore::new()),
            ads: Arc::new(MemoryAdStore::new()),
            catalog: Arc::new(MemoryCatalog::new()),
        }
    }

    /// Stores implied by a config: everything on disk under the storage
    /// directory when one is set, memory otherwise
    pub fn from_config(config: &DoctorConfig) -> Self {
        match config.storage_dir {
            Some(ref dir) => Self::files(dir),
            None => Self::memory(),
        }
    }

    /// Settings, activity log, payment ledger and ads under `dir`
    pub fn files(dir: &Path) -> Self {
        Self {
            options: Arc::new(JsonFileOptionStore::new(dir)),
            activity: Arc::new(JsonlActivityStore::in_dir(dir)),
            payments: Arc::new(JsonlPaymentStore::in_dir(dir)),
            ads: Arc::new(JsonFileAdStore::in_dir(dir)),
            catalog: Arc::new(MemoryCatalog::new()),
        }
    }
}

/// Media Doctor Plugin
pub struct MediaDoctorPlugin {
    config: DoctorConfig,
    hooks: Arc<HookRegistry>,

    /// Services
    settings: Arc<SettingsStore>,
    activity: Arc<ActivityLog>,
    payments: Arc<PaymentService>,
    ads: Arc<AdService>,
    rename: Arc<RenameService>,
    processor: Arc<MediaProcessor>,

    /// Handlers
    settings_handler: Arc<SettingsHandler>,
    stats_handler: Arc<StatsHandler>,
    payment_handler: Arc<PaymentHandler>,
    media_handler: Arc<MediaHandler>,
    reports_handler: Arc<ReportsHandler>,
    ads_handler: Arc<AdsHandler>,
}

impl MediaDoctorPlugin {
    /// Create a plugin with in-memory storage
    pub fn new() -> Self {
        Self::with_config(DoctorConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(config: DoctorConfig) -> Self {
        let stores = PluginStores::from_config(&config);
        Self::with_stores(config, stores)
    }

    /// Create over caller-provided storage
    pub fn with_stores(config: DoctorConfig, stores: PluginStores) -> Self {
        let hooks = Arc::new(HookRegistry::new());

        // Create services
        let settings = Arc::new(SettingsStore::with_options(
            stores.options,
            config.option_name.clone(),
            config.settings_cache_ttl(),
        ));
        let activity = Arc::new(ActivityLog::new(stores.activity, Arc::clone(&settings)));
        let payments = Arc::new(PaymentService::new(
            stores.payments,
            Arc::clone(&settings),
            Arc::clone(&activity),
        ));
        let ads = Arc::new(AdService::new(stores.ads, Arc::clone(&settings)));
        let rename = Arc::new(RenameService::new(Arc::clone(&settings)));
        let processor = Arc::new(MediaProcessor::new(
            stores.catalog,
            Arc::clone(&settings),
            Arc::clone(&activity),
        ));

        // Create handlers
        let settings_handler = Arc::new(SettingsHandler::new(
            Arc::clone(&settings),
            Arc::clone(&activity),
            Arc::clone(&hooks),
        ));
        let stats_handler = Arc::new(StatsHandler::new(Arc::clone(&activity), Arc::clone(&hooks)));
        let payment_handler = Arc::new(PaymentHandler::new(Arc::clone(&payments), Arc::clone(&hooks)));
        let media_handler = Arc::new(MediaHandler::new(Arc::clone(&processor), Arc::clone(&hooks)));
        let reports_handler = Arc::new(ReportsHandler::new(Arc::clone(&activity), Arc::clone(&payments)));
        let ads_handler = Arc::new(AdsHandler::new(Arc::clone(&ads)));

        Self {
            config,
            hooks,
            settings,
            activity,
            payments,
            ads,
            rename,
            processor,
            settings_handler,
            stats_handler,
            payment_handler,
            media_handler,
            reports_handler,
            ads_handler,
        }
    }

    /// Plugin activation: write default settings when none exist
    pub async fn activate(&self) -> Result<bool, SettingsError> {
        let created = self.settings.initialize().await?;
        tracing::info!(created, option = %self.config.option_name, "Media Doctor activated");
        self.hooks.do_action(events::ACTIVATED, &json!({ "defaults_created": created }));
        Ok(created)
    }

    /// Plugin removal: drop the settings document and every log entry
    pub async fn uninstall(&self) -> Result<(), UninstallError> {
        self.settings.delete().await?;
        let removed = self.activity.clear().await?;
        tracing::info!(removed, "Media Doctor uninstalled");
        self.hooks.do_action(events::UNINSTALLED, &json!({ "entries_removed": removed }));
        Ok(())
    }

    /// Get plugin name
    pub fn name(&self) -> &'static str {
        "Simple Media Doctor"
    }

    /// Get plugin version
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    pub fn config(&self) -> &DoctorConfig {
        &self.config
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    // Service accessors
    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn activity(&self) -> &Arc<ActivityLog> {
        &self.activity
    }

    pub fn payments(&self) -> &Arc<PaymentService> {
        &self.payments
    }

    pub fn ads(&self) -> &Arc<AdService> {
        &self.ads
    }

    pub fn rename(&self) -> &Arc<RenameService> {
        &self.rename
    }

    pub fn processor(&self) -> &Arc<MediaProcessor> {
        &self.processor
    }

    // Handler accessors
    pub fn settings_handler(&self) -> &Arc<SettingsHandler> {
        &self.settings_handler
    }

    pub fn stats_handler(&self) -> &Arc<StatsHandler> {
        &self.stats_handler
    }

    pub fn payment_handler(&self) -> &Arc<PaymentHandler> {
        &self.payment_handler
    }

    pub fn media_handler(&self) -> &Arc<MediaHandler> {
        &self.media_handler
    }

    pub fn reports_handler(&self) -> &Arc<ReportsHandler> {
        &self.reports_handler
    }

    pub fn ads_handler(&self) -> &Arc<AdsHandler> {
        &self.ads_handler
    }

    // CLI commands for maintenance

    /// Delete activity older than the configured retention
    pub async fn prune_expired_logs(&self) -> Result<u64, ActivityError> {
        match Utc::now().checked_sub_signed(self.config.log_retention()) {
            Some(cutoff) => self.activity.prune(cutoff).await,
            None => Ok(0),
        }
    }

    /// Delete all activity
    pub async fn clear_logs(&self) -> Result<u64, ActivityError> {
        self.activity.clear().await
    }
}

impl Default for MediaDoctorPlugin {
    fn default() -> Self {
        Self::new()
    }
}

/// Uninstall error
#[derive(Debug, thiserror::Error)]
pub enum UninstallError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Activity log error: {0}")]
    Activity(#[from] ActivityError),
}

/// Plugin metadata for registration
pub fn plugin_info() -> PluginInfo {
    PluginInfo {
        name: "Simple Media Doctor",
        version: env!("CARGO_PKG_VERSION"),
        description: "Media settings, usage statistics and payments for RustPress",
        author: "RustPress Team",
        homepage: "https://rustpress.dev/plugins/mediadoctor",
        license: "MIT",
        dependencies: vec![],
        hooks: vec![
            events::ACTIVATED,
            events::UNINSTALLED,
            events::SETTINGS_UPDATED,
            events::MEDIA_PROCESSED,
            events::PAYMENT_COMPLETED,
            events::STATS_TRACKED,
        ],
        routes: vec![
            "/admin/media-doctor",
            "/admin/media-doctor/settings",
            "/admin/media-doctor/reports",
            "/admin/media-doctor/ads",
            "/ajax/smd_update_media",
            "/ajax/smd_compress_images",
            "/ajax/smd_track_stats",
            "/ajax/smd_process_payment",
        ],
    }
}

/// Plugin information
#[derive(Debug)]
pub struct PluginInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub author: &'static str,
    pub homepage: &'static str,
    pub license: &'static str,
    pub dependencies: Vec<&'static str>,
    pub hooks: Vec<&'static str>,
    pub routes: Vec<&'static str>,
}
