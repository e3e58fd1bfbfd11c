//! Media Doctor - Media Settings, Statistics and Payments Plugin for RustPress
//!
//! Media Doctor keeps one settings document per installation and an
//! append-only activity log of what visitors do with media:
//!
//! - **Settings**: typed, default-merged, cached, validated on write
//! - **Activity Log**: plays, downloads and admin actions with actor and IP
//! - **Payments**: simulated purchases and donations in a separate ledger
//! - **Media Processing**: auto-rename, size variants and recompression
//! - **Advertisements**: scheduled ads per player placement
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mediadoctor::{ActorContext, MediaDoctorPlugin, SettingsUpdate};
//!
//! #[tokio::main]
//! async fn main() {
//!     let plugin = MediaDoctorPlugin::new();
//!     plugin.activate().await.expect("Failed to activate");
//!
//!     // Change a setting
//!     let update = SettingsUpdate {
//!         compression_quality: Some(90),
//!         ..Default::default()
//!     };
//!     plugin.settings().set(&update).await.unwrap();
//!
//!     // Record a play
//!     let actor = ActorContext::anonymous();
//!     plugin
//!         .activity()
//!         .record("audio_play", serde_json::json!({"media_id": 12}), &actor)
//!         .await;
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! use mediadoctor::{DoctorConfig, MediaDoctorPlugin};
//!
//! let mut config = DoctorConfig::default();
//! config.storage_dir = Some("wp-content/options".into());
//! config.log_retention_days = 30;
//!
//! let plugin = MediaDoctorPlugin::with_config(config);
//! ```

pub mod actor;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod models;
pub mod plugin;
pub mod services;
pub mod settings;
pub mod store;

// Re-exports
pub use actor::{ActorContext, AuthenticatedUser, Capability};
pub use config::{ConfigError, DoctorConfig};
pub use error::{ApiError, StoreError, ValidationError};

pub use models::{
    ActionCount, ActivityEntry, ActivityFilter, AdStatus, Advertisement, Attachment,
    CurrencyTotal, MediaOperation, MediaType, NewAdvertisement, PaymentPurpose, PaymentRecord,
    PaymentRequest, PaymentStatus, ProcessingOutcome,
};

pub use services::{
    ActivityLog, AdService, ImageService, MediaCatalog, MediaProcessor, MemoryCatalog,
    PaymentService, RenameService, SettingsStore,
};

pub use handlers::{
    AdsHandler, AjaxResponse, MediaHandler, PaymentHandler, ReportsHandler, SettingsHandler,
    StatsHandler,
};

pub use hooks::HookRegistry;
pub use settings::{AutoRename, MediaDoctorSettings, SettingsUpdate, VideoQuality};
pub use plugin::{plugin_info, MediaDoctorPlugin, PluginInfo, PluginStores};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the plugin with in-memory storage
pub fn init() -> MediaDoctorPlugin {
    MediaDoctorPlugin::new()
}

/// Initialize with custom configuration
pub fn init_with_config(config: DoctorConfig) -> MediaDoctorPlugin {
    MediaDoctorPlugin::with_config(config)
}
