//! Media Doctor Services
//!
//! Settings, activity, payments and media processing.

pub mod activity;
pub mod ads;
pub mod image;
pub mod media;
pub mod payment;
pub mod rename;
pub mod settings;

pub use activity::{ActivityError, ActivityLog, MAX_QUERY_LIMIT};
pub use ads::{AdError, AdService};
pub use image::{ImageError, ImageService};
pub use media::{MediaCatalog, MediaError, MediaProcessor, MemoryCatalog};
pub use payment::{PaymentError, PaymentService};
pub use rename::{RenameContext, RenameService};
pub use settings::{SettingsError, SettingsStore, DEFAULT_CACHE_TTL, SETTINGS_OPTION};
