//! Settings Handlers
//!
//! The admin settings pages post one tab at a time. Checkboxes that are
//! absent from a posted tab mean "off".

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::json;

use crate::actor::{ActorContext, Capability};
use crate::error::{ApiError, ValidationError};
use crate::hooks::{events, HookRegistry};
use crate::models::actions;
use crate::services::{ActivityLog, SettingsStore};
use crate::settings::{ImageSizeUpdate, ImageSizes, MediaDoctorSettings, SettingsUpdate};

use super::{checkbox, field, parse_float, parse_int, require, respond, AjaxResponse, FormData};

/// Admin settings tab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsTab {
    General,
    Images,
    Audio,
    Video,
    Payments,
    Social,
    Ads,
}

impl FromStr for SettingsTab {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "general" => Ok(Self::General),
            "images" => Ok(Self::Images),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "payments" => Ok(Self::Payments),
            "social" => Ok(Self::Social),
            "ads" => Ok(Self::Ads),
            other => Err(ValidationError::new("tab", format!("unknown settings tab '{}'", other))),
        }
    }
}

/// Settings handler
pub struct SettingsHandler {
    settings: Arc<SettingsStore>,
    activity: Arc<ActivityLog>,
    hooks: Arc<HookRegistry>,
}

impl SettingsHandler {
    pub fn new(settings: Arc<SettingsStore>, activity: Arc<ActivityLog>, hooks: Arc<HookRegistry>) -> Self {
        Self {
            settings,
            activity,
            hooks,
        }
    }

    /// Current settings document
    pub async fn get(&self, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_get(actor).await)
    }

    /// Save one posted settings tab
    pub async fn save_tab(&self, tab: &str, form: &FormData, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_save_tab(tab, form, actor).await)
    }

    /// Save a JSON partial update
    pub async fn update(&self, update: &SettingsUpdate, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_update(update, actor).await)
    }

    /// Restore defaults
    pub async fn reset(&self, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_reset(actor).await)
    }

    async fn try_get(&self, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::ManageOptions)?;
        let settings = self.settings.get().await?;
        let data = serde_json::to_value(&*settings).map_err(|e| ApiError::Internal(e.into()))?;
        Ok(AjaxResponse::with_data("Settings loaded", data))
    }

    async fn try_save_tab(&self, tab: &str, form: &FormData, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::ManageOptions)?;
        let tab: SettingsTab = tab.parse()?;
        let current = self.settings.get().await?;
        let update = parse_form(tab, form, &current)?;
        self.apply(&update, actor).await
    }

    async fn try_update(&self, update: &SettingsUpdate, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::ManageOptions)?;
        self.apply(update, actor).await
    }

    async fn try_reset(&self, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::ManageOptions)?;
        self.settings.reset().await?;
        self.announce(&["*"], actor).await;
        Ok(AjaxResponse::ok("Settings reset to defaults"))
    }

    async fn apply(&self, update: &SettingsUpdate, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        if update.is_empty() {
            return Ok(AjaxResponse::ok("Nothing to save"));
        }

        self.settings.set(update).await?;
        self.announce(&update.touched_fields(), actor).await;
        Ok(AjaxResponse::ok("Settings saved successfully!"))
    }

    async fn announce(&self, fields: &[&str], actor: &ActorContext) {
        let payload = json!({ "fields": fields });
        self.activity.record(actions::SETTINGS_UPDATED, payload.clone(), actor).await;
        self.hooks.do_action(events::SETTINGS_UPDATED, &payload);
    }
}

/// Translate a posted tab into an update.
///
/// Method and platform fields are read for the names already configured,
/// so `current` decides which keys the form is expected to carry.
pub fn parse_form(
    tab: SettingsTab,
    form: &FormData,
    current: &MediaDoctorSettings,
) -> Result<SettingsUpdate, ValidationError> {
    let text = |name: &str| Some(form.get(name).map(|v| v.trim().to_string()).unwrap_or_default());

    let mut update = SettingsUpdate::default();
    match tab {
        SettingsTab::General => {
            update.auto_rename = field(form, "auto_rename").map(String::from);
            update.max_upload_size = parse_int(form, "max_upload_size")?;
            update.backup_original_files = Some(checkbox(form, "backup_original_files"));
            update.auto_optimize = Some(checkbox(form, "auto_optimize"));
            update.enable_logging = Some(checkbox(form, "enable_logging"));
            update.donation_enabled = Some(checkbox(form, "donation_enabled"));
            update.advertisements_enabled = Some(checkbox(form, "advertisements_enabled"));
        }
        SettingsTab::Images => {
            let mut sizes = BTreeMap::new();
            for name in ImageSizes::NAMES {
                let width = parse_int(form, &format!("{}_width", name))?;
                let height = parse_int(form, &format!("{}_height", name))?;
                if let (Some(width), Some(height)) = (width, height) {
                    let crop_key = format!("{}_crop", name);
                    let crop = form.contains_key(&crop_key).then(|| checkbox(form, &crop_key));
                    sizes.insert(name.to_string(), ImageSizeUpdate { width, height, crop });
                }
            }
            if !sizes.is_empty() {
                update.image_sizes = Some(sizes);
            }
            update.compression_quality = parse_int(form, "compression_quality")?;
        }
        SettingsTab::Audio => {
            update.audio_low_quality_size = parse_float(form, "audio_low_quality_size")?;
            update.audio_watermark = text("audio_watermark");
            update.audio_jingle = text("audio_jingle");
        }
        SettingsTab::Video => {
            update.video_quality = field(form, "video_quality").map(String::from);
            update.video_watermark = text("video_watermark");
        }
        SettingsTab::Payments => {
            let methods = current
                .payment_methods
                .keys()
                .map(|name| (name.clone(), checkbox(form, &format!("{}_enabled", name))))
                .collect();
            update.payment_methods = Some(methods);
            update.donation_enabled = Some(checkbox(form, "donation_enabled"));
            update.paypal_client_id = text("paypal_client_id");
            update.stripe_publishable_key = text("stripe_publishable_key");
            update.currency = field(form, "currency").map(String::from);
        }
        SettingsTab::Social => {
            let accounts = current
                .social_accounts
                .keys()
                .map(|platform| {
                    let value = form.get(&format!("{}_url", platform)).map(|v| v.trim().to_string());
                    (platform.clone(), value.unwrap_or_default())
                })
                .collect();
            update.social_accounts = Some(accounts);
        }
        SettingsTab::Ads => {
            update.advertisements_enabled = Some(checkbox(form, "advertisements_enabled"));
        }
    }

    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityFilter;
    use crate::settings::VideoQuality;
    use crate::store::{MemoryActivityStore, MemoryOptionStore};

    fn form(pairs: &[(&str, &str)]) -> FormData {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn handler() -> (Arc<SettingsStore>, Arc<ActivityLog>, SettingsHandler) {
        let settings = Arc::new(SettingsStore::new(Arc::new(MemoryOptionStore::new())));
        let activity = Arc::new(ActivityLog::new(
            Arc::new(MemoryActivityStore::new()),
            Arc::clone(&settings),
        ));
        let handler = SettingsHandler::new(
            Arc::clone(&settings),
            Arc::clone(&activity),
            Arc::new(HookRegistry::new()),
        );
        (settings, activity, handler)
    }

    #[tokio::test]
    async fn test_requires_manage_options() {
        let (settings, _, handler) = handler();
        let f = form(&[("compression_quality", "50"), ("desktop_width", "800"), ("desktop_height", "600")]);

        let response = handler.save_tab("images", &f, &ActorContext::user(3, vec![])).await;
        assert!(!response.success);
        assert_eq!(settings.get().await.unwrap().compression_quality, 80);
    }

    #[tokio::test]
    async fn test_save_images_tab() {
        let (settings, activity, handler) = handler();
        let f = form(&[
            ("desktop_width", "1600"),
            ("desktop_height", "900"),
            ("mobile_width", "0"),
            ("mobile_height", "0"),
            ("compression_quality", "250"),
        ]);

        let response = handler.save_tab("images", &f, &ActorContext::system()).await;
        assert!(response.success, "{}", response.message);

        let doc = settings.get().await.unwrap();
        assert_eq!((doc.image_sizes.desktop.width, doc.image_sizes.desktop.height), (1600, 900));
        assert_eq!(doc.image_sizes.mobile.width, 1);
        assert_eq!(doc.image_sizes.custom.width, 1200);
        assert_eq!(doc.compression_quality, 100);

        let logged = activity.count(&ActivityFilter::action(actions::SETTINGS_UPDATED)).await.unwrap();
        assert_eq!(logged, 1);
    }

    #[tokio::test]
    async fn test_non_numeric_rejected() {
        let (settings, _, handler) = handler();
        let f = form(&[("compression_quality", "high")]);

        let response = handler.save_tab("images", &f, &ActorContext::system()).await;
        assert!(!response.success);
        assert_eq!(response.data.unwrap()["field"], "compression_quality");
        assert_eq!(settings.get().await.unwrap().compression_quality, 80);
    }

    #[tokio::test]
    async fn test_general_tab_checkboxes() {
        let (settings, _, handler) = handler();
        let f = form(&[("auto_rename", "date"), ("enable_logging", "1"), ("donation_enabled", "1")]);

        assert!(handler.save_tab("general", &f, &ActorContext::system()).await.success);

        let doc = settings.get().await.unwrap();
        assert_eq!(doc.auto_rename, crate::settings::AutoRename::Date);
        assert!(doc.donation_enabled);
        assert!(!doc.advertisements_enabled);
        assert!(!doc.backup_original_files);
    }

    #[test]
    fn test_payments_and_social_forms() {
        let current = MediaDoctorSettings::default();

        let f = form(&[("mtn_enabled", "1"), ("currency", "ugx")]);
        let update = parse_form(SettingsTab::Payments, &f, &current).unwrap();
        let methods = update.payment_methods.unwrap();
        assert_eq!(methods.get("mtn"), Some(&true));
        assert_eq!(methods.get("airtel"), Some(&false));
        assert_eq!(update.currency.as_deref(), Some("ugx"));

        let f = form(&[("youtube_url", "https://youtube.com/@doctor")]);
        let update = parse_form(SettingsTab::Social, &f, &current).unwrap();
        let accounts = update.social_accounts.unwrap();
        assert_eq!(accounts["youtube"], "https://youtube.com/@doctor");
        assert_eq!(accounts["facebook"], "");
    }

    #[tokio::test]
    async fn test_bad_url_rejects_whole_tab() {
        let (settings, _, handler) = handler();
        let f = form(&[("facebook_url", "https://facebook.com/doctor"), ("tiktok_url", "not a url")]);

        assert!(!handler.save_tab("social", &f, &ActorContext::system()).await.success);
        assert!(settings.social_links().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_video_tab_and_unknown_tab() {
        let (settings, _, handler) = handler();

        let f = form(&[("video_quality", "1080p")]);
        assert!(handler.save_tab("video", &f, &ActorContext::system()).await.success);
        assert_eq!(settings.get().await.unwrap().video_quality, VideoQuality::P1080);

        assert!(!handler.save_tab("seo", &f, &ActorContext::system()).await.success);
    }

    #[tokio::test]
    async fn test_get_and_reset() {
        let (_, _, handler) = handler();
        let response = handler.get(&ActorContext::system()).await;
        assert_eq!(response.data.unwrap()["currency"], "USD");

        assert!(handler.reset(&ActorContext::system()).await.success);
        assert!(!handler.reset(&ActorContext::anonymous()).await.success);
    }
}
