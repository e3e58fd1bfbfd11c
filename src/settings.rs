//! Media Doctor Settings
//!
//! The single configuration document, its defaults, and the validated
//! partial update applied by the settings store.
//!
//! Numeric fields are clamped into range. Anything structurally wrong
//! (unknown enum value, malformed URL, bad currency code, unknown size or
//! method name) rejects the whole update.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Lowest accepted compression quality
pub const MIN_QUALITY: u8 = 1;
/// Highest accepted compression quality
pub const MAX_QUALITY: u8 = 100;
/// Floor for the low-quality audio threshold, in megabytes
pub const MIN_AUDIO_SIZE_MB: f64 = 0.1;

static KEY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]{1,64}$").expect("key name pattern"));

/// Upload auto-rename policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AutoRename {
    /// Rename to the slug of the parent post's title
    #[default]
    PostTitle,
    /// Rename to a caller-supplied custom name
    CustomField,
    /// Rename to the upload timestamp
    Date,
    /// Keep the uploaded name
    None,
}

impl FromStr for AutoRename {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "post_title" => Ok(Self::PostTitle),
            "custom_field" => Ok(Self::CustomField),
            "date" => Ok(Self::Date),
            "none" => Ok(Self::None),
            other => Err(ValidationError::new(
                "auto_rename",
                format!("unknown rename policy '{}'", other),
            )),
        }
    }
}

impl fmt::Display for AutoRename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PostTitle => write!(f, "post_title"),
            Self::CustomField => write!(f, "custom_field"),
            Self::Date => write!(f, "date"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Target video quality
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum VideoQuality {
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "4k")]
    Uhd4k,
}

impl VideoQuality {
    /// Vertical resolution in pixels
    pub fn height(&self) -> u32 {
        match self {
            Self::P360 => 360,
            Self::P480 => 480,
            Self::P720 => 720,
            Self::P1080 => 1080,
            Self::Uhd4k => 2160,
        }
    }
}

impl FromStr for VideoQuality {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "360p" => Ok(Self::P360),
            "480p" => Ok(Self::P480),
            "720p" => Ok(Self::P720),
            "1080p" => Ok(Self::P1080),
            "4k" => Ok(Self::Uhd4k),
            other => Err(ValidationError::new(
                "video_quality",
                format!("unknown video quality '{}'", other),
            )),
        }
    }
}

impl fmt::Display for VideoQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::P360 => write!(f, "360p"),
            Self::P480 => write!(f, "480p"),
            Self::P720 => write!(f, "720p"),
            Self::P1080 => write!(f, "1080p"),
            Self::Uhd4k => write!(f, "4k"),
        }
    }
}

/// One resize target
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSize {
    /// Width in pixels (at least 1)
    pub width: u32,
    /// Height in pixels (at least 1)
    pub height: u32,
    /// Crop to exact dimensions instead of fitting
    #[serde(default = "default_crop")]
    pub crop: bool,
}

fn default_crop() -> bool {
    true
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            crop: true,
        }
    }
}

/// Named resize targets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSizes {
    #[serde(default = "default_desktop_size")]
    pub desktop: ImageSize,
    #[serde(default = "default_mobile_size")]
    pub mobile: ImageSize,
    #[serde(default = "default_custom_size")]
    pub custom: ImageSize,
}

fn default_desktop_size() -> ImageSize {
    ImageSize::new(1920, 1080)
}

fn default_mobile_size() -> ImageSize {
    ImageSize::new(768, 432)
}

fn default_custom_size() -> ImageSize {
    ImageSize::new(1200, 675)
}

impl Default for ImageSizes {
    fn default() -> Self {
        Self {
            desktop: default_desktop_size(),
            mobile: default_mobile_size(),
            custom: default_custom_size(),
        }
    }
}

impl ImageSizes {
    /// Size names in processing order
    pub const NAMES: [&'static str; 3] = ["desktop", "mobile", "custom"];

    /// Iterate `(name, size)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ImageSize)> {
        [
            ("desktop", &self.desktop),
            ("mobile", &self.mobile),
            ("custom", &self.custom),
        ]
        .into_iter()
    }

    pub fn get(&self, name: &str) -> Option<&ImageSize> {
        match name {
            "desktop" => Some(&self.desktop),
            "mobile" => Some(&self.mobile),
            "custom" => Some(&self.custom),
            _ => None,
        }
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut ImageSize> {
        match name {
            "desktop" => Some(&mut self.desktop),
            "mobile" => Some(&mut self.mobile),
            "custom" => Some(&mut self.custom),
            _ => None,
        }
    }
}

/// The plugin configuration document
///
/// Always fully populated: missing keys in stored data are backfilled from
/// [`MediaDoctorSettings::default`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MediaDoctorSettings {
    // Uploads
    /// Rename policy applied on upload
    pub auto_rename: AutoRename,
    /// Maximum upload size in megabytes
    pub max_upload_size: u32,
    /// Accepted MIME types
    pub allowed_mime_types: BTreeSet<String>,
    /// Keep a copy of originals before compression
    pub backup_original_files: bool,
    /// Resize and recompress new uploads (`MediaProcessor::optimize_upload`)
    pub auto_optimize: bool,

    // Images
    /// Resize targets
    pub image_sizes: ImageSizes,
    /// Compression quality (1-100)
    pub compression_quality: u8,

    // Audio
    /// Files above this size (MB) get the low-quality rendition
    pub audio_low_quality_size: f64,
    pub audio_watermark: Option<String>,
    pub audio_jingle: Option<String>,

    // Video
    pub video_quality: VideoQuality,
    pub video_watermark: Option<String>,

    // Social
    /// Platform name to profile URL
    pub social_accounts: BTreeMap<String, Option<String>>,

    // Payments
    /// Payment method name to enabled flag
    pub payment_methods: BTreeMap<String, bool>,
    pub donation_enabled: bool,
    pub paypal_client_id: String,
    pub stripe_publishable_key: String,
    /// ISO-4217 style currency code
    pub currency: String,

    // Misc
    pub advertisements_enabled: bool,
    /// Record activity log entries
    pub enable_logging: bool,
}

impl Default for MediaDoctorSettings {
    fn default() -> Self {
        let social_accounts = ["facebook", "twitter", "instagram", "youtube", "tiktok"]
            .into_iter()
            .map(|p| (p.to_string(), None))
            .collect();

        let payment_methods = ["mtn", "airtel", "credit_card"]
            .into_iter()
            .map(|m| (m.to_string(), true))
            .collect();

        let allowed_mime_types = [
            // Images
            "image/jpeg",
            "image/png",
            "image/gif",
            "image/webp",
            // Audio
            "audio/mpeg",
            "audio/ogg",
            "audio/wav",
            "audio/mp4",
            // Video
            "video/mp4",
            "video/webm",
            "video/ogg",
            // Documents
            "application/pdf",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            auto_rename: AutoRename::PostTitle,
            max_upload_size: 64,
            allowed_mime_types,
            backup_original_files: true,
            auto_optimize: true,

            image_sizes: ImageSizes::default(),
            compression_quality: 80,

            audio_low_quality_size: 1.5,
            audio_watermark: None,
            audio_jingle: None,

            video_quality: VideoQuality::P720,
            video_watermark: None,

            social_accounts,

            payment_methods,
            donation_enabled: true,
            paypal_client_id: String::new(),
            stripe_publishable_key: String::new(),
            currency: "USD".to_string(),

            advertisements_enabled: true,
            enable_logging: true,
        }
    }
}

/// Bring stored integers into their field's range before they are typed,
/// so a quality of 300 clamps to 100 instead of overflowing `u8`
fn clamp_stored_integers(key: &str, value: &mut serde_json::Value) {
    match key {
        "compression_quality" => {
            clamp_integer(value, i64::from(MIN_QUALITY), i64::from(MAX_QUALITY));
        }
        "max_upload_size" => clamp_integer(value, 1, i64::from(u32::MAX)),
        "image_sizes" => {
            let Some(sizes) = value.as_object_mut() else {
                return;
            };
            for size in sizes.values_mut().filter_map(serde_json::Value::as_object_mut) {
                for dimension in ["width", "height"] {
                    if let Some(v) = size.get_mut(dimension) {
                        clamp_integer(v, 1, i64::from(u32::MAX));
                    }
                }
            }
        }
        _ => {}
    }
}

fn clamp_integer(value: &mut serde_json::Value, min: i64, max: i64) {
    let n = match (value.as_i64(), value.as_u64()) {
        (Some(n), _) => n,
        (None, Some(_)) => i64::MAX,
        _ => return,
    };
    *value = serde_json::Value::from(n.clamp(min, max));
}

impl MediaDoctorSettings {
    /// Build a document from a stored blob, key by key over the defaults.
    ///
    /// Stored keys win. A key whose stored value has the wrong shape is
    /// dropped (the default stays) and reported in the returned list.
    pub fn from_stored(stored: &serde_json::Value) -> (Self, Vec<String>) {
        let defaults = Self::default();
        let mut rejected = Vec::new();

        let Some(stored) = stored.as_object() else {
            if !stored.is_null() {
                rejected.push("<document>".to_string());
            }
            return (defaults, rejected);
        };

        let mut merged = match serde_json::to_value(&defaults) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return (defaults, rejected),
        };

        for (key, value) in stored {
            if !merged.contains_key(key) {
                // Keys from older versions are ignored
                continue;
            }

            let mut value = value.clone();
            clamp_stored_integers(key, &mut value);

            // Fields deserialize independently, so one key checked alone
            // over the defaults decides whether it survives the merge
            let mut single = serde_json::Map::with_capacity(1);
            single.insert(key.clone(), value.clone());
            if serde_json::from_value::<Self>(serde_json::Value::Object(single)).is_ok() {
                merged.insert(key.clone(), value);
            } else {
                rejected.push(key.clone());
            }
        }

        let mut settings = serde_json::from_value::<Self>(serde_json::Value::Object(merged))
            .unwrap_or(defaults);
        settings.normalize();
        (settings, rejected)
    }

    /// Clamp numeric fields and drop values that would fail validation.
    pub fn normalize(&mut self) {
        self.compression_quality = self.compression_quality.clamp(MIN_QUALITY, MAX_QUALITY);
        self.max_upload_size = self.max_upload_size.max(1);

        for name in ImageSizes::NAMES {
            if let Some(size) = self.image_sizes.get_mut(name) {
                size.width = size.width.max(1);
                size.height = size.height.max(1);
            }
        }

        if !self.audio_low_quality_size.is_finite() {
            self.audio_low_quality_size = Self::default().audio_low_quality_size;
        }
        self.audio_low_quality_size = self.audio_low_quality_size.max(MIN_AUDIO_SIZE_MB);

        match parse_currency(&self.currency) {
            Ok(code) => self.currency = code,
            Err(_) => self.currency = Self::default().currency,
        }

        for url in [
            &mut self.audio_watermark,
            &mut self.audio_jingle,
            &mut self.video_watermark,
        ] {
            if let Some(value) = url.as_deref() {
                *url = parse_url("url", value).ok().flatten();
            }
        }
        for url in self.social_accounts.values_mut() {
            if let Some(value) = url.as_deref() {
                *url = parse_url("social_accounts", value).ok().flatten();
            }
        }
    }

    /// Maximum upload size in bytes
    pub fn max_upload_bytes(&self) -> u64 {
        u64::from(self.max_upload_size) * 1024 * 1024
    }

    /// Check if MIME type is allowed
    pub fn is_mime_type_allowed(&self, mime: &str) -> bool {
        self.allowed_mime_types.contains(&mime.to_lowercase())
    }

    /// Check if a payment method is enabled
    pub fn is_payment_method_enabled(&self, method: &str) -> bool {
        self.payment_methods.get(method).copied().unwrap_or(false)
    }

    /// Names of the enabled payment methods
    pub fn enabled_payment_methods(&self) -> Vec<&str> {
        self.payment_methods
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Social links that are actually set
    pub fn social_links(&self) -> BTreeMap<String, String> {
        self.social_accounts
            .iter()
            .filter_map(|(platform, url)| url.clone().map(|u| (platform.clone(), u)))
            .collect()
    }
}

/// Image size change from a settings form
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct ImageSizeUpdate {
    pub width: i64,
    pub height: i64,
    pub crop: Option<bool>,
}

/// Partial settings change
///
/// Every `None` field is left untouched. URL and string fields use an empty
/// string to clear the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsUpdate {
    pub auto_rename: Option<String>,
    pub max_upload_size: Option<i64>,
    pub allowed_mime_types: Option<Vec<String>>,
    pub backup_original_files: Option<bool>,
    pub auto_optimize: Option<bool>,
    pub image_sizes: Option<BTreeMap<String, ImageSizeUpdate>>,
    pub compression_quality: Option<i64>,
    pub audio_low_quality_size: Option<f64>,
    pub audio_watermark: Option<String>,
    pub audio_jingle: Option<String>,
    pub video_quality: Option<String>,
    pub video_watermark: Option<String>,
    pub social_accounts: Option<BTreeMap<String, String>>,
    pub payment_methods: Option<BTreeMap<String, bool>>,
    pub donation_enabled: Option<bool>,
    pub paypal_client_id: Option<String>,
    pub stripe_publishable_key: Option<String>,
    pub currency: Option<String>,
    pub advertisements_enabled: Option<bool>,
    pub enable_logging: Option<bool>,
}

impl SettingsUpdate {
    /// True when no field is touched
    pub fn is_empty(&self) -> bool {
        self.touched_fields().is_empty()
    }

    /// Names of the fields this update touches
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        macro_rules! touched {
            ($($name:ident),*) => {
                $(if self.$name.is_some() { fields.push(stringify!($name)); })*
            };
        }
        touched!(
            auto_rename,
            max_upload_size,
            allowed_mime_types,
            backup_original_files,
            auto_optimize,
            image_sizes,
            compression_quality,
            audio_low_quality_size,
            audio_watermark,
            audio_jingle,
            video_quality,
            video_watermark,
            social_accounts,
            payment_methods,
            donation_enabled,
            paypal_client_id,
            stripe_publishable_key,
            currency,
            advertisements_enabled,
            enable_logging
        );
        fields
    }

    /// Validate and merge into a copy of `current`.
    ///
    /// Returns the first structural error; `current` is never modified.
    pub fn apply_to(
        &self,
        current: &MediaDoctorSettings,
    ) -> Result<MediaDoctorSettings, ValidationError> {
        let mut next = current.clone();

        if let Some(ref policy) = self.auto_rename {
            next.auto_rename = policy.parse()?;
        }
        if let Some(size) = self.max_upload_size {
            next.max_upload_size = clamp_u32(size, 1);
        }
        if let Some(ref types) = self.allowed_mime_types {
            next.allowed_mime_types = types
                .iter()
                .map(|t| parse_mime_type(t))
                .collect::<Result<_, _>>()?;
        }
        if let Some(v) = self.backup_original_files {
            next.backup_original_files = v;
        }
        if let Some(v) = self.auto_optimize {
            next.auto_optimize = v;
        }

        if let Some(ref sizes) = self.image_sizes {
            for (name, update) in sizes {
                let size = next.image_sizes.get_mut(name).ok_or_else(|| {
                    ValidationError::new("image_sizes", format!("unknown size '{}'", name))
                })?;
                size.width = clamp_u32(update.width, 1);
                size.height = clamp_u32(update.height, 1);
                if let Some(crop) = update.crop {
                    size.crop = crop;
                }
            }
        }
        if let Some(q) = self.compression_quality {
            next.compression_quality = q.clamp(MIN_QUALITY as i64, MAX_QUALITY as i64) as u8;
        }

        if let Some(mb) = self.audio_low_quality_size {
            if !mb.is_finite() {
                return Err(ValidationError::new(
                    "audio_low_quality_size",
                    "must be a number",
                ));
            }
            next.audio_low_quality_size = mb.max(MIN_AUDIO_SIZE_MB);
        }
        if let Some(ref url) = self.audio_watermark {
            next.audio_watermark = parse_url("audio_watermark", url)?;
        }
        if let Some(ref url) = self.audio_jingle {
            next.audio_jingle = parse_url("audio_jingle", url)?;
        }

        if let Some(ref quality) = self.video_quality {
            next.video_quality = quality.parse()?;
        }
        if let Some(ref url) = self.video_watermark {
            next.video_watermark = parse_url("video_watermark", url)?;
        }

        if let Some(ref accounts) = self.social_accounts {
            for (platform, url) in accounts {
                check_key_name("social_accounts", platform)?;
                let url = parse_url("social_accounts", url)?;
                next.social_accounts.insert(platform.clone(), url);
            }
        }

        if let Some(ref methods) = self.payment_methods {
            for (method, enabled) in methods {
                check_key_name("payment_methods", method)?;
                next.payment_methods.insert(method.clone(), *enabled);
            }
        }
        if let Some(v) = self.donation_enabled {
            next.donation_enabled = v;
        }
        if let Some(ref id) = self.paypal_client_id {
            next.paypal_client_id = sanitize_text(id);
        }
        if let Some(ref key) = self.stripe_publishable_key {
            next.stripe_publishable_key = sanitize_text(key);
        }
        if let Some(ref code) = self.currency {
            next.currency = parse_currency(code)?;
        }

        if let Some(v) = self.advertisements_enabled {
            next.advertisements_enabled = v;
        }
        if let Some(v) = self.enable_logging {
            next.enable_logging = v;
        }

        Ok(next)
    }
}

fn clamp_u32(value: i64, min: u32) -> u32 {
    value.clamp(i64::from(min), i64::from(u32::MAX)) as u32
}

/// Trim and strip control characters, like a text-field sanitizer
pub fn sanitize_text(value: &str) -> String {
    value.trim().chars().filter(|c| !c.is_control()).collect()
}

/// Validate a 3-letter currency code, returning it uppercased
pub fn parse_currency(code: &str) -> Result<String, ValidationError> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(ValidationError::new(
            "currency",
            format!("'{}' is not a 3-letter currency code", code),
        ))
    }
}

/// Validate an optional http(s) URL; blank clears the value
pub fn parse_url(field: &str, value: &str) -> Result<Option<String>, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let parsed = url::Url::parse(value)
        .map_err(|e| ValidationError::new(field, format!("invalid URL '{}': {}", value, e)))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(Some(parsed.to_string())),
        _ => Err(ValidationError::new(
            field,
            format!("'{}' must be an http(s) URL", value),
        )),
    }
}

fn parse_mime_type(value: &str) -> Result<String, ValidationError> {
    let value = value.trim().to_lowercase();
    match value.parse::<mime::Mime>() {
        Ok(m) if m.params().next().is_none() => Ok(m.essence_str().to_string()),
        _ => Err(ValidationError::new(
            "allowed_mime_types",
            format!("'{}' is not a MIME type", value),
        )),
    }
}

fn check_key_name(field: &str, name: &str) -> Result<(), ValidationError> {
    if KEY_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            format!("'{}' is not a valid name", name),
        ))
    }
}
