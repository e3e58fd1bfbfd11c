//! Rename Service
//!
//! Applies the configured auto-rename policy to uploaded file names.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::{extension_of, sanitize_title};
use crate::settings::AutoRename;

use super::settings::{SettingsError, SettingsStore};

/// What is known about an upload when it is renamed
#[derive(Debug, Clone)]
pub struct RenameContext {
    /// Title of the post the file is attached to
    pub post_title: Option<String>,
    /// Name supplied through the custom field
    pub custom_name: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl Default for RenameContext {
    fn default() -> Self {
        Self {
            post_title: None,
            custom_name: None,
            uploaded_at: Utc::now(),
        }
    }
}

/// Rename service
pub struct RenameService {
    settings: Arc<SettingsStore>,
}

impl RenameService {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        Self { settings }
    }

    /// Final file name for an upload under the configured policy
    pub async fn rename_upload(
        &self,
        filename: &str,
        context: &RenameContext,
    ) -> Result<String, SettingsError> {
        let policy = self.settings.get().await?.auto_rename;
        let renamed = apply_policy(policy, filename, context);

        if renamed != filename {
            tracing::debug!(from = %filename, to = %renamed, policy = %policy, "Upload renamed");
        }

        Ok(renamed)
    }
}

/// Apply a rename policy. Falls back to the original name whenever the
/// policy has nothing usable to work with.
pub fn apply_policy(policy: AutoRename, filename: &str, context: &RenameContext) -> String {
    let stem = match policy {
        AutoRename::None => return filename.to_string(),
        AutoRename::PostTitle => context.post_title.as_deref().map(sanitize_title),
        AutoRename::CustomField => context.custom_name.as_deref().map(sanitize_title),
        AutoRename::Date => Some(context.uploaded_at.format("%Y%m%d-%H%M%S").to_string()),
    };

    match stem.filter(|s| !s.is_empty()) {
        Some(stem) => with_extension(&stem, filename),
        None => filename.to_string(),
    }
}

fn with_extension(stem: &str, original: &str) -> String {
    match extension_of(original) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    }
}
