//! Media Service
//!
//! Admin media actions (rename, resize, compress) over attachments owned by
//! the host CMS, plus upload checks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::RwLock;

use crate::actor::ActorContext;
use crate::models::{actions, format_bytes, Attachment, MediaOperation, ProcessingOutcome};

use super::activity::ActivityLog;
use super::image::{ImageError, ImageService, OutputFormat};
use super::rename::{apply_policy, RenameContext};
use super::settings::{SettingsError, SettingsStore};

/// Suffix of the backup copy written before compression
pub const BACKUP_SUFFIX: &str = ".orig";

/// Media service error
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] anyhow::Error),
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Upload rejected: {0}")]
    Rejected(String),
}

/// Attachment records of the host CMS
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// Look up an attachment; `None` when it does not exist
    async fn attachment(&self, id: u64) -> anyhow::Result<Option<Attachment>>;

    /// Title of a post
    async fn post_title(&self, post_id: u64) -> anyhow::Result<Option<String>>;

    /// Point an attachment at its renamed file
    async fn rename_attachment(&self, id: u64, path: &Path) -> anyhow::Result<()>;
}

/// In-memory catalog
#[derive(Default)]
pub struct MemoryCatalog {
    attachments: RwLock<HashMap<u64, Attachment>>,
    posts: RwLock<HashMap<u64, String>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_attachment(&self, attachment: Attachment) {
        self.attachments.write().await.insert(attachment.id, attachment);
    }

    pub async fn insert_post(&self, post_id: u64, title: impl Into<String>) {
        self.posts.write().await.insert(post_id, title.into());
    }
}

#[async_trait]
impl MediaCatalog for MemoryCatalog {
    async fn attachment(&self, id: u64) -> anyhow::Result<Option<Attachment>> {
        Ok(self.attachments.read().await.get(&id).cloned())
    }

    async fn post_title(&self, post_id: u64) -> anyhow::Result<Option<String>> {
        Ok(self.posts.read().await.get(&post_id).cloned())
    }

    async fn rename_attachment(&self, id: u64, path: &Path) -> anyhow::Result<()> {
        let mut attachments = self.attachments.write().await;
        let Some(attachment) = attachments.get_mut(&id) else {
            anyhow::bail!("attachment {} does not exist", id);
        };
        attachment.path = path.to_path_buf();
        Ok(())
    }
}

/// Media processor
pub struct MediaProcessor {
    catalog: Arc<dyn MediaCatalog>,
    settings: Arc<SettingsStore>,
    activity: Arc<ActivityLog>,
    images: ImageService,
}

impl MediaProcessor {
    pub fn new(
        catalog: Arc<dyn MediaCatalog>,
        settings: Arc<SettingsStore>,
        activity: Arc<ActivityLog>,
    ) -> Self {
        Self {
            catalog,
            settings,
            activity,
            images: ImageService::new(),
        }
    }

    /// Run one operation and record its outcome
    pub async fn process(
        &self,
        operation: MediaOperation,
        attachment_id: u64,
        actor: &ActorContext,
    ) -> Result<ProcessingOutcome, MediaError> {
        let outcome = match self.catalog.attachment(attachment_id).await? {
            None => ProcessingOutcome::not_found(operation, attachment_id),
            Some(attachment) => match operation {
                MediaOperation::Rename => self.rename_file(&attachment).await?,
                MediaOperation::Resize => self.resize_file(&attachment).await?,
                MediaOperation::Compress => self.compress_file(&attachment).await?,
            },
        };

        tracing::info!(
            operation = %outcome.operation,
            media_id = attachment_id,
            affected = outcome.affected,
            "{}",
            outcome.message
        );

        self.activity
            .record(
                actions::MEDIA_PROCESSED,
                json!({
                    "action": outcome.operation,
                    "media_id": attachment_id,
                    "affected": outcome.affected,
                }),
                actor,
            )
            .await;

        Ok(outcome)
    }

    pub async fn rename(&self, attachment_id: u64, actor: &ActorContext) -> Result<ProcessingOutcome, MediaError> {
        self.process(MediaOperation::Rename, attachment_id, actor).await
    }

    pub async fn resize(&self, attachment_id: u64, actor: &ActorContext) -> Result<ProcessingOutcome, MediaError> {
        self.process(MediaOperation::Resize, attachment_id, actor).await
    }

    pub async fn compress(&self, attachment_id: u64, actor: &ActorContext) -> Result<ProcessingOutcome, MediaError> {
        self.process(MediaOperation::Compress, attachment_id, actor).await
    }

    /// Post-upload pass: size variants, then recompression, for a freshly
    /// stored image. Does nothing unless `auto_optimize` is on.
    pub async fn optimize_upload(
        &self,
        attachment_id: u64,
        actor: &ActorContext,
    ) -> Result<Vec<ProcessingOutcome>, MediaError> {
        if !self.settings.get().await?.auto_optimize {
            return Ok(Vec::new());
        }

        let resized = self.resize(attachment_id, actor).await?;
        if resized.affected == 0 {
            return Ok(vec![resized]);
        }
        let compressed = self.compress(attachment_id, actor).await?;
        Ok(vec![resized, compressed])
    }

    /// Check an upload against the size limit and allowed types, returning
    /// the guessed MIME type.
    pub async fn check_upload(&self, filename: &str, size: u64) -> Result<String, MediaError> {
        let settings = self.settings.get().await?;

        if size > settings.max_upload_bytes() {
            return Err(MediaError::Rejected(format!(
                "File too large: {} exceeds {}",
                format_bytes(size),
                format_bytes(settings.max_upload_bytes())
            )));
        }

        let mime: mime::Mime = mime_guess::from_path(filename)
            .first()
            .ok_or_else(|| MediaError::Rejected(format!("Unknown file type: {}", filename)))?;

        if !settings.is_mime_type_allowed(mime.essence_str()) {
            return Err(MediaError::Rejected(format!("File type not allowed: {}", mime)));
        }

        Ok(mime.essence_str().to_string())
    }

    async fn rename_file(&self, attachment: &Attachment) -> Result<ProcessingOutcome, MediaError> {
        let settings = self.settings.get().await?;

        let post_title = match attachment.post_id {
            Some(post_id) => self.catalog.post_title(post_id).await?,
            None => None,
        };
        let context = RenameContext {
            post_title: post_title.or_else(|| Some(attachment.title.clone())),
            custom_name: Some(attachment.title.clone()),
            uploaded_at: Utc::now(),
        };

        let current = attachment.filename();
        let renamed = apply_policy(settings.auto_rename, &current, &context);
        if renamed == current || is_numbered_copy(&current, &renamed) {
            return Ok(ProcessingOutcome::new(MediaOperation::Rename, attachment.id, 0, "Name unchanged"));
        }

        let target = unique_path(&attachment.path.with_file_name(&renamed), &attachment.path).await;
        if target == attachment.path {
            return Ok(ProcessingOutcome::new(MediaOperation::Rename, attachment.id, 0, "Name unchanged"));
        }

        tokio::fs::rename(&attachment.path, &target).await?;
        if let Err(e) = self.catalog.rename_attachment(attachment.id, &target).await {
            // Put the file back where the catalog still points
            if let Err(undo) = tokio::fs::rename(&target, &attachment.path).await {
                tracing::error!(
                    media_id = attachment.id,
                    file = %target.display(),
                    "Could not restore renamed file: {}",
                    undo
                );
            }
            return Err(e.into());
        }

        Ok(ProcessingOutcome::new(
            MediaOperation::Rename,
            attachment.id,
            1,
            format!("Renamed {} to {}", current, display_name(&target)),
        ))
    }

    async fn resize_file(&self, attachment: &Attachment) -> Result<ProcessingOutcome, MediaError> {
        if !attachment.is_image() {
            return Ok(skipped(MediaOperation::Resize, attachment));
        }
        let filename = attachment.filename();
        if OutputFormat::for_filename(&filename).is_none() {
            return Ok(unsupported(MediaOperation::Resize, attachment));
        }

        let settings = self.settings.get().await?;
        let data = tokio::fs::read(&attachment.path).await?;
        let variants = self.images.resize_variants(&data, &filename, &settings)?;

        for variant in &variants {
            let path = attachment.path.with_file_name(&variant.file);
            tokio::fs::write(&path, &variant.data).await?;
            tracing::debug!(
                size = %variant.size_name,
                width = variant.width,
                height = variant.height,
                "Wrote image variant"
            );
        }

        Ok(ProcessingOutcome::new(
            MediaOperation::Resize,
            attachment.id,
            variants.len(),
            format!("Generated {} size variants", variants.len()),
        ))
    }

    async fn compress_file(&self, attachment: &Attachment) -> Result<ProcessingOutcome, MediaError> {
        if !attachment.is_image() {
            return Ok(skipped(MediaOperation::Compress, attachment));
        }
        let filename = attachment.filename();
        if !OutputFormat::for_filename(&filename).is_some_and(|f| f.is_recompressible()) {
            return Ok(unsupported(MediaOperation::Compress, attachment));
        }

        let settings = self.settings.get().await?;
        let data = tokio::fs::read(&attachment.path).await?;

        if settings.backup_original_files {
            let backup = backup_path(&attachment.path);
            // Keep the first backup, it is the true original
            if !tokio::fs::try_exists(&backup).await? {
                tokio::fs::write(&backup, &data).await?;
            }
        }

        let compressed = self
            .images
            .compress(&data, &filename, settings.compression_quality)?;
        tokio::fs::write(&attachment.path, &compressed).await?;

        Ok(ProcessingOutcome::new(
            MediaOperation::Compress,
            attachment.id,
            1,
            format!(
                "Compressed from {} to {}",
                format_bytes(data.len() as u64),
                format_bytes(compressed.len() as u64)
            ),
        ))
    }
}

fn skipped(operation: MediaOperation, attachment: &Attachment) -> ProcessingOutcome {
    ProcessingOutcome::new(
        operation,
        attachment.id,
        0,
        format!("Skipped {} file", attachment.media_type()),
    )
}

fn unsupported(operation: MediaOperation, attachment: &Attachment) -> ProcessingOutcome {
    ProcessingOutcome::new(
        operation,
        attachment.id,
        0,
        format!("Left {} as uploaded", attachment.filename()),
    )
}

/// `<path>.orig`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Whether `current` is `target` with a `-N` collision suffix
fn is_numbered_copy(current: &str, target: &str) -> bool {
    let target = Path::new(target);
    let Some(stem) = target.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    let ext = target
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    current
        .strip_prefix(stem)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.strip_suffix(ext.as_str()))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// First of `name.ext`, `name-1.ext`, `name-2.ext`... that is free.
/// `own` is the file being renamed and never counts as taken.
async fn unique_path(path: &Path, own: &Path) -> PathBuf {
    if is_free(path, own).await {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file").to_string();
    let ext = path.extension().and_then(|e| e.to_str()).map(|e| format!(".{}", e));

    let mut counter = 1;
    loop {
        let candidate = path.with_file_name(format!("{}-{}{}", stem, counter, ext.as_deref().unwrap_or("")));
        if is_free(&candidate, own).await {
            return candidate;
        }
        counter += 1;
    }
}

async fn is_free(candidate: &Path, own: &Path) -> bool {
    candidate == own || !tokio::fs::try_exists(candidate).await.unwrap_or(false)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
