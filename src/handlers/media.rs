//! Media Handlers

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::actor::{ActorContext, Capability};
use crate::error::{ApiError, ValidationError};
use crate::hooks::{events, HookRegistry};
use crate::models::{MediaOperation, ProcessingOutcome};
use crate::services::MediaProcessor;

use super::{parse_int, require, required, respond, AjaxResponse, FormData};

/// Totals of a batch compression run
#[derive(Debug, Default, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Media handler
pub struct MediaHandler {
    processor: Arc<MediaProcessor>,
    hooks: Arc<HookRegistry>,
}

impl MediaHandler {
    pub fn new(processor: Arc<MediaProcessor>, hooks: Arc<HookRegistry>) -> Self {
        Self { processor, hooks }
    }

    /// Rename, resize or compress one attachment (`post_id`, `action_type`)
    pub async fn update_media(&self, form: &FormData, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_update_media(form, actor).await)
    }

    /// Compress several attachments, continuing past failures
    pub async fn compress_images(&self, ids: &[u64], actor: &ActorContext) -> AjaxResponse {
        respond(self.try_compress_images(ids, actor).await)
    }

    /// Run the automatic post-upload pass on a stored attachment
    pub async fn optimize_upload(&self, attachment_id: u64, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_optimize_upload(attachment_id, actor).await)
    }

    /// Validate an upload before it is stored
    pub async fn check_upload(&self, filename: &str, size: u64, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_check_upload(filename, size, actor).await)
    }

    async fn try_update_media(&self, form: &FormData, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::ManageOptions)?;

        let post_id = parse_int(form, "post_id")?
            .and_then(|id| u64::try_from(id).ok())
            .ok_or_else(|| ValidationError::new("post_id", "must be a media id"))?;
        let operation: MediaOperation = required(form, "action_type")?
            .parse()
            .map_err(|message: String| ValidationError::new("action_type", message))?;

        let outcome = self.processor.process(operation, post_id, actor).await?;
        self.announce(&outcome);

        let success = outcome.affected > 0;
        let data = json!({ "affected": outcome.affected, "media_id": outcome.attachment_id });
        Ok(AjaxResponse {
            success,
            message: outcome.message,
            data: Some(data),
        })
    }

    async fn try_compress_images(&self, ids: &[u64], actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::ManageOptions)?;

        let mut summary = BatchSummary::default();
        for &id in ids {
            match self.processor.compress(id, actor).await {
                Ok(outcome) if outcome.affected > 0 => {
                    self.announce(&outcome);
                    summary.processed += 1;
                }
                Ok(_) => summary.skipped += 1,
                Err(e) => {
                    tracing::warn!(media_id = id, "Compression failed: {}", e);
                    summary.failed += 1;
                }
            }
        }

        let data = serde_json::to_value(&summary).map_err(|e| ApiError::Internal(e.into()))?;
        Ok(AjaxResponse::with_data(
            format!("Compressed {} of {} images", summary.processed, ids.len()),
            data,
        ))
    }

    async fn try_optimize_upload(&self, attachment_id: u64, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::UploadFiles)?;

        let outcomes = self.processor.optimize_upload(attachment_id, actor).await?;
        for outcome in outcomes.iter().filter(|o| o.affected > 0) {
            self.announce(outcome);
        }

        let message = if outcomes.is_empty() {
            "Automatic optimization is off".to_string()
        } else {
            format!("Ran {} optimization steps", outcomes.len())
        };
        let data = serde_json::to_value(&outcomes).map_err(|e| ApiError::Internal(e.into()))?;
        Ok(AjaxResponse::with_data(message, data))
    }

    async fn try_check_upload(&self, filename: &str, size: u64, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::UploadFiles)?;
        let mime = self.processor.check_upload(filename, size).await?;
        Ok(AjaxResponse::with_data("Upload allowed", json!({ "mime_type": mime })))
    }

    fn announce(&self, outcome: &ProcessingOutcome) {
        if let Ok(payload) = serde_json::to_value(outcome) {
            self.hooks.do_action(events::MEDIA_PROCESSED, &payload);
        }
    }
}
