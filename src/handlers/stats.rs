//! Stats Tracking Handler
//!
//! Front-end players report plays and downloads here. Open to anonymous
//! visitors.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::actor::ActorContext;
use crate::error::{ApiError, ValidationError};
use crate::hooks::{events, HookRegistry};
use crate::services::ActivityLog;
use crate::settings::sanitize_text;

use super::{field, required, respond, AjaxResponse, FormData};

/// Stats handler
pub struct StatsHandler {
    activity: Arc<ActivityLog>,
    hooks: Arc<HookRegistry>,
}

impl StatsHandler {
    pub fn new(activity: Arc<ActivityLog>, hooks: Arc<HookRegistry>) -> Self {
        Self { activity, hooks }
    }

    /// Record a tracked action.
    ///
    /// Succeeds even when logging is disabled or the write fails; the
    /// response then carries no entry id.
    pub async fn track(&self, form: &FormData, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_track(form, actor).await)
    }

    async fn try_track(&self, form: &FormData, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        let action = sanitize_text(required(form, "action")?);
        if action.is_empty() {
            return Err(ValidationError::new("action", "is required").into());
        }

        let data = parse_data(field(form, "data"));
        let id = self.activity.record(&action, data.clone(), actor).await;

        self.hooks.do_action(
            events::STATS_TRACKED,
            &json!({ "action": action, "data": data, "id": id }),
        );

        Ok(AjaxResponse::with_data("Tracked", json!({ "id": id })))
    }
}

/// JSON payloads are kept as-is, anything else is stored as a string
fn parse_data(raw: Option<&str>) -> Value {
    match raw {
        None => json!({}),
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(sanitize_text(raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityFilter;
    use crate::services::SettingsStore;
    use crate::store::{MemoryActivityStore, MemoryOptionStore};

    fn form(pairs: &[(&str, &str)]) -> FormData {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn handler() -> (Arc<ActivityLog>, StatsHandler) {
        let settings = Arc::new(SettingsStore::new(Arc::new(MemoryOptionStore::new())));
        let activity = Arc::new(ActivityLog::new(Arc::new(MemoryActivityStore::new()), settings));
        let handler = StatsHandler::new(Arc::clone(&activity), Arc::new(HookRegistry::new()));
        (activity, handler)
    }

    #[tokio::test]
    async fn test_anonymous_play_is_recorded() {
        let (activity, handler) = handler();
        let f = form(&[("action", "audio_play"), ("data", r#"{"media_id": 42, "position": 0}"#)]);

        let response = handler.track(&f, &ActorContext::anonymous()).await;
        assert!(response.success);

        let entries = activity.query(10, &ActivityFilter::action("audio_play")).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].data_json()["media_id"], 42);
        assert_eq!(entries[0].user_id, None);
    }

    #[tokio::test]
    async fn test_plain_text_data() {
        let (activity, handler) = handler();
        handler
            .track(&form(&[("action", "media_download"), ("data", "track-7")]), &ActorContext::anonymous())
            .await;

        let entry = &activity.recent(1).await.unwrap()[0];
        assert_eq!(entry.data_json(), Value::String("track-7".to_string()));
    }

    #[tokio::test]
    async fn test_missing_action() {
        let (activity, handler) = handler();
        let response = handler.track(&form(&[("data", "{}")]), &ActorContext::anonymous()).await;
        assert!(!response.success);
        assert_eq!(activity.count(&ActivityFilter::default()).await.unwrap(), 0);
    }
}
