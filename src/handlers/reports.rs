//! Reports Handlers
//!
//! Admin views over the activity log and the payment ledger.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::actor::{ActorContext, Capability};
use crate::error::{ApiError, ValidationError};
use crate::models::ActivityFilter;
use crate::services::{ActivityLog, PaymentService};

use super::{require, respond, AjaxResponse};

/// Default page size of the recent-activity table
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Activity report query
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportQuery {
    pub limit: Option<usize>,
    pub action: Option<String>,
    pub user_id: Option<u64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ReportQuery {
    fn filter(&self) -> ActivityFilter {
        ActivityFilter {
            action: self.action.clone().filter(|a| !a.trim().is_empty()),
            user_id: self.user_id,
            since: self.since,
            until: self.until,
        }
    }
}

/// Reports handler
pub struct ReportsHandler {
    activity: Arc<ActivityLog>,
    payments: Arc<PaymentService>,
}

impl ReportsHandler {
    pub fn new(activity: Arc<ActivityLog>, payments: Arc<PaymentService>) -> Self {
        Self { activity, payments }
    }

    /// Matching entries, newest first
    pub async fn activity(&self, query: &ReportQuery, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_activity(query, actor).await)
    }

    /// Entry counts per action plus ledger totals
    pub async fn summary(&self, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_summary(actor).await)
    }

    /// Delete entries older than `days`
    pub async fn prune(&self, days: u32, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_prune(days, actor).await)
    }

    /// Delete every entry; refused unless `confirm` is set
    pub async fn clear(&self, confirm: bool, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_clear(confirm, actor).await)
    }

    async fn try_activity(&self, query: &ReportQuery, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::ManageOptions)?;

        if let (Some(since), Some(until)) = (query.since, query.until) {
            if until <= since {
                return Err(ValidationError::new("until", "must be after since").into());
            }
        }

        let filter = query.filter();
        let entries = self
            .activity
            .query(query.limit.unwrap_or(DEFAULT_PAGE_SIZE), &filter)
            .await?;
        let total = self.activity.count(&filter).await?;

        Ok(AjaxResponse::with_data(
            format!("{} entries", entries.len()),
            json!({ "entries": entries, "total": total }),
        ))
    }

    async fn try_summary(&self, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::ManageOptions)?;

        let actions = self.activity.summarize().await?;
        let totals = self.payments.totals().await?;
        let revenue: Vec<_> = totals
            .iter()
            .map(|t| json!({ "currency": t.currency, "amount": t.formatted(), "count": t.count }))
            .collect();

        Ok(AjaxResponse::with_data(
            "Summary",
            json!({ "actions": actions, "revenue": revenue }),
        ))
    }

    async fn try_prune(&self, days: u32, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::ManageOptions)?;
        if days == 0 {
            return Err(ValidationError::new("days", "must be at least 1").into());
        }

        let cutoff = Utc::now()
            .checked_sub_signed(Duration::days(i64::from(days)))
            .ok_or_else(|| ValidationError::new("days", "is out of range"))?;
        let removed = self.activity.prune(cutoff).await?;
        Ok(AjaxResponse::with_data(
            format!("Removed {} entries", removed),
            json!({ "removed": removed }),
        ))
    }

    async fn try_clear(&self, confirm: bool, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        require(actor, Capability::ManageOptions)?;
        if !confirm {
            return Err(ValidationError::new("confirm", "must be set to clear the activity log").into());
        }

        let removed = self.activity.clear().await?;
        Ok(AjaxResponse::with_data(
            format!("Removed {} entries", removed),
            json!({ "removed": removed }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentRequest;
    use crate::services::SettingsStore;
    use crate::store::{MemoryActivityStore, MemoryOptionStore, MemoryPaymentStore};

    fn handler() -> (Arc<ActivityLog>, Arc<PaymentService>, ReportsHandler) {
        let settings = Arc::new(SettingsStore::new(Arc::new(MemoryOptionStore::new())));
        let activity = Arc::new(ActivityLog::new(
            Arc::new(MemoryActivityStore::new()),
            Arc::clone(&settings),
        ));
        let payments = Arc::new(PaymentService::new(
            Arc::new(MemoryPaymentStore::new()),
            settings,
            Arc::clone(&activity),
        ));
        let handler = ReportsHandler::new(Arc::clone(&activity), Arc::clone(&payments));
        (activity, payments, handler)
    }

    #[tokio::test]
    async fn test_clear_requires_confirmation() {
        let (activity, _, handler) = handler();
        activity.record("audio_play", json!({}), &ActorContext::anonymous()).await;

        assert!(!handler.clear(false, &ActorContext::system()).await.success);
        assert_eq!(activity.count(&ActivityFilter::default()).await.unwrap(), 1);

        assert!(!handler.clear(true, &ActorContext::anonymous()).await.success);

        let response = handler.clear(true, &ActorContext::system()).await;
        assert!(response.success);
        assert_eq!(response.data.unwrap()["removed"], 1);
    }

    #[tokio::test]
    async fn test_activity_report() {
        let (activity, _, handler) = handler();
        for action in ["audio_play", "video_play", "audio_play"] {
            activity.record(action, json!({}), &ActorContext::anonymous()).await;
        }

        let query = ReportQuery {
            action: Some("audio_play".to_string()),
            limit: Some(1),
            ..Default::default()
        };
        let data = handler.activity(&query, &ActorContext::system()).await.data.unwrap();
        assert_eq!(data["entries"].as_array().unwrap().len(), 1);
        assert_eq!(data["total"], 2);
    }

    #[tokio::test]
    async fn test_summary_includes_revenue() {
        let (_, payments, handler) = handler();
        payments
            .create(&PaymentRequest::new(19.99, "USD", "mtn"), &ActorContext::anonymous())
            .await
            .unwrap();

        let data = handler.summary(&ActorContext::system()).await.data.unwrap();
        assert_eq!(data["actions"][0]["action"], "payment_processed");
        assert_eq!(data["revenue"][0]["amount"], "19.99 USD");
    }

    #[tokio::test]
    async fn test_prune_validation() {
        let (_, _, handler) = handler();
        assert!(!handler.prune(0, &ActorContext::system()).await.success);
        assert_eq!(handler.prune(30, &ActorContext::system()).await.data.unwrap()["removed"], 0);

        let response = handler.prune(u32::MAX, &ActorContext::system()).await;
        assert!(!response.success);
        assert_eq!(response.data.unwrap()["field"], "days");
    }
}
