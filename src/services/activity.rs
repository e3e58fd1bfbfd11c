//! Activity Log
//!
//! Best-effort recording of tracked actions plus the reporting and
//! retention operations over them.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::actor::ActorContext;
use crate::error::StoreError;
use crate::models::{ActionCount, ActivityEntry, ActivityFilter, NewActivityEntry, MAX_ACTION_LENGTH};
use crate::settings::sanitize_text;
use crate::store::ActivityStore;

use super::settings::SettingsStore;

/// Largest page a query returns
pub const MAX_QUERY_LIMIT: usize = 1000;

/// Activity log error
#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Append-only activity log
pub struct ActivityLog {
    store: Arc<dyn ActivityStore>,
    settings: Arc<SettingsStore>,
    /// Last assigned timestamp, keeps timestamps strictly increasing
    last_timestamp: Mutex<Option<DateTime<Utc>>>,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn ActivityStore>, settings: Arc<SettingsStore>) -> Self {
        Self {
            store,
            settings,
            last_timestamp: Mutex::new(None),
        }
    }

    /// Record an action.
    ///
    /// Never fails: a disabled log, an invalid tag or a storage error all
    /// result in `None`. Returns the new entry id otherwise.
    pub async fn record(
        &self,
        action: &str,
        data: serde_json::Value,
        actor: &ActorContext,
    ) -> Option<u64> {
        match self.settings.get().await {
            Ok(settings) if !settings.enable_logging => return None,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(action, "Skipping activity entry, settings unavailable: {}", e);
                return None;
            }
        }

        let action: String = sanitize_text(action).chars().take(MAX_ACTION_LENGTH).collect();
        if action.is_empty() {
            tracing::warn!("Skipping activity entry with empty action");
            return None;
        }

        let entry = NewActivityEntry {
            timestamp: self.next_timestamp().await,
            action,
            data: data.to_string(),
            user_id: actor.user_id,
            ip_address: actor.ip_address.map(|ip| ip.to_string()),
            user_agent: actor.user_agent.clone(),
        };

        match self.store.insert(entry).await {
            Ok(saved) => {
                tracing::debug!(id = saved.id, action = %saved.action, actor = %saved.actor_label(), "Activity recorded");
                Some(saved.id)
            }
            Err(e) => {
                tracing::warn!("Failed to record activity: {}", e);
                None
            }
        }
    }

    /// Matching entries, newest first
    pub async fn query(&self, limit: usize, filter: &ActivityFilter) -> Result<Vec<ActivityEntry>, ActivityError> {
        let limit = limit.min(MAX_QUERY_LIMIT);
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.store.query(filter, limit).await?)
    }

    /// Most recent entries
    pub async fn recent(&self, limit: usize) -> Result<Vec<ActivityEntry>, ActivityError> {
        self.query(limit, &ActivityFilter::default()).await
    }

    /// Entry counts per action, largest first, ties by action name
    pub async fn summarize(&self) -> Result<Vec<ActionCount>, ActivityError> {
        let counts = self.store.count_by_action().await?;

        let mut summary: Vec<ActionCount> = counts
            .into_iter()
            .map(|(action, count)| ActionCount { action, count })
            .collect();
        summary.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.action.cmp(&b.action)));

        Ok(summary)
    }

    /// Number of entries matching the filter
    pub async fn count(&self, filter: &ActivityFilter) -> Result<u64, ActivityError> {
        Ok(self.store.count(filter).await?)
    }

    /// Delete every entry
    pub async fn clear(&self) -> Result<u64, ActivityError> {
        let removed = self.store.clear().await?;
        tracing::info!(removed, "Activity log cleared");
        Ok(removed)
    }

    /// Delete entries with a timestamp before `older_than`
    pub async fn prune(&self, older_than: DateTime<Utc>) -> Result<u64, ActivityError> {
        let removed = self.store.delete_before(older_than).await?;
        tracing::info!(removed, cutoff = %older_than, "Activity log pruned");
        Ok(removed)
    }

    async fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = self.last_timestamp.lock().await;
        let mut now = Utc::now();
        if let Some(previous) = *last {
            if now <= previous {
                now = previous + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}
