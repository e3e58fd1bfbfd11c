//! Activity Models
//!
//! Entries of the append-only activity log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known action tags
pub mod actions {
    pub const MEDIA_PROCESSED: &str = "media_processed";
    pub const AUDIO_PLAY: &str = "audio_play";
    pub const VIDEO_PLAY: &str = "video_play";
    pub const MEDIA_DOWNLOAD: &str = "media_download";
    pub const PAYMENT_PROCESSED: &str = "payment_processed";
    pub const SETTINGS_UPDATED: &str = "settings_updated";
}

/// Maximum stored length of an action tag
pub const MAX_ACTION_LENGTH: usize = 255;

/// One immutable log entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    /// Monotonic surrogate key
    pub id: u64,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Action tag, e.g. "audio_play"
    pub action: String,
    /// Serialized JSON payload
    pub data: String,
    /// Acting user (None = anonymous)
    pub user_id: Option<u64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ActivityEntry {
    /// Parse the payload back into JSON
    pub fn data_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.data).unwrap_or(serde_json::Value::String(self.data.clone()))
    }

    /// Display label for the actor
    pub fn actor_label(&self) -> String {
        match self.user_id {
            Some(id) => format!("user #{}", id),
            None => "anonymous".to_string(),
        }
    }
}

/// Entry handed to the store; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub data: String,
    pub user_id: Option<u64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewActivityEntry {
    pub fn into_entry(self, id: u64) -> ActivityEntry {
        ActivityEntry {
            id,
            timestamp: self.timestamp,
            action: self.action,
            data: self.data,
            user_id: self.user_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
        }
    }
}

/// Activity query filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityFilter {
    /// Exact action tag
    pub action: Option<String>,
    /// Acting user
    pub user_id: Option<u64>,
    /// Inclusive lower bound
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub until: Option<DateTime<Utc>>,
}

impl ActivityFilter {
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &ActivityEntry) -> bool {
        if let Some(ref action) = self.action {
            if &entry.action != action {
                return false;
            }
        }
        if let Some(user_id) = self.user_id {
            if entry.user_id != Some(user_id) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.timestamp >= until {
                return false;
            }
        }
        true
    }
}

/// Count of entries for one action
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActionCount {
    pub action: String,
    pub count: u64,
}
