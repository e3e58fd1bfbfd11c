//! Advertisement Models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ad status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdStatus {
    #[default]
    Active,
    Inactive,
}

/// Advertisement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Advertisement {
    pub id: u64,
    pub title: String,
    /// HTML or text body
    pub content: String,
    /// Placement slot, e.g. "before_player"
    pub placement: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: AdStatus,
    pub created_at: DateTime<Utc>,
}

impl Advertisement {
    /// Active and inside its scheduling window at `now`
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        if self.status != AdStatus::Active {
            return false;
        }
        if let Some(start) = self.start_date {
            if now < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if now >= end {
                return false;
            }
        }
        true
    }
}

/// Ad creation request
#[derive(Debug, Clone, Deserialize)]
pub struct NewAdvertisement {
    pub title: String,
    pub content: String,
    pub placement: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: AdStatus,
}

impl NewAdvertisement {
    pub fn into_ad(self, id: u64, created_at: DateTime<Utc>) -> Advertisement {
        Advertisement {
            id,
            title: self.title,
            content: self.content,
            placement: self.placement,
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_is_live_window() {
        let now = Utc::now();
        let ad = NewAdvertisement {
            title: "Sale".to_string(),
            content: "<p>50% off</p>".to_string(),
            placement: "sidebar".to_string(),
            start_date: Some(now - Duration::days(1)),
            end_date: Some(now + Duration::days(1)),
            status: AdStatus::Active,
        }
        .into_ad(1, now);

        assert!(ad.is_live(now));
        assert!(!ad.is_live(now + Duration::days(2)));
        assert!(!ad.is_live(now - Duration::days(2)));

        let paused = Advertisement { status: AdStatus::Inactive, ..ad };
        assert!(!paused.is_live(now));
    }
}
