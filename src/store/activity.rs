//! Activity Store
//!
//! Append-only table of activity entries, looked up by action, time and
//! user.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{OnceCell, RwLock};

use crate::error::StoreError;
use crate::models::{ActivityEntry, ActivityFilter, NewActivityEntry};

use super::file::{append_line, read_lines, rewrite_lines};

/// Activity log persistence
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Append an entry and assign its id
    async fn insert(&self, entry: NewActivityEntry) -> Result<ActivityEntry, StoreError>;
    /// Matching entries, newest first
    async fn query(&self, filter: &ActivityFilter, limit: usize) -> Result<Vec<ActivityEntry>, StoreError>;
    /// Number of matching entries
    async fn count(&self, filter: &ActivityFilter) -> Result<u64, StoreError>;
    /// Entry count per action
    async fn count_by_action(&self) -> Result<BTreeMap<String, u64>, StoreError>;
    /// Delete entries older than `cutoff`
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
    /// Delete everything
    async fn clear(&self) -> Result<u64, StoreError>;
}

#[derive(Default)]
struct ActivityTable {
    entries: Vec<ActivityEntry>,
    next_id: u64,
}

impl ActivityTable {
    fn from_entries(entries: Vec<ActivityEntry>) -> Self {
        let next_id = entries.iter().map(|e| e.id).max().unwrap_or(0);
        Self { entries, next_id }
    }

    fn next_entry(&self, entry: NewActivityEntry) -> ActivityEntry {
        entry.into_entry(self.next_id + 1)
    }

    fn push(&mut self, entry: ActivityEntry) {
        self.next_id = self.next_id.max(entry.id);
        self.entries.push(entry);
    }

    fn query(&self, filter: &ActivityFilter, limit: usize) -> Vec<ActivityEntry> {
        let mut matching: Vec<&ActivityEntry> = self
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .collect();

        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        matching.into_iter().take(limit).cloned().collect()
    }

    fn count(&self, filter: &ActivityFilter) -> u64 {
        self.entries.iter().filter(|e| filter.matches(e)).count() as u64
    }

    fn count_by_action(&self) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.action.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Entries kept by a `delete_before(cutoff)`
    fn retained(&self, cutoff: DateTime<Utc>) -> Vec<ActivityEntry> {
        self.entries
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    /// Swap in the surviving entries, returning how many were dropped
    fn replace(&mut self, kept: Vec<ActivityEntry>) -> u64 {
        let removed = self.entries.len() - kept.len();
        self.entries = kept;
        removed as u64
    }
}

/// In-process activity store
#[derive(Default)]
pub struct MemoryActivityStore {
    table: Arc<RwLock<ActivityTable>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityStore for MemoryActivityStore {
    async fn insert(&self, entry: NewActivityEntry) -> Result<ActivityEntry, StoreError> {
        let mut table = self.table.write().await;
        let entry = table.next_entry(entry);
        table.push(entry.clone());
        Ok(entry)
    }

    async fn query(&self, filter: &ActivityFilter, limit: usize) -> Result<Vec<ActivityEntry>, StoreError> {
        Ok(self.table.read().await.query(filter, limit))
    }

    async fn count(&self, filter: &ActivityFilter) -> Result<u64, StoreError> {
        Ok(self.table.read().await.count(filter))
    }

    async fn count_by_action(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        Ok(self.table.read().await.count_by_action())
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut table = self.table.write().await;
        let kept = table.retained(cutoff);
        Ok(table.replace(kept))
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        Ok(self.table.write().await.replace(Vec::new()))
    }
}

/// Activity log kept as one JSON object per line
///
/// Inserts append a line; deletions rewrite the file. The file is read
/// once, on first use, and every change reaches disk before the
/// in-memory table.
pub struct JsonlActivityStore {
    path: PathBuf,
    table: OnceCell<RwLock<ActivityTable>>,
}

impl JsonlActivityStore {
    /// Default file name inside a storage directory
    pub const FILE_NAME: &'static str = "smd_statistics.jsonl";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: OnceCell::new(),
        }
    }

    /// Store at `<dir>/smd_statistics.jsonl`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn table(&self) -> Result<&RwLock<ActivityTable>, StoreError> {
        self.table
            .get_or_try_init(|| async {
                let entries = read_lines(&self.path).await?;
                tracing::debug!(path = %self.path.display(), entries = entries.len(), "Activity log loaded");
                Ok::<_, StoreError>(RwLock::new(ActivityTable::from_entries(entries)))
            })
            .await
    }
}

#[async_trait]
impl ActivityStore for JsonlActivityStore {
    async fn insert(&self, entry: NewActivityEntry) -> Result<ActivityEntry, StoreError> {
        let mut table = self.table().await?.write().await;
        let entry = table.next_entry(entry);
        append_line(&self.path, &entry).await?;
        table.push(entry.clone());
        Ok(entry)
    }

    async fn query(&self, filter: &ActivityFilter, limit: usize) -> Result<Vec<ActivityEntry>, StoreError> {
        Ok(self.table().await?.read().await.query(filter, limit))
    }

    async fn count(&self, filter: &ActivityFilter) -> Result<u64, StoreError> {
        Ok(self.table().await?.read().await.count(filter))
    }

    async fn count_by_action(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        Ok(self.table().await?.read().await.count_by_action())
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut table = self.table().await?.write().await;
        let kept = table.retained(cutoff);
        if kept.len() == table.entries.len() {
            return Ok(0);
        }
        rewrite_lines(&self.path, &kept).await?;
        Ok(table.replace(kept))
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let mut table = self.table().await?.write().await;
        rewrite_lines::<ActivityEntry>(&self.path, &[]).await?;
        Ok(table.replace(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_entry(action: &str, timestamp: DateTime<Utc>) -> NewActivityEntry {
        NewActivityEntry {
            timestamp,
            action: action.to_string(),
            data: "{}".to_string(),
            user_id: None,
            ip_address: None,
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let store = MemoryActivityStore::new();
        let now = Utc::now();

        let a = store.insert(new_entry("audio_play", now)).await.unwrap();
        let b = store.insert(new_entry("audio_play", now)).await.unwrap();
        assert!(b.id > a.id);

        store.clear().await.unwrap();
        let c = store.insert(new_entry("audio_play", now)).await.unwrap();
        assert!(c.id > b.id);
    }

    #[tokio::test]
    async fn test_delete_before_boundary() {
        let store = MemoryActivityStore::new();
        let cutoff = Utc::now();

        store.insert(new_entry("old", cutoff - Duration::hours(1))).await.unwrap();
        store.insert(new_entry("edge", cutoff)).await.unwrap();
        store.insert(new_entry("new", cutoff + Duration::hours(1))).await.unwrap();

        assert_eq!(store.delete_before(cutoff).await.unwrap(), 1);

        let left = store.query(&ActivityFilter::default(), 10).await.unwrap();
        let actions: Vec<&str> = left.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["new", "edge"]);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();

        let store = JsonlActivityStore::in_dir(dir.path());
        store.insert(new_entry("audio_play", now)).await.unwrap();
        let last = store.insert(new_entry("video_play", now)).await.unwrap();

        let reopened = JsonlActivityStore::in_dir(dir.path());
        assert_eq!(reopened.count(&ActivityFilter::default()).await.unwrap(), 2);
        let next = reopened.insert(new_entry("audio_play", now)).await.unwrap();
        assert!(next.id > last.id);

        let counts = reopened.count_by_action().await.unwrap();
        assert_eq!(counts["audio_play"], 2);
    }

    #[tokio::test]
    async fn test_file_store_deletions_are_durable() {
        let dir = tempfile::tempdir().unwrap();
        let cutoff = Utc::now();

        let store = JsonlActivityStore::in_dir(dir.path());
        store.insert(new_entry("old", cutoff - Duration::days(2))).await.unwrap();
        store.insert(new_entry("new", cutoff)).await.unwrap();
        assert_eq!(store.delete_before(cutoff).await.unwrap(), 1);

        let reopened = JsonlActivityStore::in_dir(dir.path());
        let left = reopened.query(&ActivityFilter::default(), 10).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].action, "new");

        assert_eq!(reopened.clear().await.unwrap(), 1);
        let again = JsonlActivityStore::in_dir(dir.path());
        assert_eq!(again.count(&ActivityFilter::default()).await.unwrap(), 0);
    }
}
