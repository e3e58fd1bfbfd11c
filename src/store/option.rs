//! Option Store
//!
//! Named slots holding whole JSON documents. A slot is always read and
//! written as a unit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use crate::error::StoreError;

use super::file::{read_json, write_json};

/// Key-value option storage
#[async_trait]
pub trait OptionStore: Send + Sync {
    /// Load a slot; `None` when it has never been written
    async fn get(&self, name: &str) -> Result<Option<serde_json::Value>, StoreError>;
    /// Replace a slot
    async fn set(&self, name: &str, value: &serde_json::Value) -> Result<(), StoreError>;
    /// Remove a slot, returning whether it existed
    async fn delete(&self, name: &str) -> Result<bool, StoreError>;
}

/// In-process option store
#[derive(Default)]
pub struct MemoryOptionStore {
    options: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OptionStore for MemoryOptionStore {
    async fn get(&self, name: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.options.read().await.get(name).cloned())
    }

    async fn set(&self, name: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        self.options.write().await.insert(name.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.options.write().await.remove(name).is_some())
    }
}

/// One `<name>.json` file per slot
///
/// Writes go through a temporary file renamed over the target, so a
/// reader never sees a half-written document.
pub struct JsonFileOptionStore {
    dir: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileOptionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Create the storage directory
    pub async fn init(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }
}

#[async_trait]
impl OptionStore for JsonFileOptionStore {
    async fn get(&self, name: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let path = self.slot_path(name)?;
        read_json(&path).await
    }

    async fn set(&self, name: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        let path = self.slot_path(name)?;

        let _guard = self.write_lock.lock().await;
        write_json(&path, value).await?;

        tracing::debug!(option = name, path = %path.display(), "Option written");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.slot_path(name)?;
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
