//! Plugin Configuration
//!
//! Host-level wiring options. The user-facing settings document lives in
//! the option store; this only says where and how to reach it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::services::settings::SETTINGS_OPTION;

/// Longest accepted settings cache lifetime (one week)
pub const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest accepted log retention (100 years)
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DoctorConfig {
    /// Option slot holding the settings document
    pub option_name: String,
    /// Settings cache lifetime
    pub settings_cache_ttl_secs: u64,
    /// Activity entries older than this are pruned by maintenance
    pub log_retention_days: u32,
    /// Directory for the settings file, activity log, payment ledger and
    /// ads; in-memory when unset
    pub storage_dir: Option<PathBuf>,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            option_name: SETTINGS_OPTION.to_string(),
            settings_cache_ttl_secs: 3600,
            log_retention_days: 90,
            storage_dir: None,
        }
    }
}

impl DoctorConfig {
    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.option_name.trim().is_empty() {
            return Err(ConfigError::Invalid("option_name must not be empty".to_string()));
        }
        if self.log_retention_days == 0 || self.log_retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Invalid(format!(
                "log_retention_days must be between 1 and {}",
                MAX_RETENTION_DAYS
            )));
        }
        if self.settings_cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "settings_cache_ttl_secs must be at most {}",
                MAX_CACHE_TTL_SECS
            )));
        }
        Ok(())
    }

    pub fn settings_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.settings_cache_ttl_secs)
    }

    pub fn log_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.log_retention_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = DoctorConfig::default();
        assert_eq!(config.option_name, "smd_settings");
        assert_eq!(config.settings_cache_ttl(), Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mediadoctor.json");

        let config = DoctorConfig {
            log_retention_days: 30,
            storage_dir: Some(dir.path().join("options")),
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(DoctorConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{"settings_cache_ttl_secs": 0}"#).unwrap();

        let config = DoctorConfig::load(&path).unwrap();
        assert_eq!(config.settings_cache_ttl_secs, 0);
        assert_eq!(config.log_retention_days, 90);
    }

    #[test]
    fn test_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"log_retention_days": 0}"#).unwrap();
        assert!(matches!(DoctorConfig::load(&path), Err(ConfigError::Invalid(_))));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(DoctorConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_out_of_range_limits() {
        let config = DoctorConfig {
            settings_cache_ttl_secs: u64::MAX,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = DoctorConfig {
            log_retention_days: u32::MAX,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = DoctorConfig {
            settings_cache_ttl_secs: MAX_CACHE_TTL_SECS,
            log_retention_days: MAX_RETENTION_DAYS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
