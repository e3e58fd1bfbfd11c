//! Error Types
//!
//! Storage and validation errors shared by every service, plus the
//! boundary error handed to request handlers.

use serde::Serialize;

/// Durable storage error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Duplicate key: {0}")]
    Conflict(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Invalid option name: {0}")]
    InvalidName(String),
}

/// A structurally invalid value in a write request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Offending field
    pub field: String,
    /// Human-readable reason
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error surfaced at the request boundary
///
/// Only the `Display` output crosses the boundary. Storage and internal
/// failures print a generic message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("You do not have permission to perform this action")]
    Unauthorized,
    #[error("The request could not be completed, please try again")]
    Storage(#[source] StoreError),
    #[error("The request could not be completed, please try again")]
    Internal(#[source] anyhow::Error),
    #[error("{0}")]
    Rejected(String),
}

impl ApiError {
    /// Failures that are logged server-side rather than reported
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Internal(_))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_hides_detail() {
        let err = ApiError::from(StoreError::NotFound("wp_smd_payments#7".to_string()));
        let message = err.to_string();
        assert!(!message.contains("wp_smd_payments"));
        assert!(err.is_internal());
    }

    #[test]
    fn test_validation_message() {
        let err = ValidationError::new("currency", "must be a 3-letter code");
        assert_eq!(err.to_string(), "currency: must be a 3-letter code");
    }
}
