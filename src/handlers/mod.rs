//! Media Doctor Request Handlers
//!
//! Ajax-style endpoints. Every handler checks capabilities before touching
//! any service and answers with an [`AjaxResponse`].

pub mod ads;
pub mod media;
pub mod payment;
pub mod reports;
pub mod settings;
pub mod stats;

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::actor::{ActorContext, Capability};
use crate::error::{ApiError, StoreError, ValidationError};
use crate::services::{ActivityError, AdError, MediaError, PaymentError, SettingsError};

pub use ads::AdsHandler;
pub use media::MediaHandler;
pub use payment::PaymentHandler;
pub use reports::ReportsHandler;
pub use settings::{SettingsHandler, SettingsTab};
pub use stats::StatsHandler;

/// Submitted form fields
pub type FormData = HashMap<String, String>;

/// JSON body returned to the browser
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AjaxResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AjaxResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

impl From<ApiError> for AjaxResponse {
    fn from(err: ApiError) -> Self {
        if err.is_internal() {
            tracing::error!(error = ?err, "Request failed");
        } else {
            tracing::debug!("Request rejected: {}", err);
        }

        let mut response = Self::error(err.to_string());
        if let ApiError::Validation(ref v) = err {
            response.data = serde_json::to_value(v).ok();
        }
        response
    }
}

/// Collapse a handler result into a response
pub(crate) fn respond(result: Result<AjaxResponse, ApiError>) -> AjaxResponse {
    result.unwrap_or_else(AjaxResponse::from)
}

/// Fail unless the actor holds `capability`
pub fn require(actor: &ActorContext, capability: Capability) -> Result<(), ApiError> {
    if actor.can(capability) {
        Ok(())
    } else {
        tracing::warn!(user_id = ?actor.user_id, ?capability, "Capability check failed");
        Err(ApiError::Unauthorized)
    }
}

/// Trimmed value of a form field, `None` when absent or blank
pub(crate) fn field<'a>(form: &'a FormData, name: &str) -> Option<&'a str> {
    form.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// A required field
pub(crate) fn required<'a>(form: &'a FormData, name: &str) -> Result<&'a str, ValidationError> {
    field(form, name).ok_or_else(|| ValidationError::new(name, "is required"))
}

/// An integer field; non-numeric input is an error
pub(crate) fn parse_int(form: &FormData, name: &str) -> Result<Option<i64>, ValidationError> {
    field(form, name)
        .map(|v| v.parse::<i64>().map_err(|_| ValidationError::new(name, "must be a whole number")))
        .transpose()
}

/// A finite decimal field
pub(crate) fn parse_float(form: &FormData, name: &str) -> Result<Option<f64>, ValidationError> {
    field(form, name)
        .map(|v| match v.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(n),
            _ => Err(ValidationError::new(name, "must be a number")),
        })
        .transpose()
}

/// Checkbox semantics: present and not "0"
pub(crate) fn checkbox(form: &FormData, name: &str) -> bool {
    field(form, name).is_some_and(|v| v != "0")
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Validation(e) => Self::Validation(e),
            SettingsError::Storage(e) => Self::Storage(e),
        }
    }
}

impl From<ActivityError> for ApiError {
    fn from(err: ActivityError) -> Self {
        match err {
            ActivityError::Storage(e) => Self::Storage(e),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(e) => Self::Validation(e),
            e @ (PaymentError::MethodDisabled(_) | PaymentError::DonationsDisabled) => {
                Self::Rejected(e.to_string())
            }
            PaymentError::Settings(e) => e.into(),
            PaymentError::Storage(e) => Self::Storage(e),
        }
    }
}

impl From<AdError> for ApiError {
    fn from(err: AdError) -> Self {
        match err {
            AdError::Validation(e) => Self::Validation(e),
            AdError::NotFound(id) => Self::NotFound(format!("Advertisement {}", id)),
            AdError::Settings(e) => e.into(),
            AdError::Storage(e) => Self::Storage(e),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Catalog(e) => Self::Internal(e),
            MediaError::Image(e) => Self::Rejected(format!("Image could not be processed: {}", e)),
            MediaError::Io(e) => Self::Storage(StoreError::Io(e)),
            MediaError::Settings(e) => e.into(),
            MediaError::Rejected(message) => Self::Rejected(message),
        }
    }
}
