//! Payment Models
//!
//! Records of the simulated payment ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of generated transaction IDs
pub const TRANSACTION_PREFIX: &str = "smd_pay_";

/// Ledger status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// What the money is for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentPurpose {
    /// Paid media access
    #[default]
    Purchase,
    /// Voluntary donation
    Donation,
}

/// Ledger row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    pub id: u64,
    /// Unique, server-generated
    pub transaction_id: String,
    pub user_id: Option<u64>,
    /// Amount in minor units (cents)
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method: String,
    pub purpose: PaymentPurpose,
    pub media_id: Option<u64>,
    /// Opaque client context
    pub payment_data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl PaymentRecord {
    /// Amount in major units
    pub fn amount(&self) -> f64 {
        self.amount_cents as f64 / 100.0
    }

    /// e.g. "19.99 USD"
    pub fn formatted_amount(&self) -> String {
        format_minor_units(self.amount_cents, &self.currency)
    }
}

/// Ledger row before the store assigns an id
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub transaction_id: String,
    pub user_id: Option<u64>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method: String,
    pub purpose: PaymentPurpose,
    pub media_id: Option<u64>,
    pub payment_data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl NewPayment {
    pub fn into_record(self, id: u64) -> PaymentRecord {
        PaymentRecord {
            id,
            transaction_id: self.transaction_id,
            user_id: self.user_id,
            amount_cents: self.amount_cents,
            currency: self.currency,
            status: self.status,
            payment_method: self.payment_method,
            purpose: self.purpose,
            media_id: self.media_id,
            payment_data: self.payment_data,
            timestamp: self.timestamp,
        }
    }
}

/// Payment creation request
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    /// Amount in major units
    pub amount: f64,
    /// Defaults to the configured currency
    #[serde(default)]
    pub currency: Option<String>,
    pub payment_method: String,
    #[serde(default)]
    pub purpose: PaymentPurpose,
    #[serde(default)]
    pub media_id: Option<u64>,
    #[serde(default)]
    pub payment_data: serde_json::Value,
}

impl PaymentRequest {
    pub fn new(amount: f64, currency: impl Into<String>, payment_method: impl Into<String>) -> Self {
        Self {
            amount,
            currency: Some(currency.into()),
            payment_method: payment_method.into(),
            purpose: PaymentPurpose::Purchase,
            media_id: None,
            payment_data: serde_json::Value::Null,
        }
    }
}

/// Completed volume for one currency
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CurrencyTotal {
    pub currency: String,
    pub amount_cents: i64,
    pub count: u64,
}

impl CurrencyTotal {
    pub fn formatted(&self) -> String {
        format_minor_units(self.amount_cents, &self.currency)
    }
}

fn format_minor_units(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{}{}.{:02} {}", sign, cents / 100, cents % 100, currency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_amount() {
        let total = CurrencyTotal {
            currency: "UGX".to_string(),
            amount_cents: 245_005,
            count: 3,
        };
        assert_eq!(total.formatted(), "2450.05 UGX");
    }

    #[test]
    fn test_request_defaults() {
        let request: PaymentRequest =
            serde_json::from_str(r#"{"amount": 5.0, "payment_method": "airtel"}"#).unwrap();
        assert_eq!(request.purpose, PaymentPurpose::Purchase);
        assert!(request.currency.is_none());
        assert!(request.payment_data.is_null());
    }
}
