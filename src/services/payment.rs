//! Payment Service
//!
//! Simulated payments and donations. There is no gateway: a valid request
//! is written to the ledger as `completed` immediately.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::actor::ActorContext;
use crate::error::{StoreError, ValidationError};
use crate::models::{
    actions, CurrencyTotal, NewPayment, PaymentPurpose, PaymentRecord, PaymentRequest,
    PaymentStatus, TRANSACTION_PREFIX,
};
use crate::settings::{parse_currency, sanitize_text};
use crate::store::PaymentStore;

use super::activity::ActivityLog;
use super::settings::{SettingsError, SettingsStore};

/// Largest accepted amount in minor units, matching a DECIMAL(10,2) column
pub const MAX_AMOUNT_CENTS: i64 = 99_999_999_99;

/// Payment service error
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Invalid payment: {0}")]
    Validation(#[from] ValidationError),
    #[error("Payment method '{0}' is not available")]
    MethodDisabled(String),
    #[error("Donations are disabled")]
    DonationsDisabled,
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Payment service
pub struct PaymentService {
    store: Arc<dyn PaymentStore>,
    settings: Arc<SettingsStore>,
    activity: Arc<ActivityLog>,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        settings: Arc<SettingsStore>,
        activity: Arc<ActivityLog>,
    ) -> Self {
        Self {
            store,
            settings,
            activity,
        }
    }

    /// Validate a request and write one completed ledger row.
    ///
    /// Nothing is written when validation fails.
    pub async fn create(
        &self,
        request: &PaymentRequest,
        actor: &ActorContext,
    ) -> Result<PaymentRecord, PaymentError> {
        let settings = self.settings.get().await?;

        let amount_cents = to_minor_units(request.amount)?;

        let currency = match request.currency.as_deref() {
            Some(code) => parse_currency(code)?,
            None => settings.currency.clone(),
        };

        let method = sanitize_text(&request.payment_method);
        if !settings.is_payment_method_enabled(&method) {
            return Err(PaymentError::MethodDisabled(method));
        }

        if request.purpose == PaymentPurpose::Donation && !settings.donation_enabled {
            return Err(PaymentError::DonationsDisabled);
        }

        let payment = NewPayment {
            transaction_id: generate_transaction_id(),
            user_id: actor.user_id,
            amount_cents,
            currency,
            // Simulated gateway: always succeeds synchronously
            status: PaymentStatus::Completed,
            payment_method: method,
            purpose: request.purpose,
            media_id: request.media_id,
            payment_data: request.payment_data.clone(),
            timestamp: Utc::now(),
        };

        let record = self.store.insert(payment).await?;

        tracing::info!(
            transaction_id = %record.transaction_id,
            amount = %record.formatted_amount(),
            method = %record.payment_method,
            "Payment processed"
        );

        self.activity
            .record(
                actions::PAYMENT_PROCESSED,
                json!({
                    "transaction_id": record.transaction_id,
                    "amount": record.amount(),
                    "currency": record.currency,
                    "payment_method": record.payment_method,
                    "purpose": record.purpose,
                    "media_id": record.media_id,
                }),
                actor,
            )
            .await;

        Ok(record)
    }

    pub async fn find(&self, transaction_id: &str) -> Result<Option<PaymentRecord>, PaymentError> {
        Ok(self.store.find(transaction_id).await?)
    }

    /// Ledger rows, newest first
    pub async fn list(&self, limit: usize) -> Result<Vec<PaymentRecord>, PaymentError> {
        Ok(self.store.list(limit).await?)
    }

    /// Completed volume per currency
    pub async fn totals(&self) -> Result<Vec<CurrencyTotal>, PaymentError> {
        let rows = self.store.list(usize::MAX).await?;

        let mut totals: BTreeMap<String, CurrencyTotal> = BTreeMap::new();
        for row in rows.iter().filter(|r| r.status == PaymentStatus::Completed) {
            let total = totals
                .entry(row.currency.clone())
                .or_insert_with(|| CurrencyTotal {
                    currency: row.currency.clone(),
                    amount_cents: 0,
                    count: 0,
                });
            total.amount_cents += row.amount_cents;
            total.count += 1;
        }

        Ok(totals.into_values().collect())
    }
}

/// Round a major-unit amount to cents, rejecting zero, negative and
/// non-finite values.
pub fn to_minor_units(amount: f64) -> Result<i64, ValidationError> {
    if !amount.is_finite() {
        return Err(ValidationError::new("amount", "must be a number"));
    }
    let cents = (amount * 100.0).round();
    if cents < 1.0 {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }
    if cents > MAX_AMOUNT_CENTS as f64 {
        return Err(ValidationError::new("amount", "is too large"));
    }
    Ok(cents as i64)
}

fn generate_transaction_id() -> String {
    format!("{}{}", TRANSACTION_PREFIX, Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityFilter;
    use crate::settings::SettingsUpdate;
    use crate::store::{MemoryActivityStore, MemoryOptionStore, MemoryPaymentStore};

    struct Fixture {
        settings: Arc<SettingsStore>,
        activity: Arc<ActivityLog>,
        payments: PaymentService,
    }

    fn fixture() -> Fixture {
        let settings = Arc::new(SettingsStore::new(Arc::new(MemoryOptionStore::new())));
        let activity = Arc::new(ActivityLog::new(
            Arc::new(MemoryActivityStore::new()),
            Arc::clone(&settings),
        ));
        let payments = PaymentService::new(
            Arc::new(MemoryPaymentStore::new()),
            Arc::clone(&settings),
            Arc::clone(&activity),
        );
        Fixture { settings, activity, payments }
    }

    #[tokio::test]
    async fn test_completed_payment() {
        let f = fixture();
        let actor = ActorContext::user(5, vec![]);

        let record = f
            .payments
            .create(&PaymentRequest::new(19.99, "USD", "mtn"), &actor)
            .await
            .unwrap();

        assert_eq!(record.status, PaymentStatus::Completed);
        assert_eq!(record.amount_cents, 1999);
        assert_eq!(record.user_id, Some(5));
        assert!(record.transaction_id.starts_with(TRANSACTION_PREFIX));

        let rows = f.payments.list(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], record);

        let logged = f
            .activity
            .count(&ActivityFilter::action(actions::PAYMENT_PROCESSED))
            .await
            .unwrap();
        assert_eq!(logged, 1);
    }

    #[tokio::test]
    async fn test_transaction_ids_are_unique() {
        let f = fixture();
        let actor = ActorContext::anonymous();
        let a = f.payments.create(&PaymentRequest::new(1.0, "USD", "mtn"), &actor).await.unwrap();
        let b = f.payments.create(&PaymentRequest::new(1.0, "USD", "mtn"), &actor).await.unwrap();
        assert_ne!(a.transaction_id, b.transaction_id);
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let f = fixture();
        let actor = ActorContext::anonymous();

        for amount in [0.0, -10.0, 0.004, f64::NAN] {
            let err = f
                .payments
                .create(&PaymentRequest::new(amount, "USD", "mtn"), &actor)
                .await
                .unwrap_err();
            assert!(matches!(err, PaymentError::Validation(_)));
        }
        assert!(f.payments.list(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_method_rejected() {
        let f = fixture();
        let mut methods = BTreeMap::new();
        methods.insert("mtn".to_string(), false);
        f.settings
            .set(&SettingsUpdate { payment_methods: Some(methods), ..Default::default() })
            .await
            .unwrap();

        let actor = ActorContext::anonymous();
        for method in ["mtn", "bitcoin"] {
            let err = f
                .payments
                .create(&PaymentRequest::new(5.0, "USD", method), &actor)
                .await
                .unwrap_err();
            assert!(matches!(err, PaymentError::MethodDisabled(_)));
        }
        assert!(f.payments.list(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_donations_respect_setting() {
        let f = fixture();
        f.settings
            .set(&SettingsUpdate { donation_enabled: Some(false), ..Default::default() })
            .await
            .unwrap();

        let mut request = PaymentRequest::new(2.5, "USD", "airtel");
        request.purpose = PaymentPurpose::Donation;

        let err = f.payments.create(&request, &ActorContext::anonymous()).await.unwrap_err();
        assert!(matches!(err, PaymentError::DonationsDisabled));
    }

    #[tokio::test]
    async fn test_default_currency_and_totals() {
        let f = fixture();
        let actor = ActorContext::anonymous();

        let mut request = PaymentRequest::new(10.0, "USD", "credit_card");
        request.currency = None;
        f.payments.create(&request, &actor).await.unwrap();
        f.payments.create(&PaymentRequest::new(5.25, "usd", "mtn"), &actor).await.unwrap();
        f.payments.create(&PaymentRequest::new(3000.0, "UGX", "mtn"), &actor).await.unwrap();

        let totals = f.payments.totals().await.unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].currency, "UGX");
        assert_eq!(totals[1].formatted(), "15.25 USD");
        assert_eq!(totals[1].count, 2);
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(19.99).unwrap(), 1999);
        assert_eq!(to_minor_units(0.01).unwrap(), 1);
        assert!(to_minor_units(0.0).is_err());
        assert!(to_minor_units(f64::INFINITY).is_err());
        assert!(to_minor_units(1e12).is_err());
    }
}
