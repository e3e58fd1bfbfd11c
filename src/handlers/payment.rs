//! Payment Handler
//!
//! Simulated checkout. Open to anonymous visitors.

use std::sync::Arc;

use serde_json::json;

use crate::actor::ActorContext;
use crate::error::{ApiError, ValidationError};
use crate::hooks::{events, HookRegistry};
use crate::models::{PaymentPurpose, PaymentRecord, PaymentRequest};
use crate::services::PaymentService;

use super::{field, parse_float, parse_int, required, respond, AjaxResponse, FormData};

/// Payment handler
pub struct PaymentHandler {
    payments: Arc<PaymentService>,
    hooks: Arc<HookRegistry>,
}

impl PaymentHandler {
    pub fn new(payments: Arc<PaymentService>, hooks: Arc<HookRegistry>) -> Self {
        Self { payments, hooks }
    }

    /// Process a posted payment form
    pub async fn process(&self, form: &FormData, actor: &ActorContext) -> AjaxResponse {
        respond(self.try_process(form, actor).await)
    }

    /// Process a JSON payment request
    pub async fn process_request(&self, request: &PaymentRequest, actor: &ActorContext) -> AjaxResponse {
        respond(self.submit(request, actor).await)
    }

    async fn try_process(&self, form: &FormData, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        let request = parse_request(form)?;
        self.submit(&request, actor).await
    }

    async fn submit(&self, request: &PaymentRequest, actor: &ActorContext) -> Result<AjaxResponse, ApiError> {
        let record = self.payments.create(request, actor).await?;
        self.hooks.do_action(events::PAYMENT_COMPLETED, &payload(&record));

        Ok(AjaxResponse::with_data(
            "Payment processed successfully",
            json!({
                "transaction_id": record.transaction_id,
                "amount": record.formatted_amount(),
                "status": record.status,
            }),
        ))
    }
}

/// Build a request from form fields
pub fn parse_request(form: &FormData) -> Result<PaymentRequest, ValidationError> {
    let amount = parse_float(form, "amount")?.ok_or_else(|| ValidationError::new("amount", "is required"))?;
    let media_id = parse_int(form, "media_id")?
        .filter(|id| *id > 0)
        .map(|id| u64::try_from(id).map_err(|_| ValidationError::new("media_id", "is out of range")))
        .transpose()?;

    let purpose = match field(form, "purpose") {
        None | Some("purchase") => PaymentPurpose::Purchase,
        Some("donation") => PaymentPurpose::Donation,
        Some(_) => return Err(ValidationError::new("purpose", "must be purchase or donation")),
    };

    Ok(PaymentRequest {
        amount,
        currency: field(form, "currency").map(String::from),
        payment_method: required(form, "payment_method")?.to_string(),
        purpose,
        media_id,
        payment_data: serde_json::Value::Null,
    })
}

fn payload(record: &PaymentRecord) -> serde_json::Value {
    json!({
        "transaction_id": record.transaction_id,
        "user_id": record.user_id,
        "amount_cents": record.amount_cents,
        "currency": record.currency,
        "payment_method": record.payment_method,
        "purpose": record.purpose,
        "media_id": record.media_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ActivityLog, SettingsStore};
    use crate::store::{MemoryActivityStore, MemoryOptionStore, MemoryPaymentStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn form(pairs: &[(&str, &str)]) -> FormData {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn handler(hooks: Arc<HookRegistry>) -> (Arc<PaymentService>, PaymentHandler) {
        let settings = Arc::new(SettingsStore::new(Arc::new(MemoryOptionStore::new())));
        let activity = Arc::new(ActivityLog::new(
            Arc::new(MemoryActivityStore::new()),
            Arc::clone(&settings),
        ));
        let payments = Arc::new(PaymentService::new(
            Arc::new(MemoryPaymentStore::new()),
            settings,
            activity,
        ));
        (Arc::clone(&payments), PaymentHandler::new(payments, hooks))
    }

    #[tokio::test]
    async fn test_form_payment() {
        let hooks = Arc::new(HookRegistry::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        hooks.add_action(events::PAYMENT_COMPLETED, 10, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let (payments, handler) = handler(hooks);
        let f = form(&[("amount", "19.99"), ("currency", "USD"), ("payment_method", "mtn"), ("media_id", "7")]);

        let response = handler.process(&f, &ActorContext::anonymous()).await;
        assert!(response.success, "{}", response.message);
        let data = response.data.unwrap();
        assert!(data["transaction_id"].as_str().unwrap().starts_with("smd_pay_"));
        assert_eq!(data["amount"], "19.99 USD");
        assert_eq!(data["status"], "completed");

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(payments.list(10).await.unwrap()[0].media_id, Some(7));
    }

    #[tokio::test]
    async fn test_rejections_write_nothing() {
        let (payments, handler) = handler(Arc::new(HookRegistry::new()));

        for f in [
            form(&[("amount", "abc"), ("payment_method", "mtn")]),
            form(&[("amount", "-5"), ("payment_method", "mtn")]),
            form(&[("amount", "5"), ("payment_method", "paypal")]),
            form(&[("amount", "5")]),
        ] {
            let response = handler.process(&f, &ActorContext::anonymous()).await;
            assert!(!response.success);
        }
        assert!(payments.list(10).await.unwrap().is_empty());
    }

    #[test]
    fn test_parse_request() {
        let request = parse_request(&form(&[
            ("amount", "2.50"),
            ("payment_method", "airtel"),
            ("purpose", "donation"),
            ("media_id", "0"),
        ]))
        .unwrap();
        assert_eq!(request.purpose, PaymentPurpose::Donation);
        assert_eq!(request.media_id, None);
        assert!(request.currency.is_none());

        assert!(parse_request(&form(&[("amount", "1"), ("payment_method", "mtn"), ("purpose", "gift")])).is_err());
    }
}
