//! Payment Store
//!
//! Append-only ledger with a unique transaction id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OnceCell, RwLock};

use crate::error::StoreError;
use crate::models::{NewPayment, PaymentRecord};

use super::file::{append_line, read_lines};

/// Payment ledger persistence
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Append a row; `Conflict` when the transaction id already exists
    async fn insert(&self, payment: NewPayment) -> Result<PaymentRecord, StoreError>;
    async fn find(&self, transaction_id: &str) -> Result<Option<PaymentRecord>, StoreError>;
    /// Rows newest first
    async fn list(&self, limit: usize) -> Result<Vec<PaymentRecord>, StoreError>;
}

#[derive(Default)]
struct Ledger {
    rows: Vec<PaymentRecord>,
    by_transaction: HashMap<String, usize>,
}

impl Ledger {
    fn from_rows(rows: Vec<PaymentRecord>) -> Result<Self, StoreError> {
        let mut ledger = Self::default();
        for row in rows {
            if ledger.by_transaction.contains_key(&row.transaction_id) {
                return Err(StoreError::Conflict(row.transaction_id));
            }
            ledger.push(row);
        }
        Ok(ledger)
    }

    /// Assign the next id, refusing a transaction id already on file
    fn prepare(&self, payment: NewPayment) -> Result<PaymentRecord, StoreError> {
        if self.by_transaction.contains_key(&payment.transaction_id) {
            return Err(StoreError::Conflict(payment.transaction_id));
        }
        let next_id = self.rows.last().map_or(0, |r| r.id) + 1;
        Ok(payment.into_record(next_id))
    }

    fn push(&mut self, record: PaymentRecord) {
        self.by_transaction.insert(record.transaction_id.clone(), self.rows.len());
        self.rows.push(record);
    }

    fn find(&self, transaction_id: &str) -> Option<PaymentRecord> {
        self.by_transaction
            .get(transaction_id)
            .and_then(|&i| self.rows.get(i))
            .cloned()
    }

    fn list(&self, limit: usize) -> Vec<PaymentRecord> {
        self.rows.iter().rev().take(limit).cloned().collect()
    }
}

/// In-process payment ledger
#[derive(Default)]
pub struct MemoryPaymentStore {
    ledger: Arc<RwLock<Ledger>>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn insert(&self, payment: NewPayment) -> Result<PaymentRecord, StoreError> {
        let mut ledger = self.ledger.write().await;
        let record = ledger.prepare(payment)?;
        ledger.push(record.clone());
        Ok(record)
    }

    async fn find(&self, transaction_id: &str) -> Result<Option<PaymentRecord>, StoreError> {
        Ok(self.ledger.read().await.find(transaction_id))
    }

    async fn list(&self, limit: usize) -> Result<Vec<PaymentRecord>, StoreError> {
        Ok(self.ledger.read().await.list(limit))
    }
}

/// Payment ledger kept as one JSON object per line
///
/// Rows are only ever appended. The transaction index is rebuilt from the
/// file on first use, so uniqueness holds across restarts.
pub struct JsonlPaymentStore {
    path: PathBuf,
    ledger: OnceCell<RwLock<Ledger>>,
}

impl JsonlPaymentStore {
    /// Default file name inside a storage directory
    pub const FILE_NAME: &'static str = "smd_payments.jsonl";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ledger: OnceCell::new(),
        }
    }

    /// Store at `<dir>/smd_payments.jsonl`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ledger(&self) -> Result<&RwLock<Ledger>, StoreError> {
        self.ledger
            .get_or_try_init(|| async {
                let rows = read_lines(&self.path).await?;
                tracing::debug!(path = %self.path.display(), rows = rows.len(), "Payment ledger loaded");
                Ok::<_, StoreError>(RwLock::new(Ledger::from_rows(rows)?))
            })
            .await
    }
}

#[async_trait]
impl PaymentStore for JsonlPaymentStore {
    async fn insert(&self, payment: NewPayment) -> Result<PaymentRecord, StoreError> {
        let mut ledger = self.ledger().await?.write().await;
        let record = ledger.prepare(payment)?;
        append_line(&self.path, &record).await?;
        ledger.push(record.clone());
        Ok(record)
    }

    async fn find(&self, transaction_id: &str) -> Result<Option<PaymentRecord>, StoreError> {
        Ok(self.ledger().await?.read().await.find(transaction_id))
    }

    async fn list(&self, limit: usize) -> Result<Vec<PaymentRecord>, StoreError> {
        Ok(self.ledger().await?.read().await.list(limit))
    }
}
