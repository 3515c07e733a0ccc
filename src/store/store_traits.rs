use async_trait::async_trait;

use crate::accounts::Account;
use crate::errors::Result;
use crate::holdings::Holding;
use crate::securities::Security;
use crate::snapshots::Snapshot;
use crate::transactions::{InvestmentTransaction, Transaction, TransactionSplit};

/// Per-entity outcome of a batched write. Failures stay row-scoped so one
/// bad entity cannot sink the rest of its batch.
#[derive(Debug, Clone)]
pub struct WriteResult {
    pub id: String,
    pub error: Option<String>,
}

impl WriteResult {
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Current-state store for accounts.
#[async_trait]
pub trait AccountStoreTrait: Send + Sync {
    fn search_by_item(&self, item_id: &str) -> Result<Vec<Account>>;
    async fn upsert_many(&self, accounts: Vec<Account>) -> Result<Vec<WriteResult>>;
    async fn delete_many(&self, ids: &[String]) -> Result<usize>;
}

/// Current-state store for holdings.
#[async_trait]
pub trait HoldingStoreTrait: Send + Sync {
    fn search_by_account(&self, account_id: &str) -> Result<Vec<Holding>>;
    async fn upsert_many(&self, holdings: Vec<Holding>) -> Result<Vec<WriteResult>>;
    async fn delete_many(&self, ids: &[String]) -> Result<usize>;
}

/// Current-state store for securities. Rows are global, shared across
/// items; upserts by canonical id, never blind writes.
#[async_trait]
pub trait SecurityStoreTrait: Send + Sync {
    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Security>>;
    fn find_by_ticker(&self, ticker: &str, currency: Option<&str>) -> Result<Option<Security>>;
    fn find_by_provider_id(&self, provider_security_id: &str) -> Result<Option<Security>>;
    async fn upsert_many(&self, securities: Vec<Security>) -> Result<Vec<WriteResult>>;
}

/// Current-state store for cash transactions and their user-created splits.
#[async_trait]
pub trait TransactionStoreTrait: Send + Sync {
    fn search_by_account(&self, account_id: &str) -> Result<Vec<Transaction>>;
    async fn upsert_many(&self, transactions: Vec<Transaction>) -> Result<Vec<WriteResult>>;
    async fn delete_many(&self, ids: &[String]) -> Result<usize>;

    fn search_splits(&self, transaction_id: &str) -> Result<Vec<TransactionSplit>>;
    async fn upsert_splits(&self, splits: Vec<TransactionSplit>) -> Result<Vec<WriteResult>>;
    async fn delete_splits(&self, ids: &[String]) -> Result<usize>;
}

/// Current-state store for investment transactions.
#[async_trait]
pub trait InvestmentTransactionStoreTrait: Send + Sync {
    fn search_by_account(&self, account_id: &str) -> Result<Vec<InvestmentTransaction>>;
    async fn upsert_many(
        &self,
        transactions: Vec<InvestmentTransaction>,
    ) -> Result<Vec<WriteResult>>;
    async fn delete_many(&self, ids: &[String]) -> Result<usize>;
}

/// Append-only keyed store for point-in-time snapshots. Upserts by id, so
/// a same-day re-sync overwrites that day's row instead of duplicating it.
#[async_trait]
pub trait SnapshotStoreTrait: Send + Sync {
    async fn upsert_many(&self, snapshots: Vec<Snapshot>) -> Result<Vec<WriteResult>>;
    async fn delete_many(&self, ids: &[String]) -> Result<()>;
}
