use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::store_traits::{
    AccountStoreTrait, HoldingStoreTrait, InvestmentTransactionStoreTrait, SecurityStoreTrait,
    SnapshotStoreTrait, TransactionStoreTrait, WriteResult,
};
use crate::accounts::Account;
use crate::errors::{Result, StoreError};
use crate::holdings::Holding;
use crate::items::{Item, ItemRegistryTrait, ItemStatus};
use crate::securities::Security;
use crate::snapshots::Snapshot;
use crate::transactions::{InvestmentTransaction, Transaction, TransactionSplit};

/// In-memory store over concurrent maps.
///
/// Backs the test suite and embedders that have not wired a durable
/// backend. Write behavior mirrors the narrow contracts a real store
/// implements: upsert by id with per-row results, delete by id with a
/// removed count.
#[derive(Default)]
pub struct MemoryStore {
    items: DashMap<String, Item>,
    accounts: DashMap<String, Account>,
    holdings: DashMap<String, Holding>,
    securities: DashMap<String, Security>,
    transactions: DashMap<String, Transaction>,
    splits: DashMap<String, TransactionSplit>,
    investment_transactions: DashMap<String, InvestmentTransaction>,
    snapshots: DashMap<String, Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_item(&self, item: Item) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn account(&self, id: &str) -> Option<Account> {
        self.accounts.get(id).map(|entry| entry.value().clone())
    }

    pub fn holding(&self, id: &str) -> Option<Holding> {
        self.holdings.get(id).map(|entry| entry.value().clone())
    }

    pub fn security(&self, id: &str) -> Option<Security> {
        self.securities.get(id).map(|entry| entry.value().clone())
    }

    pub fn transaction(&self, id: &str) -> Option<Transaction> {
        self.transactions.get(id).map(|entry| entry.value().clone())
    }

    pub fn investment_transaction(&self, id: &str) -> Option<InvestmentTransaction> {
        self.investment_transactions
            .get(id)
            .map(|entry| entry.value().clone())
    }

    pub fn all_securities(&self) -> Vec<Security> {
        self.securities.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn all_snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn snapshot(&self, id: &str) -> Option<Snapshot> {
        self.snapshots.get(id).map(|entry| entry.value().clone())
    }

    pub fn split(&self, id: &str) -> Option<TransactionSplit> {
        self.splits.get(id).map(|entry| entry.value().clone())
    }

    pub fn insert_split(&self, split: TransactionSplit) {
        self.splits.insert(split.id.clone(), split);
    }
}

fn delete_from<T>(map: &DashMap<String, T>, ids: &[String]) -> usize {
    ids.iter().filter(|id| map.remove(*id).is_some()).count()
}

#[async_trait]
impl ItemRegistryTrait for MemoryStore {
    fn list_items(&self) -> Result<Vec<Item>> {
        let mut items: Vec<Item> = self.items.iter().map(|entry| entry.value().clone()).collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    fn get_item(&self, item_id: &str) -> Result<Item> {
        self.items
            .get(item_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(item_id.to_string()).into())
    }

    async fn update_cursor(&self, item_id: &str, cursor: Option<String>) -> Result<()> {
        let mut item = self
            .items
            .get_mut(item_id)
            .ok_or_else(|| StoreError::NotFound(item_id.to_string()))?;
        item.transactions_cursor = cursor;
        Ok(())
    }

    async fn update_last_synced(&self, item_id: &str, synced_at: DateTime<Utc>) -> Result<()> {
        let mut item = self
            .items
            .get_mut(item_id)
            .ok_or_else(|| StoreError::NotFound(item_id.to_string()))?;
        item.last_synced_at = Some(synced_at);
        Ok(())
    }

    async fn update_status(&self, item_id: &str, status: ItemStatus) -> Result<()> {
        let mut item = self
            .items
            .get_mut(item_id)
            .ok_or_else(|| StoreError::NotFound(item_id.to_string()))?;
        item.status = status;
        Ok(())
    }
}

#[async_trait]
impl AccountStoreTrait for MemoryStore {
    fn search_by_item(&self, item_id: &str) -> Result<Vec<Account>> {
        Ok(self
            .accounts
            .iter()
            .filter(|entry| entry.item_id == item_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn upsert_many(&self, accounts: Vec<Account>) -> Result<Vec<WriteResult>> {
        Ok(accounts
            .into_iter()
            .map(|account| {
                let id = account.id.clone();
                self.accounts.insert(id.clone(), account);
                WriteResult::ok(id)
            })
            .collect())
    }

    async fn delete_many(&self, ids: &[String]) -> Result<usize> {
        Ok(delete_from(&self.accounts, ids))
    }
}

#[async_trait]
impl HoldingStoreTrait for MemoryStore {
    fn search_by_account(&self, account_id: &str) -> Result<Vec<Holding>> {
        Ok(self
            .holdings
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn upsert_many(&self, holdings: Vec<Holding>) -> Result<Vec<WriteResult>> {
        Ok(holdings
            .into_iter()
            .map(|holding| {
                let id = holding.id.clone();
                self.holdings.insert(id.clone(), holding);
                WriteResult::ok(id)
            })
            .collect())
    }

    async fn delete_many(&self, ids: &[String]) -> Result<usize> {
        Ok(delete_from(&self.holdings, ids))
    }
}

#[async_trait]
impl SecurityStoreTrait for MemoryStore {
    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Security>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.securities.get(id).map(|entry| entry.value().clone()))
            .collect())
    }

    fn find_by_ticker(&self, ticker: &str, currency: Option<&str>) -> Result<Option<Security>> {
        Ok(self
            .securities
            .iter()
            .find(|entry| {
                entry.ticker_symbol.as_deref() == Some(ticker)
                    && (currency.is_none() || entry.currency.as_deref() == currency)
            })
            .map(|entry| entry.value().clone()))
    }

    fn find_by_provider_id(&self, provider_security_id: &str) -> Result<Option<Security>> {
        Ok(self
            .securities
            .iter()
            .find(|entry| entry.provider_security_id.as_deref() == Some(provider_security_id))
            .map(|entry| entry.value().clone()))
    }

    async fn upsert_many(&self, securities: Vec<Security>) -> Result<Vec<WriteResult>> {
        Ok(securities
            .into_iter()
            .map(|security| {
                let id = security.id.clone();
                self.securities.insert(id.clone(), security);
                WriteResult::ok(id)
            })
            .collect())
    }
}

#[async_trait]
impl TransactionStoreTrait for MemoryStore {
    fn search_by_account(&self, account_id: &str) -> Result<Vec<Transaction>> {
        Ok(self
            .transactions
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn upsert_many(&self, transactions: Vec<Transaction>) -> Result<Vec<WriteResult>> {
        Ok(transactions
            .into_iter()
            .map(|transaction| {
                let id = transaction.id.clone();
                self.transactions.insert(id.clone(), transaction);
                WriteResult::ok(id)
            })
            .collect())
    }

    async fn delete_many(&self, ids: &[String]) -> Result<usize> {
        Ok(delete_from(&self.transactions, ids))
    }

    fn search_splits(&self, transaction_id: &str) -> Result<Vec<TransactionSplit>> {
        Ok(self
            .splits
            .iter()
            .filter(|entry| entry.transaction_id == transaction_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn upsert_splits(&self, splits: Vec<TransactionSplit>) -> Result<Vec<WriteResult>> {
        Ok(splits
            .into_iter()
            .map(|split| {
                let id = split.id.clone();
                self.splits.insert(id.clone(), split);
                WriteResult::ok(id)
            })
            .collect())
    }

    async fn delete_splits(&self, ids: &[String]) -> Result<usize> {
        Ok(delete_from(&self.splits, ids))
    }
}

#[async_trait]
impl InvestmentTransactionStoreTrait for MemoryStore {
    fn search_by_account(&self, account_id: &str) -> Result<Vec<InvestmentTransaction>> {
        Ok(self
            .investment_transactions
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn upsert_many(
        &self,
        transactions: Vec<InvestmentTransaction>,
    ) -> Result<Vec<WriteResult>> {
        Ok(transactions
            .into_iter()
            .map(|transaction| {
                let id = transaction.id.clone();
                self.investment_transactions.insert(id.clone(), transaction);
                WriteResult::ok(id)
            })
            .collect())
    }

    async fn delete_many(&self, ids: &[String]) -> Result<usize> {
        Ok(delete_from(&self.investment_transactions, ids))
    }
}

#[async_trait]
impl SnapshotStoreTrait for MemoryStore {
    async fn upsert_many(&self, snapshots: Vec<Snapshot>) -> Result<Vec<WriteResult>> {
        Ok(snapshots
            .into_iter()
            .map(|snapshot| {
                let id = snapshot.id().to_string();
                self.snapshots.insert(id.clone(), snapshot);
                WriteResult::ok(id)
            })
            .collect())
    }

    async fn delete_many(&self, ids: &[String]) -> Result<()> {
        delete_from(&self.snapshots, ids);
        Ok(())
    }
}
