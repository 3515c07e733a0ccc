use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Duration;
use log::{debug, error, info, warn};

use super::sync_models::{AccountSyncSummary, InvestmentSyncSummary, TransactionSyncSummary};
use crate::accounts::AccountEdits;
use crate::constants::{FIRST_SYNC_LOOKBACK_DAYS, INVESTMENT_REMOVAL_WINDOW_DAYS};
use crate::errors::Result;
use crate::holdings::holding_id;
use crate::items::{Item, ItemRegistryTrait, ItemStatus};
use crate::providers::{DateWindow, PlaidApiClient, ProviderError};
use crate::securities::SecurityResolver;
use crate::snapshots::SnapshotEngine;
use crate::store::{
    AccountStoreTrait, HoldingStoreTrait, InvestmentTransactionStoreTrait, SecurityStoreTrait,
    TransactionStoreTrait,
};
use crate::transactions::{reconcile_incoming, Transaction};
use crate::utils::time_utils::Clock;

/// Sync routine for the cursor-delta provider.
///
/// Accounts and holdings are refreshed in full on every pass; transactions
/// ride the provider's delta cursor; investment transactions re-query only
/// a bounded recency window.
pub struct PlaidSyncService {
    client: Arc<dyn PlaidApiClient>,
    registry: Arc<dyn ItemRegistryTrait>,
    engine: Arc<SnapshotEngine>,
    resolver: Arc<SecurityResolver>,
    account_store: Arc<dyn AccountStoreTrait>,
    holding_store: Arc<dyn HoldingStoreTrait>,
    security_store: Arc<dyn SecurityStoreTrait>,
    transaction_store: Arc<dyn TransactionStoreTrait>,
    investment_store: Arc<dyn InvestmentTransactionStoreTrait>,
    clock: Arc<dyn Clock>,
}

impl PlaidSyncService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn PlaidApiClient>,
        registry: Arc<dyn ItemRegistryTrait>,
        engine: Arc<SnapshotEngine>,
        resolver: Arc<SecurityResolver>,
        account_store: Arc<dyn AccountStoreTrait>,
        holding_store: Arc<dyn HoldingStoreTrait>,
        security_store: Arc<dyn SecurityStoreTrait>,
        transaction_store: Arc<dyn TransactionStoreTrait>,
        investment_store: Arc<dyn InvestmentTransactionStoreTrait>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            registry,
            engine,
            resolver,
            account_store,
            holding_store,
            security_store,
            transaction_store,
            investment_store,
            clock,
        }
    }

    /// Full refresh of accounts, and holdings plus securities when the item
    /// supports investments.
    pub async fn sync_accounts_and_holdings(&self, item: &Item) -> Result<AccountSyncSummary> {
        let mut summary = AccountSyncSummary::default();

        let fetched_accounts = match self.client.fetch_accounts(item).await {
            Ok(accounts) => accounts,
            Err(e) => {
                self.settle_provider_error(item, &e, &mut summary.item_flagged, &mut summary.errors)
                    .await;
                return Ok(summary);
            }
        };
        debug!(
            "Fetched {} accounts for item {}",
            fetched_accounts.len(),
            item.id
        );

        // The holdings leg is independent of the accounts leg: a failure
        // here still lets the account reconciliation below proceed.
        let holdings_fetch = if item.supports_investments {
            match self.client.fetch_holdings(item).await {
                Ok(fetch) => Some(fetch),
                Err(e) if e.is_ignorable() => {
                    debug!("Item {} has no investment accounts", item.id);
                    None
                }
                Err(e) => {
                    self.settle_provider_error(
                        item,
                        &e,
                        &mut summary.item_flagged,
                        &mut summary.errors,
                    )
                    .await;
                    None
                }
            }
        } else {
            None
        };

        let stored_accounts = self.account_store.search_by_item(&item.id)?;
        let edits_by_id: HashMap<String, AccountEdits> = stored_accounts
            .iter()
            .map(|account| (account.id.clone(), account.edits()))
            .collect();

        let mut incoming_accounts = fetched_accounts;
        for account in &mut incoming_accounts {
            account.item_id = item.id.clone();
            if let Some(edits) = edits_by_id.get(&account.id) {
                account.apply_edits(edits.clone());
            }
        }

        let outcome = self
            .engine
            .sync_accounts(incoming_accounts, &stored_accounts)
            .await;
        summary.accounts_upserted += outcome.upserted;
        summary.snapshots_written += outcome.snapshots_written;
        summary.errors.extend(outcome.errors);

        if let Some(fetch) = holdings_fetch {
            // Securities resolve and commit first so holdings reference
            // canonical ids.
            let resolution = self.resolver.resolve(fetch.securities)?;
            let securities_outcome = self.engine.sync_securities(resolution.securities).await;
            summary.securities_upserted += securities_outcome.upserted;
            summary.snapshots_written += securities_outcome.snapshots_written;
            summary.errors.extend(securities_outcome.errors);

            let mut holdings = fetch.holdings;
            for holding in &mut holdings {
                if let Some(canonical) = resolution.id_map.get(&holding.security_id) {
                    holding.security_id = canonical.clone();
                }
                holding.id = holding_id(&holding.account_id, &holding.security_id);
            }

            // Only accounts the holdings feed reported participate in
            // removal detection.
            let live_account_ids: HashSet<String> = fetch
                .accounts
                .iter()
                .map(|account| account.id.clone())
                .collect();
            let mut existing_holdings = Vec::new();
            for account_id in &live_account_ids {
                existing_holdings.extend(self.holding_store.search_by_account(account_id)?);
            }

            let holdings_outcome = self
                .engine
                .sync_holdings(holdings, &existing_holdings, &live_account_ids)
                .await;
            summary.holdings_upserted += holdings_outcome.upserted;
            summary.holdings_removed += holdings_outcome.removed_ids.len();
            summary.snapshots_written += holdings_outcome.snapshots_written;
            summary.errors.extend(holdings_outcome.errors);
        }

        info!(
            "Item {}: {} accounts, {} holdings upserted, {} holdings removed, {} snapshots",
            item.id,
            summary.accounts_upserted,
            summary.holdings_upserted,
            summary.holdings_removed,
            summary.snapshots_written
        );
        Ok(summary)
    }

    /// Incremental, cursor-bounded transaction sync.
    pub async fn sync_transactions(&self, item: &Item) -> Result<TransactionSyncSummary> {
        let mut summary = TransactionSyncSummary::default();

        let delta = match self
            .client
            .fetch_transaction_delta(item, item.transactions_cursor.as_deref())
            .await
        {
            Ok(delta) => delta,
            Err(e) => {
                self.settle_provider_error(item, &e, &mut summary.item_flagged, &mut summary.errors)
                    .await;
                return Ok(summary);
            }
        };

        // Candidate set for matching: everything stored under the item's
        // accounts.
        let mut stored = Vec::new();
        for account in self.account_store.search_by_item(&item.id)? {
            stored.extend(self.transaction_store.search_by_account(&account.id)?);
        }

        let incoming: Vec<_> = delta.added.into_iter().chain(delta.modified).collect();
        let plan = reconcile_incoming(&stored, incoming);

        // An id transition retires the old row; the user's splits move to
        // the replacement id before the stale row goes away.
        let mut migrated_splits = Vec::new();
        let mut replacement_by_stale: HashMap<&str, &str> = HashMap::new();
        for upsert in &plan.upserts {
            if let Some(stale_id) = plan
                .stale_ids
                .iter()
                .find(|stale_id| self.replaces(upsert, stale_id, &stored))
            {
                replacement_by_stale.insert(stale_id.as_str(), upsert.id.as_str());
            }
        }
        for (stale_id, replacement_id) in &replacement_by_stale {
            for mut split in self.transaction_store.search_splits(stale_id)? {
                split.transaction_id = (*replacement_id).to_string();
                migrated_splits.push(split);
            }
        }

        let mut write_failed = false;
        for result in self.transaction_store.upsert_many(plan.upserts).await? {
            match result.error {
                None => summary.upserted += 1,
                Some(message) => {
                    warn!("Transaction write failed for {}: {}", result.id, message);
                    summary.errors.push((result.id, message));
                    write_failed = true;
                }
            }
        }

        if !migrated_splits.is_empty() {
            self.transaction_store.upsert_splits(migrated_splits).await?;
        }
        if !plan.stale_ids.is_empty() {
            self.transaction_store.delete_many(&plan.stale_ids).await?;
        }

        // Provider-reported removals cascade to user-created splits.
        if !delta.removed.is_empty() {
            let mut split_ids = Vec::new();
            for transaction_id in &delta.removed {
                split_ids.extend(
                    self.transaction_store
                        .search_splits(transaction_id)?
                        .into_iter()
                        .map(|split| split.id),
                );
            }
            if !split_ids.is_empty() {
                summary.splits_removed += self.transaction_store.delete_splits(&split_ids).await?;
            }
            summary.removed += self.transaction_store.delete_many(&delta.removed).await?;
        }

        if write_failed {
            // Leave the cursor untouched; the next cycle refetches this
            // delta.
            warn!(
                "Transaction write failures for item {}; cursor not advanced",
                item.id
            );
            return Ok(summary);
        }

        if delta.next_cursor.is_some() && delta.next_cursor != item.transactions_cursor {
            self.registry
                .update_cursor(&item.id, delta.next_cursor)
                .await?;
            summary.cursor_advanced = true;
        }

        info!(
            "Item {}: {} transactions upserted, {} removed",
            item.id, summary.upserted, summary.removed
        );
        Ok(summary)
    }

    /// Investment-transaction sync with a bounded-recency removal check.
    ///
    /// There is no delta API for investments: only the recency window is
    /// re-queried, so only rows inside it can be declared removed. Anything
    /// older is left alone.
    pub async fn sync_investment_transactions(
        &self,
        item: &Item,
    ) -> Result<InvestmentSyncSummary> {
        let mut summary = InvestmentSyncSummary::default();
        if !item.supports_investments {
            return Ok(summary);
        }

        let today = self.clock.today();
        let window_start = if item.is_first_sync() {
            today - Duration::days(FIRST_SYNC_LOOKBACK_DAYS)
        } else {
            today - Duration::days(INVESTMENT_REMOVAL_WINDOW_DAYS)
        };
        let window = DateWindow {
            start: window_start,
            end: today,
        };

        let mut fetched = match self.client.fetch_investment_transactions(item, window).await {
            Ok(rows) => rows,
            Err(e) if e.is_ignorable() => {
                debug!("Item {} has no investment accounts", item.id);
                return Ok(summary);
            }
            Err(e) => {
                self.settle_provider_error(item, &e, &mut summary.item_flagged, &mut summary.errors)
                    .await;
                return Ok(summary);
            }
        };

        // Rewrite provider security ids to canonical ones where known.
        for row in &mut fetched {
            if let Some(provider_security_id) = row.security_id.clone() {
                if let Some(canonical) =
                    self.security_store.find_by_provider_id(&provider_security_id)?
                {
                    row.security_id = Some(canonical.id);
                }
            }
        }

        let fetched_ids: HashSet<String> = fetched.iter().map(|row| row.id.clone()).collect();
        for result in self.investment_store.upsert_many(fetched).await? {
            match result.error {
                None => summary.upserted += 1,
                Some(message) => summary.errors.push((result.id, message)),
            }
        }

        let removal_floor = today - Duration::days(INVESTMENT_REMOVAL_WINDOW_DAYS);
        let mut removed_ids = Vec::new();
        for account in self.account_store.search_by_item(&item.id)? {
            for stored in self.investment_store.search_by_account(&account.id)? {
                if stored.date >= removal_floor && !fetched_ids.contains(&stored.id) {
                    removed_ids.push(stored.id);
                }
            }
        }
        if !removed_ids.is_empty() {
            summary.removed += self.investment_store.delete_many(&removed_ids).await?;
        }

        if summary.errors.is_empty() {
            self.registry
                .update_last_synced(&item.id, self.clock.now())
                .await?;
        }

        info!(
            "Item {}: {} investment transactions upserted, {} removed",
            item.id, summary.upserted, summary.removed
        );
        Ok(summary)
    }

    /// Whether `upsert` is the row that replaced `stale_id` in this batch.
    fn replaces(&self, upsert: &Transaction, stale_id: &str, stored: &[Transaction]) -> bool {
        if upsert.pending_transaction_id.as_deref() == Some(stale_id) {
            return true;
        }
        stored
            .iter()
            .find(|tx| tx.id == stale_id)
            .map(|stale| {
                stale.account_id == upsert.account_id
                    && stale.name == upsert.name
                    && stale.amount == upsert.amount
            })
            .unwrap_or(false)
    }

    async fn settle_provider_error(
        &self,
        item: &Item,
        error: &ProviderError,
        item_flagged: &mut bool,
        errors: &mut Vec<(String, String)>,
    ) {
        if error.is_item_error() {
            warn!("Provider reports item {} unusable: {}", item.id, error);
            if let Err(e) = self.registry.update_status(&item.id, ItemStatus::Bad).await {
                error!("Failed to flag item {}: {}", item.id, e);
            }
            *item_flagged = true;
        } else {
            warn!("Provider call failed for item {}: {}", item.id, error);
        }
        errors.push((item.id.clone(), error.to_string()));
    }
}
