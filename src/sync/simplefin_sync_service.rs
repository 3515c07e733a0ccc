use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Duration;
use log::{debug, error, info, warn};

use super::sync_models::ItemSyncSummary;
use crate::accounts::AccountEdits;
use crate::constants::{FIRST_SYNC_LOOKBACK_DAYS, RESYNC_BUFFER_DAYS};
use crate::errors::Result;
use crate::holdings::holding_id;
use crate::items::{Item, ItemRegistryTrait, ItemStatus};
use crate::providers::{DateWindow, ProviderError, SimpleFinApiClient};
use crate::securities::SecurityResolver;
use crate::snapshots::SnapshotEngine;
use crate::store::{
    AccountStoreTrait, HoldingStoreTrait, InvestmentTransactionStoreTrait, TransactionStoreTrait,
};
use crate::transactions::{reconcile_incoming, InvestmentTransaction, Transaction};
use crate::utils::time_utils::Clock;

/// Sync routine for the full-snapshot provider.
///
/// The provider has no delta API: every sync fetches a complete window and
/// this routine computes removals itself by set-difference against stored
/// data. Rows dated before the window's start were never re-fetched and are
/// exempt from removal consideration.
pub struct SimpleFinSyncService {
    client: Arc<dyn SimpleFinApiClient>,
    registry: Arc<dyn ItemRegistryTrait>,
    engine: Arc<SnapshotEngine>,
    resolver: Arc<SecurityResolver>,
    account_store: Arc<dyn AccountStoreTrait>,
    holding_store: Arc<dyn HoldingStoreTrait>,
    transaction_store: Arc<dyn TransactionStoreTrait>,
    investment_store: Arc<dyn InvestmentTransactionStoreTrait>,
    clock: Arc<dyn Clock>,
}

impl SimpleFinSyncService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn SimpleFinApiClient>,
        registry: Arc<dyn ItemRegistryTrait>,
        engine: Arc<SnapshotEngine>,
        resolver: Arc<SecurityResolver>,
        account_store: Arc<dyn AccountStoreTrait>,
        holding_store: Arc<dyn HoldingStoreTrait>,
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
            transaction_store,
            investment_store,
            clock,
        }
    }

    /// Computes the fetch window: a buffer before the last successful sync
    /// (so late-arriving and corrected rows get re-checked), or the full
    /// lookback when the item has never synced.
    fn compute_window(&self, item: &Item) -> DateWindow {
        let today = self.clock.today();
        let start = match item.last_synced_at {
            Some(last) => last.date_naive() - Duration::days(RESYNC_BUFFER_DAYS),
            None => today - Duration::days(FIRST_SYNC_LOOKBACK_DAYS),
        };
        DateWindow { start, end: today }
    }

    /// One combined sync of everything the provider reports for the item.
    pub async fn sync_item(&self, item: &Item) -> Result<ItemSyncSummary> {
        let mut summary = ItemSyncSummary::default();
        let window = self.compute_window(item);

        let fetch = match self.client.fetch_window(item, window).await {
            Ok(fetch) => fetch,
            Err(e) => {
                self.settle_provider_error(item, &e, &mut summary).await;
                return Ok(summary);
            }
        };
        debug!(
            "Item {}: fetched window {} -> {} ({} accounts, {} transactions)",
            item.id,
            window.start,
            window.end,
            fetch.accounts.len(),
            fetch.transactions.len()
        );

        // Accounts: provider fields from the fetch, user edits from the
        // stored rows.
        let stored_accounts = self.account_store.search_by_item(&item.id)?;
        let edits_by_id: HashMap<String, AccountEdits> = stored_accounts
            .iter()
            .map(|account| (account.id.clone(), account.edits()))
            .collect();
        let mut incoming_accounts = fetch.accounts;
        for account in &mut incoming_accounts {
            account.item_id = item.id.clone();
            if let Some(edits) = edits_by_id.get(&account.id) {
                account.apply_edits(edits.clone());
            }
        }
        let live_account_ids: HashSet<String> = incoming_accounts
            .iter()
            .map(|account| account.id.clone())
            .collect();

        let accounts_outcome = self
            .engine
            .sync_accounts(incoming_accounts, &stored_accounts)
            .await;
        summary.accounts.accounts_upserted = accounts_outcome.upserted;
        summary.accounts.snapshots_written += accounts_outcome.snapshots_written;
        summary.accounts.errors.extend(accounts_outcome.errors);

        // Securities resolve and commit before anything references them.
        let resolution = self.resolver.resolve(fetch.securities)?;
        let securities_outcome = self.engine.sync_securities(resolution.securities).await;
        summary.accounts.securities_upserted = securities_outcome.upserted;
        summary.accounts.snapshots_written += securities_outcome.snapshots_written;
        summary.accounts.errors.extend(securities_outcome.errors);

        // Holdings: full-feed set difference within the reported accounts.
        let mut holdings = fetch.holdings;
        for holding in &mut holdings {
            if let Some(canonical) = resolution.id_map.get(&holding.security_id) {
                holding.security_id = canonical.clone();
            }
            holding.id = holding_id(&holding.account_id, &holding.security_id);
        }
        let mut existing_holdings = Vec::new();
        for account_id in &live_account_ids {
            existing_holdings.extend(self.holding_store.search_by_account(account_id)?);
        }
        let holdings_outcome = self
            .engine
            .sync_holdings(holdings, &existing_holdings, &live_account_ids)
            .await;
        summary.accounts.holdings_upserted = holdings_outcome.upserted;
        summary.accounts.holdings_removed = holdings_outcome.removed_ids.len();
        summary.accounts.snapshots_written += holdings_outcome.snapshots_written;
        summary.accounts.errors.extend(holdings_outcome.errors);

        self.sync_transactions(item, &fetch.transactions, window, &live_account_ids, &mut summary)
            .await?;
        self.sync_investments(
            item,
            fetch.investment_transactions,
            &resolution.id_map,
            window,
            &live_account_ids,
            &mut summary,
        )
        .await?;

        // The window bookmark advances only once the whole pass wrote
        // cleanly; otherwise the next cycle re-fetches the same window.
        if !summary.has_errors() {
            self.registry
                .update_last_synced(&item.id, self.clock.now())
                .await?;
        } else {
            warn!(
                "Item {} synced with errors; window bookmark not advanced",
                item.id
            );
        }

        info!(
            "Item {}: {} accounts, {} transactions, {} investment transactions upserted",
            item.id,
            summary.accounts.accounts_upserted,
            summary.transactions.upserted,
            summary.investments.upserted
        );
        Ok(summary)
    }

    async fn sync_transactions(
        &self,
        item: &Item,
        fetched: &[Transaction],
        window: DateWindow,
        live_account_ids: &HashSet<String>,
        summary: &mut ItemSyncSummary,
    ) -> Result<()> {
        let mut stored = Vec::new();
        for account in self.account_store.search_by_item(&item.id)? {
            stored.extend(self.transaction_store.search_by_account(&account.id)?);
        }

        let plan = reconcile_incoming(&stored, fetched.to_vec());
        let stale_ids: HashSet<String> = plan.stale_ids.iter().cloned().collect();

        // Splits on a retired id migrate to its replacement before the
        // stale row is dropped.
        let stored_by_id: HashMap<&str, &Transaction> =
            stored.iter().map(|tx| (tx.id.as_str(), tx)).collect();
        let mut migrated_splits = Vec::new();
        for upsert in &plan.upserts {
            for stale_id in &plan.stale_ids {
                let replaced = upsert.pending_transaction_id.as_deref()
                    == Some(stale_id.as_str())
                    || stored_by_id
                        .get(stale_id.as_str())
                        .map(|stale| {
                            stale.account_id == upsert.account_id
                                && stale.name == upsert.name
                                && stale.amount == upsert.amount
                        })
                        .unwrap_or(false);
                if replaced {
                    for mut split in self.transaction_store.search_splits(stale_id)? {
                        split.transaction_id = upsert.id.clone();
                        migrated_splits.push(split);
                    }
                }
            }
        }

        let fetched_ids: HashSet<&str> = plan.upserts.iter().map(|tx| tx.id.as_str()).collect();
        for result in self.transaction_store.upsert_many(plan.upserts.clone()).await? {
            match result.error {
                None => summary.transactions.upserted += 1,
                Some(message) => summary.transactions.errors.push((result.id, message)),
            }
        }
        if !migrated_splits.is_empty() {
            self.transaction_store.upsert_splits(migrated_splits).await?;
        }
        if !plan.stale_ids.is_empty() {
            self.transaction_store.delete_many(&plan.stale_ids).await?;
        }

        // Removal by set difference, bounded to the fetched window. Stale
        // ids were already replaced above and are not counted again.
        let mut removed_ids = Vec::new();
        for stored_tx in &stored {
            if stored_tx.date >= window.start
                && live_account_ids.contains(&stored_tx.account_id)
                && !fetched_ids.contains(stored_tx.id.as_str())
                && !stale_ids.contains(&stored_tx.id)
            {
                removed_ids.push(stored_tx.id.clone());
            }
        }
        if !removed_ids.is_empty() {
            let mut split_ids = Vec::new();
            for transaction_id in &removed_ids {
                split_ids.extend(
                    self.transaction_store
                        .search_splits(transaction_id)?
                        .into_iter()
                        .map(|split| split.id),
                );
            }
            if !split_ids.is_empty() {
                summary.transactions.splits_removed +=
                    self.transaction_store.delete_splits(&split_ids).await?;
            }
            summary.transactions.removed +=
                self.transaction_store.delete_many(&removed_ids).await?;
        }
        Ok(())
    }

    async fn sync_investments(
        &self,
        item: &Item,
        mut fetched: Vec<InvestmentTransaction>,
        security_id_map: &HashMap<String, String>,
        window: DateWindow,
        live_account_ids: &HashSet<String>,
        summary: &mut ItemSyncSummary,
    ) -> Result<()> {
        for row in &mut fetched {
            if let Some(provider_security_id) = row.security_id.clone() {
                if let Some(canonical) = security_id_map.get(&provider_security_id) {
                    row.security_id = Some(canonical.clone());
                }
            }
        }

        let fetched_ids: HashSet<String> = fetched.iter().map(|row| row.id.clone()).collect();
        for result in self.investment_store.upsert_many(fetched).await? {
            match result.error {
                None => summary.investments.upserted += 1,
                Some(message) => summary.investments.errors.push((result.id, message)),
            }
        }

        let mut removed_ids = Vec::new();
        for account_id in live_account_ids {
            for stored in self.investment_store.search_by_account(account_id)? {
                if stored.date >= window.start && !fetched_ids.contains(&stored.id) {
                    removed_ids.push(stored.id);
                }
            }
        }
        if !removed_ids.is_empty() {
            summary.investments.removed +=
                self.investment_store.delete_many(&removed_ids).await?;
        }
        Ok(())
    }

    async fn settle_provider_error(
        &self,
        item: &Item,
        error: &ProviderError,
        summary: &mut ItemSyncSummary,
    ) {
        if error.is_ignorable() {
            debug!("Ignorable provider condition for item {}: {}", item.id, error);
            return;
        }
        if error.is_item_error() {
            warn!("Provider reports item {} unusable: {}", item.id, error);
            if let Err(e) = self.registry.update_status(&item.id, ItemStatus::Bad).await {
                error!("Failed to flag item {}: {}", item.id, e);
            }
            summary.accounts.item_flagged = true;
        } else {
            warn!("Provider call failed for item {}: {}", item.id, error);
        }
        summary
            .accounts
            .errors
            .push((item.id.clone(), error.to_string()));
    }
}
