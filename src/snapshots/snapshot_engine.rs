use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};

use super::snapshot_model::{AccountSnapshot, HoldingSnapshot, SecuritySnapshot, Snapshot};
use crate::accounts::Account;
use crate::holdings::Holding;
use crate::securities::Security;
use crate::store::{
    AccountStoreTrait, HoldingStoreTrait, SecurityStoreTrait, SnapshotStoreTrait, WriteResult,
};
use crate::utils::time_utils::Clock;

/// Result of running the engine over one batch of entities.
#[derive(Debug, Default)]
pub struct EngineOutcome {
    pub snapshots_written: usize,
    pub upserted: usize,
    pub removed_ids: Vec<String>,
    /// (entity id, message) pairs for rows that failed to write. A failed
    /// row never blocks the rest of its batch.
    pub errors: Vec<(String, String)>,
}

impl EngineOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Pure diff of an incoming entity batch against the stored batch.
#[derive(Debug)]
pub struct EntityDiff<T> {
    /// New or changed: snapshot and upsert.
    pub changed: Vec<T>,
    /// Present and identical: upsert only, no snapshot.
    pub unchanged: Vec<T>,
    /// Stored, absent from the feed, and inside a live parent scope.
    pub removed: Vec<T>,
}

/// Diffs `incoming` against `existing` by key.
///
/// An existing entity counts as removed only when its key is absent from
/// the feed while its parent scope appears in `live_parents`. A parent the
/// provider did not report says nothing about that parent's children.
pub fn diff_by_key<T, K, P, E>(
    incoming: Vec<T>,
    existing: &[T],
    key_of: K,
    parent_of: P,
    live_parents: &HashSet<String>,
    equals: E,
) -> EntityDiff<T>
where
    T: Clone,
    K: Fn(&T) -> String,
    P: Fn(&T) -> String,
    E: Fn(&T, &T) -> bool,
{
    let existing_by_key: HashMap<String, &T> =
        existing.iter().map(|entity| (key_of(entity), entity)).collect();
    let incoming_keys: HashSet<String> = incoming.iter().map(&key_of).collect();

    let mut changed = Vec::new();
    let mut unchanged = Vec::new();
    for entity in incoming {
        match existing_by_key.get(&key_of(&entity)) {
            Some(stored) if equals(stored, &entity) => unchanged.push(entity),
            _ => changed.push(entity),
        }
    }

    let removed = existing
        .iter()
        .filter(|stored| !incoming_keys.contains(&key_of(stored)))
        .filter(|stored| live_parents.contains(&parent_of(stored)))
        .cloned()
        .collect();

    EntityDiff {
        changed,
        unchanged,
        removed,
    }
}

/// Computes diffs between incoming and stored entity sets and emits the
/// snapshot and current-state mutations they imply.
///
/// Calling any sync method twice in a row with identical incoming data
/// produces zero additional snapshots on the second call: unchanged
/// entities short-circuit on content equality.
pub struct SnapshotEngine {
    account_store: Arc<dyn AccountStoreTrait>,
    holding_store: Arc<dyn HoldingStoreTrait>,
    security_store: Arc<dyn SecurityStoreTrait>,
    snapshot_store: Arc<dyn SnapshotStoreTrait>,
    clock: Arc<dyn Clock>,
}

impl SnapshotEngine {
    pub fn new(
        account_store: Arc<dyn AccountStoreTrait>,
        holding_store: Arc<dyn HoldingStoreTrait>,
        security_store: Arc<dyn SecurityStoreTrait>,
        snapshot_store: Arc<dyn SnapshotStoreTrait>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            account_store,
            holding_store,
            security_store,
            snapshot_store,
            clock,
        }
    }

    /// Reconciles fetched accounts for one item against the stored set.
    ///
    /// Accounts are never removed by set-difference: a vanished account is
    /// only soft-removed with its parent item, which is not this engine's
    /// call to make. Current-state rows are upserted whether or not a
    /// snapshot was emitted.
    pub async fn sync_accounts(
        &self,
        incoming: Vec<Account>,
        existing: &[Account],
    ) -> EngineOutcome {
        let today = self.clock.today();
        let diff = diff_by_key(
            incoming,
            existing,
            |account: &Account| account.id.clone(),
            |account: &Account| account.item_id.clone(),
            &HashSet::new(),
            |stored, fetched| stored.observably_equal(fetched),
        );

        let mut outcome = EngineOutcome::default();

        let snapshots: Vec<Snapshot> = diff
            .changed
            .iter()
            .map(|account| Snapshot::Account(AccountSnapshot::capture(account, today)))
            .collect();
        self.write_snapshots(snapshots, &mut outcome).await;

        let upserts: Vec<Account> = diff.changed.into_iter().chain(diff.unchanged).collect();
        if !upserts.is_empty() {
            match self.account_store.upsert_many(upserts).await {
                Ok(results) => collect_write_results(results, &mut outcome),
                Err(e) => outcome.errors.push(("accounts".to_string(), e.to_string())),
            }
        }
        outcome
    }

    /// Reconciles fetched holdings against the stored set, scoped to the
    /// accounts the feed actually reported.
    ///
    /// A holding that disappears while its account is still in the feed is
    /// removed: a terminal zero-quantity snapshot lands first so charts
    /// show a drop to zero instead of a gap, then the row is deleted.
    pub async fn sync_holdings(
        &self,
        incoming: Vec<Holding>,
        existing: &[Holding],
        live_account_ids: &HashSet<String>,
    ) -> EngineOutcome {
        let today = self.clock.today();
        let diff = diff_by_key(
            incoming,
            existing,
            |holding: &Holding| holding.id.clone(),
            |holding: &Holding| holding.account_id.clone(),
            live_account_ids,
            |stored, fetched| stored.observably_equal(fetched),
        );

        let mut outcome = EngineOutcome::default();

        let mut snapshots: Vec<Snapshot> = diff
            .changed
            .iter()
            .map(|holding| Snapshot::Holding(HoldingSnapshot::capture(holding, today)))
            .collect();
        // Terminal snapshots precede the deletes they record.
        snapshots.extend(
            diff.removed
                .iter()
                .map(|holding| Snapshot::Holding(HoldingSnapshot::capture(&holding.zeroed(), today))),
        );
        self.write_snapshots(snapshots, &mut outcome).await;

        let upserts: Vec<Holding> = diff.changed.into_iter().chain(diff.unchanged).collect();
        if !upserts.is_empty() {
            match self.holding_store.upsert_many(upserts).await {
                Ok(results) => collect_write_results(results, &mut outcome),
                Err(e) => outcome.errors.push(("holdings".to_string(), e.to_string())),
            }
        }

        if !diff.removed.is_empty() {
            let removed_ids: Vec<String> =
                diff.removed.iter().map(|holding| holding.id.clone()).collect();
            debug!("Removing {} holdings no longer in the feed", removed_ids.len());
            match self.holding_store.delete_many(&removed_ids).await {
                Ok(_) => outcome.removed_ids = removed_ids,
                Err(e) => {
                    for id in removed_ids {
                        outcome.errors.push((id, e.to_string()));
                    }
                }
            }
        }
        outcome
    }

    /// Reconciles resolved securities.
    ///
    /// Newly minted canonical rows snapshot unconditionally; known rows
    /// snapshot only when the close price or its as-of date advanced.
    /// Prices are last-write-wins under concurrent item syncs; canonical
    /// ids are already settled by the resolver, so the upsert can never
    /// mint a duplicate row.
    pub async fn sync_securities(&self, resolved: Vec<Security>) -> EngineOutcome {
        let mut outcome = EngineOutcome::default();
        if resolved.is_empty() {
            return outcome;
        }

        let today = self.clock.today();
        let ids: Vec<String> = resolved.iter().map(|security| security.id.clone()).collect();
        let existing: HashMap<String, Security> = match self.security_store.get_by_ids(&ids) {
            Ok(rows) => rows
                .into_iter()
                .map(|security| (security.id.clone(), security))
                .collect(),
            Err(e) => {
                outcome.errors.push(("securities".to_string(), e.to_string()));
                return outcome;
            }
        };

        let mut snapshots = Vec::new();
        let mut upserts = Vec::new();
        for mut security in resolved {
            match existing.get(&security.id) {
                None => {
                    snapshots.push(Snapshot::Security(SecuritySnapshot::capture(&security, today)));
                    upserts.push(security);
                }
                Some(stored) => {
                    if stored.price_advanced_by(&security) {
                        snapshots.push(Snapshot::Security(SecuritySnapshot::capture(&security, today)));
                    } else {
                        // A stale fetch must not wipe a fresher stored price.
                        security.close_price = stored.close_price;
                        security.close_price_as_of = stored.close_price_as_of;
                    }
                    upserts.push(security);
                }
            }
        }

        self.write_snapshots(snapshots, &mut outcome).await;
        match self.security_store.upsert_many(upserts).await {
            Ok(results) => collect_write_results(results, &mut outcome),
            Err(e) => outcome.errors.push(("securities".to_string(), e.to_string())),
        }
        outcome
    }

    async fn write_snapshots(&self, snapshots: Vec<Snapshot>, outcome: &mut EngineOutcome) {
        if snapshots.is_empty() {
            return;
        }
        match self.snapshot_store.upsert_many(snapshots).await {
            Ok(results) => {
                for result in results {
                    match result.error {
                        None => outcome.snapshots_written += 1,
                        Some(message) => {
                            warn!("Snapshot write failed for {}: {}", result.id, message);
                            outcome.errors.push((result.id, message));
                        }
                    }
                }
            }
            Err(e) => outcome.errors.push(("snapshots".to_string(), e.to_string())),
        }
    }
}

fn collect_write_results(results: Vec<WriteResult>, outcome: &mut EngineOutcome) {
    for result in results {
        match result.error {
            None => outcome.upserted += 1,
            Some(message) => {
                warn!("Store write failed for {}: {}", result.id, message);
                outcome.errors.push((result.id, message));
            }
        }
    }
}
