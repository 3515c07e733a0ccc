use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::accounts::{Account, Balances};
use crate::errors::Result;
use crate::holdings::{holding_id, Holding};
use crate::snapshots::{snapshot_id, Snapshot, SnapshotEngine};
use crate::store::{AccountStoreTrait, HoldingStoreTrait, MemoryStore, WriteResult};
use crate::utils::time_utils::{Clock, FixedClock};

fn engine_over(store: &Arc<MemoryStore>, clock: &Arc<FixedClock>) -> SnapshotEngine {
    SnapshotEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        clock.clone(),
    )
}

fn account(id: &str, current: Decimal) -> Account {
    Account {
        id: id.to_string(),
        item_id: "item-1".to_string(),
        name: "Checking".to_string(),
        account_type: "depository".to_string(),
        balances: Balances {
            current: Some(current),
            ..Balances::default()
        },
        ..Account::default()
    }
}

fn holding(account_id: &str, security_id: &str, quantity: Decimal) -> Holding {
    Holding {
        id: holding_id(account_id, security_id),
        account_id: account_id.to_string(),
        security_id: security_id.to_string(),
        quantity,
        institution_price: Some(dec!(100)),
        institution_value: Some(quantity * dec!(100)),
        ..Holding::default()
    }
}

#[tokio::test]
async fn first_sync_snapshots_then_identical_resync_is_silent() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new("2024-03-05T10:00:00Z".parse().unwrap()));
    let engine = engine_over(&store, &clock);

    let incoming = vec![account("a1", dec!(100))];
    let outcome = engine.sync_accounts(incoming.clone(), &[]).await;
    assert_eq!(outcome.snapshots_written, 1);
    assert_eq!(outcome.upserted, 1);
    assert!(outcome.is_clean());
    assert!(store.snapshot(&snapshot_id("a1", clock.today())).is_some());

    // Re-running with identical incoming data writes nothing new.
    let existing = store.search_by_item("item-1").unwrap();
    let outcome = engine.sync_accounts(incoming, &existing).await;
    assert_eq!(outcome.snapshots_written, 0);
    assert_eq!(outcome.upserted, 1);
    assert_eq!(store.all_snapshots().len(), 1);
    assert_eq!(
        store.account("a1").unwrap().balances.current,
        Some(dec!(100))
    );
}

#[tokio::test]
async fn a_later_sync_on_the_same_day_overwrites_that_days_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new("2024-03-05T10:00:00Z".parse().unwrap()));
    let engine = engine_over(&store, &clock);

    engine.sync_accounts(vec![account("a1", dec!(100))], &[]).await;
    let existing = store.search_by_item("item-1").unwrap();
    let outcome = engine
        .sync_accounts(vec![account("a1", dec!(150))], &existing)
        .await;
    assert_eq!(outcome.snapshots_written, 1);

    // Still exactly one row for the day, carrying the last value.
    let snapshots = store.all_snapshots();
    assert_eq!(snapshots.len(), 1);
    match &snapshots[0] {
        Snapshot::Account(snapshot) => assert_eq!(snapshot.current, Some(dec!(150))),
        other => panic!("expected an account snapshot, got {:?}", other),
    }
}

#[tokio::test]
async fn removed_holding_gets_a_terminal_zero_snapshot_then_is_deleted() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new("2024-03-05T10:00:00Z".parse().unwrap()));
    let engine = engine_over(&store, &clock);

    let stored = holding("acc-x", "sec-1", dec!(5));
    HoldingStoreTrait::upsert_many(store.as_ref(), vec![stored.clone()])
        .await
        .unwrap();

    let live: HashSet<String> = ["acc-x".to_string()].into_iter().collect();
    let outcome = engine.sync_holdings(Vec::new(), &[stored.clone()], &live).await;

    assert_eq!(outcome.removed_ids, vec![stored.id.clone()]);
    assert!(store.holding(&stored.id).is_none());
    match store.snapshot(&snapshot_id(&stored.id, clock.today())).unwrap() {
        Snapshot::Holding(snapshot) => {
            assert_eq!(snapshot.quantity, Decimal::ZERO);
            assert_eq!(snapshot.value, Some(Decimal::ZERO));
        }
        other => panic!("expected a holding snapshot, got {:?}", other),
    }
}

#[tokio::test]
async fn a_holding_outside_the_reported_accounts_is_not_removed() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new("2024-03-05T10:00:00Z".parse().unwrap()));
    let engine = engine_over(&store, &clock);

    let stored = holding("acc-unreported", "sec-1", dec!(5));
    HoldingStoreTrait::upsert_many(store.as_ref(), vec![stored.clone()])
        .await
        .unwrap();

    // The feed covered a different account entirely.
    let live: HashSet<String> = ["acc-x".to_string()].into_iter().collect();
    let outcome = engine.sync_holdings(Vec::new(), &[stored.clone()], &live).await;

    assert!(outcome.removed_ids.is_empty());
    assert!(store.holding(&stored.id).is_some());
    assert!(store.all_snapshots().is_empty());
}

/// Account store that rejects writes for one configured id.
struct FlakyAccountStore {
    inner: Arc<MemoryStore>,
    fail_id: String,
}

#[async_trait]
impl AccountStoreTrait for FlakyAccountStore {
    fn search_by_item(&self, item_id: &str) -> Result<Vec<Account>> {
        self.inner.search_by_item(item_id)
    }

    async fn upsert_many(&self, accounts: Vec<Account>) -> Result<Vec<WriteResult>> {
        let mut results = Vec::new();
        let mut writable = Vec::new();
        for account in accounts {
            if account.id == self.fail_id {
                results.push(WriteResult::failed(account.id, "disk full"));
            } else {
                writable.push(account);
            }
        }
        results.extend(AccountStoreTrait::upsert_many(self.inner.as_ref(), writable).await?);
        Ok(results)
    }

    async fn delete_many(&self, ids: &[String]) -> Result<usize> {
        AccountStoreTrait::delete_many(self.inner.as_ref(), ids).await
    }
}

#[tokio::test]
async fn one_failing_row_does_not_block_the_rest_of_the_batch() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new("2024-03-05T10:00:00Z".parse().unwrap()));
    let flaky = Arc::new(FlakyAccountStore {
        inner: store.clone(),
        fail_id: "a-bad".to_string(),
    });
    let engine = SnapshotEngine::new(
        flaky,
        store.clone(),
        store.clone(),
        store.clone(),
        clock.clone(),
    );

    let outcome = engine
        .sync_accounts(
            vec![account("a-bad", dec!(10)), account("a-good", dec!(20))],
            &[],
        )
        .await;

    assert_eq!(outcome.upserted, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].0, "a-bad");
    assert!(store.account("a-good").is_some());
    assert!(store.account("a-bad").is_none());
}

#[tokio::test]
async fn snapshot_ids_are_reproducible_from_entity_and_day() {
    let clock = FixedClock::new("2024-03-05T23:59:00Z".parse().unwrap());
    assert_eq!(snapshot_id("a1", clock.today()), "a1-2024-03-05");
    assert_eq!(
        snapshot_id(&holding_id("acc1", "sec1"), clock.today()),
        "acc1|sec1-2024-03-05"
    );
}
