use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal_macros::dec;

use crate::accounts::{Account, Balances};
use crate::holdings::{holding_id, Holding};
use crate::items::{Item, ItemRegistryTrait, ItemStatus, Provider};
use crate::providers::{
    DateWindow, ProviderResult, SimpleFinApiClient, WindowFetch,
};
use crate::securities::{Security, SecurityResolver};
use crate::snapshots::{snapshot_id, Snapshot, SnapshotEngine};
use crate::store::{
    AccountStoreTrait, HoldingStoreTrait, MemoryStore, TransactionStoreTrait,
};
use crate::sync::SimpleFinSyncService;
use crate::transactions::{Transaction, TransactionLabel};
use crate::utils::time_utils::{Clock, FixedClock};

#[derive(Default)]
struct MockSimpleFinClient {
    fetch: Mutex<WindowFetch>,
    windows: Mutex<Vec<DateWindow>>,
}

#[async_trait]
impl SimpleFinApiClient for MockSimpleFinClient {
    async fn fetch_window(&self, _item: &Item, window: DateWindow) -> ProviderResult<WindowFetch> {
        self.windows.lock().unwrap().push(window);
        Ok(self.fetch.lock().unwrap().clone())
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    client: Arc<MockSimpleFinClient>,
    service: SimpleFinSyncService,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new("2024-03-05T10:00:00Z".parse().unwrap()));
    let client = Arc::new(MockSimpleFinClient::default());
    let engine = Arc::new(SnapshotEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        clock.clone(),
    ));
    let resolver = Arc::new(SecurityResolver::new(store.clone(), clock.clone()));
    let service = SimpleFinSyncService::new(
        client.clone(),
        store.clone(),
        engine,
        resolver,
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        clock.clone(),
    );
    Fixture {
        store,
        clock,
        client,
        service,
    }
}

fn simplefin_item(id: &str) -> Item {
    Item {
        id: id.to_string(),
        provider: Provider::SimpleFin,
        institution_id: None,
        institution_name: None,
        status: ItemStatus::Good,
        transactions_cursor: None,
        last_synced_at: None,
        supports_investments: false,
    }
}

fn account(id: &str, item_id: &str, current: rust_decimal::Decimal) -> Account {
    Account {
        id: id.to_string(),
        item_id: item_id.to_string(),
        name: "Savings".to_string(),
        account_type: "depository".to_string(),
        balances: Balances {
            current: Some(current),
            ..Balances::default()
        },
        ..Account::default()
    }
}

fn transaction(id: &str, account_id: &str, name: &str, date: &str) -> Transaction {
    Transaction {
        id: id.to_string(),
        account_id: account_id.to_string(),
        name: name.to_string(),
        amount: dec!(10),
        date: date.parse().unwrap(),
        ..Transaction::default()
    }
}

#[tokio::test]
async fn the_first_sync_window_reaches_two_years_back() {
    let fixture = fixture();
    let item = simplefin_item("sf-1");
    fixture.store.insert_item(item.clone());

    fixture.service.sync_item(&item).await.unwrap();

    let windows = fixture.client.windows.lock().unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(
        windows[0].start,
        fixture.clock.today() - chrono::Duration::days(730)
    );
}

#[tokio::test]
async fn a_resync_window_starts_fourteen_days_before_the_last_sync() {
    let fixture = fixture();
    let mut item = simplefin_item("sf-1");
    item.last_synced_at = Some("2024-03-01T09:00:00Z".parse().unwrap());
    fixture.store.insert_item(item.clone());

    fixture.service.sync_item(&item).await.unwrap();

    let windows = fixture.client.windows.lock().unwrap();
    assert_eq!(windows[0].start, "2024-02-16".parse().unwrap());
    assert_eq!(windows[0].end, fixture.clock.today());
}

#[tokio::test]
async fn set_difference_removal_exempts_rows_dated_before_the_window() {
    let fixture = fixture();
    let mut item = simplefin_item("sf-1");
    item.last_synced_at = Some("2024-03-01T09:00:00Z".parse().unwrap());
    fixture.store.insert_item(item.clone());

    AccountStoreTrait::upsert_many(
        fixture.store.as_ref(),
        vec![account("acc-s", "sf-1", dec!(900))],
    )
    .await
    .unwrap();
    TransactionStoreTrait::upsert_many(
        fixture.store.as_ref(),
        vec![
            // Window starts 2024-02-16: this row was re-fetched and is gone.
            transaction("tx-in", "acc-s", "Groceries", "2024-03-01"),
            // Never re-fetched, never eligible for removal.
            transaction("tx-old", "acc-s", "Rent", "2023-01-01"),
        ],
    )
    .await
    .unwrap();

    *fixture.client.fetch.lock().unwrap() = WindowFetch {
        accounts: vec![account("acc-s", "sf-1", dec!(900))],
        ..WindowFetch::default()
    };

    let summary = fixture.service.sync_item(&item).await.unwrap();

    assert_eq!(summary.transactions.removed, 1);
    assert!(fixture.store.transaction("tx-in").is_none());
    assert!(fixture.store.transaction("tx-old").is_some());
}

#[tokio::test]
async fn labels_ride_provider_id_churn_across_full_refetches() {
    let fixture = fixture();
    let mut item = simplefin_item("sf-1");
    item.last_synced_at = Some("2024-03-01T09:00:00Z".parse().unwrap());
    fixture.store.insert_item(item.clone());

    AccountStoreTrait::upsert_many(
        fixture.store.as_ref(),
        vec![account("acc-s", "sf-1", dec!(900))],
    )
    .await
    .unwrap();
    let mut stored = transaction("old-id", "acc-s", "Coffee", "2024-03-01");
    stored.label = TransactionLabel {
        category: Some("Dining".to_string()),
        memo: None,
    };
    TransactionStoreTrait::upsert_many(fixture.store.as_ref(), vec![stored])
        .await
        .unwrap();

    *fixture.client.fetch.lock().unwrap() = WindowFetch {
        accounts: vec![account("acc-s", "sf-1", dec!(900))],
        transactions: vec![transaction("new-id", "acc-s", "Coffee", "2024-03-01")],
        ..WindowFetch::default()
    };

    let summary = fixture.service.sync_item(&item).await.unwrap();

    let replacement = fixture.store.transaction("new-id").unwrap();
    assert_eq!(replacement.label.category.as_deref(), Some("Dining"));
    assert!(fixture.store.transaction("old-id").is_none());
    // The replaced row is an id transition, not a removal.
    assert_eq!(summary.transactions.removed, 0);
}

#[tokio::test]
async fn a_sold_out_holding_drops_to_zero_before_deletion() {
    let fixture = fixture();
    let item = simplefin_item("sf-1");
    fixture.store.insert_item(item.clone());

    let canonical = Security {
        id: "canon-1".to_string(),
        provider_security_id: Some("sf-sec-1".to_string()),
        ticker_symbol: Some("VTI".to_string()),
        currency: Some("USD".to_string()),
        ..Security::default()
    };
    crate::store::SecurityStoreTrait::upsert_many(fixture.store.as_ref(), vec![canonical])
        .await
        .unwrap();
    let stored_holding = Holding {
        id: holding_id("acc-s", "canon-1"),
        account_id: "acc-s".to_string(),
        security_id: "canon-1".to_string(),
        quantity: dec!(8),
        institution_value: Some(dec!(1600)),
        ..Holding::default()
    };
    HoldingStoreTrait::upsert_many(fixture.store.as_ref(), vec![stored_holding.clone()])
        .await
        .unwrap();
    AccountStoreTrait::upsert_many(
        fixture.store.as_ref(),
        vec![account("acc-s", "sf-1", dec!(900))],
    )
    .await
    .unwrap();

    // The new window reports the account but no holdings.
    *fixture.client.fetch.lock().unwrap() = WindowFetch {
        accounts: vec![account("acc-s", "sf-1", dec!(900))],
        ..WindowFetch::default()
    };

    let summary = fixture.service.sync_item(&item).await.unwrap();
    assert_eq!(summary.accounts.holdings_removed, 1);
    assert!(fixture.store.holding(&stored_holding.id).is_none());
    match fixture
        .store
        .snapshot(&snapshot_id(&stored_holding.id, fixture.clock.today()))
        .unwrap()
    {
        Snapshot::Holding(snapshot) => assert_eq!(snapshot.quantity, dec!(0)),
        other => panic!("expected a holding snapshot, got {:?}", other),
    }
}

#[tokio::test]
async fn securities_are_minted_and_holdings_rewritten_to_canonical_ids() {
    let fixture = fixture();
    let item = simplefin_item("sf-1");
    fixture.store.insert_item(item.clone());

    *fixture.client.fetch.lock().unwrap() = WindowFetch {
        accounts: vec![account("acc-s", "sf-1", dec!(900))],
        holdings: vec![Holding {
            id: String::new(),
            account_id: "acc-s".to_string(),
            security_id: "sf-sec-9".to_string(),
            quantity: dec!(3),
            institution_value: Some(dec!(600)),
            ..Holding::default()
        }],
        securities: vec![Security {
            id: "sf-sec-9".to_string(),
            provider_security_id: Some("sf-sec-9".to_string()),
            ticker_symbol: Some("VXUS".to_string()),
            currency: Some("USD".to_string()),
            ..Security::default()
        }],
        ..WindowFetch::default()
    };

    fixture.service.sync_item(&item).await.unwrap();

    let securities = fixture.store.all_securities();
    assert_eq!(securities.len(), 1);
    let canonical = securities[0].id.clone();
    assert_ne!(canonical, "sf-sec-9");
    assert!(fixture
        .store
        .holding(&holding_id("acc-s", &canonical))
        .is_some());
}

#[tokio::test]
async fn a_clean_pass_advances_the_window_bookmark() {
    let fixture = fixture();
    let item = simplefin_item("sf-1");
    fixture.store.insert_item(item.clone());
    *fixture.client.fetch.lock().unwrap() = WindowFetch {
        accounts: vec![account("acc-s", "sf-1", dec!(900))],
        ..WindowFetch::default()
    };

    fixture.service.sync_item(&item).await.unwrap();

    assert_eq!(
        fixture.store.get_item("sf-1").unwrap().last_synced_at,
        Some(fixture.clock.now())
    );
}
