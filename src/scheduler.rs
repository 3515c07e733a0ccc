use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::constants::SYNC_INTERVAL_SECS;
use crate::errors::Result;
use crate::items::{Item, ItemRegistryTrait, Provider};
use crate::sync::{PlaidSyncService, SimpleFinSyncService};

/// Tuning for the scheduler loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pause between cycles, measured from the end of the previous cycle,
    /// not wall-clock alignment.
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(SYNC_INTERVAL_SECS),
        }
    }
}

/// How one dispatched job settled.
#[derive(Debug)]
pub struct JobResult {
    pub item_id: String,
    pub job: &'static str,
    pub error: Option<String>,
}

/// Aggregate of one scheduler cycle.
#[derive(Debug, Default)]
pub struct CycleSummary {
    pub items: usize,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
}

/// Signals the scheduler loop to exit after its current cycle or sleep.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
}

impl SchedulerHandle {
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

/// Drives every linked item through the sync routine matching its provider,
/// forever, once per fixed interval.
///
/// Per-item and per-entity-kind jobs are dispatched concurrently, and each
/// job settles into a [`JobResult`]: nothing a job does, error or panic,
/// can end the loop or touch a sibling job.
pub struct SyncScheduler {
    registry: Arc<dyn ItemRegistryTrait>,
    plaid: Arc<PlaidSyncService>,
    simplefin: Arc<SimpleFinSyncService>,
    config: SchedulerConfig,
}

impl SyncScheduler {
    pub fn new(
        registry: Arc<dyn ItemRegistryTrait>,
        plaid: Arc<PlaidSyncService>,
        simplefin: Arc<SimpleFinSyncService>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            plaid,
            simplefin,
            config,
        }
    }

    /// Spawns the scheduler loop: an immediate first cycle, then one cycle
    /// per interval until the returned handle is stopped.
    pub fn spawn(self: Arc<Self>) -> (JoinHandle<()>, SchedulerHandle) {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let scheduler = self;
        let task = tokio::spawn(async move {
            info!(
                "Sync scheduler started (interval {:?})",
                scheduler.config.interval
            );
            loop {
                let summary = scheduler.run_cycle().await;
                info!(
                    "Sync cycle finished: {} items, {} jobs ok, {} jobs failed",
                    summary.items, summary.jobs_succeeded, summary.jobs_failed
                );
                tokio::select! {
                    _ = tokio::time::sleep(scheduler.config.interval) => {}
                    _ = stop_rx.changed() => {
                        info!("Sync scheduler stopping");
                        break;
                    }
                }
            }
        });
        (task, SchedulerHandle { stop: stop_tx })
    }

    /// Runs one full cycle over every linked item and reports the settled
    /// results. Public so tests can simulate cycles without sleeping.
    pub async fn run_cycle(&self) -> CycleSummary {
        let items = match self.registry.list_items() {
            Ok(items) => items,
            Err(e) => {
                error!("Failed to enumerate items for sync cycle: {}", e);
                return CycleSummary::default();
            }
        };

        let mut summary = CycleSummary {
            items: items.len(),
            ..CycleSummary::default()
        };

        let jobs: Vec<JoinHandle<JobResult>> = items
            .iter()
            .flat_map(|item| self.spawn_jobs_for_item(item))
            .collect();

        for joined in join_all(jobs).await {
            match joined {
                Ok(result) => match result.error {
                    None => summary.jobs_succeeded += 1,
                    Some(message) => {
                        warn!(
                            "Sync job '{}' for item {} failed: {}",
                            result.job, result.item_id, message
                        );
                        summary.jobs_failed += 1;
                    }
                },
                Err(join_error) => {
                    error!("Sync job panicked: {}", join_error);
                    summary.jobs_failed += 1;
                }
            }
        }
        summary
    }

    fn spawn_jobs_for_item(&self, item: &Item) -> Vec<JoinHandle<JobResult>> {
        match item.provider {
            Provider::Plaid => {
                let accounts = {
                    let service = Arc::clone(&self.plaid);
                    let item = item.clone();
                    tokio::spawn(async move {
                        settle(
                            &item,
                            "accounts+holdings",
                            service.sync_accounts_and_holdings(&item).await.map(|_| ()),
                        )
                    })
                };
                let transactions = {
                    let service = Arc::clone(&self.plaid);
                    let item = item.clone();
                    tokio::spawn(async move {
                        settle(
                            &item,
                            "transactions",
                            service.sync_transactions(&item).await.map(|_| ()),
                        )
                    })
                };
                let investments = {
                    let service = Arc::clone(&self.plaid);
                    let item = item.clone();
                    tokio::spawn(async move {
                        settle(
                            &item,
                            "investment-transactions",
                            service.sync_investment_transactions(&item).await.map(|_| ()),
                        )
                    })
                };
                vec![accounts, transactions, investments]
            }
            Provider::SimpleFin => {
                let service = Arc::clone(&self.simplefin);
                let item = item.clone();
                vec![tokio::spawn(async move {
                    settle(&item, "full-window", service.sync_item(&item).await.map(|_| ()))
                })]
            }
        }
    }
}

fn settle(item: &Item, job: &'static str, result: Result<()>) -> JobResult {
    JobResult {
        item_id: item.id.clone(),
        job,
        error: result.err().map(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::accounts::{Account, Balances};
    use crate::items::ItemStatus;
    use crate::providers::{
        DateWindow, HoldingsFetch, PlaidApiClient, ProviderResult, SimpleFinApiClient,
        TransactionDelta, WindowFetch,
    };
    use crate::securities::SecurityResolver;
    use crate::snapshots::SnapshotEngine;
    use crate::store::MemoryStore;
    use crate::transactions::InvestmentTransaction;
    use crate::utils::time_utils::FixedClock;

    struct StubPlaidClient;

    #[async_trait]
    impl PlaidApiClient for StubPlaidClient {
        async fn fetch_accounts(&self, _item: &Item) -> ProviderResult<Vec<Account>> {
            Ok(Vec::new())
        }

        async fn fetch_holdings(&self, _item: &Item) -> ProviderResult<HoldingsFetch> {
            Ok(HoldingsFetch::default())
        }

        async fn fetch_transaction_delta(
            &self,
            _item: &Item,
            _cursor: Option<&str>,
        ) -> ProviderResult<TransactionDelta> {
            Ok(TransactionDelta::default())
        }

        async fn fetch_investment_transactions(
            &self,
            _item: &Item,
            _window: DateWindow,
        ) -> ProviderResult<Vec<InvestmentTransaction>> {
            Ok(Vec::new())
        }
    }

    struct PanickySimpleFinClient {
        panic_for: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SimpleFinApiClient for PanickySimpleFinClient {
        async fn fetch_window(
            &self,
            item: &Item,
            _window: DateWindow,
        ) -> ProviderResult<WindowFetch> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_for.as_deref() == Some(item.id.as_str()) {
                panic!("provider client blew up for {}", item.id);
            }
            Ok(WindowFetch {
                accounts: vec![Account {
                    id: format!("acc-{}", item.id),
                    item_id: item.id.clone(),
                    name: "Savings".to_string(),
                    account_type: "depository".to_string(),
                    balances: Balances {
                        current: Some(dec!(100)),
                        ..Balances::default()
                    },
                    ..Account::default()
                }],
                ..WindowFetch::default()
            })
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

    fn scheduler_with(
        client: Arc<PanickySimpleFinClient>,
        store: Arc<MemoryStore>,
        interval: Duration,
    ) -> Arc<SyncScheduler> {
        let clock = Arc::new(FixedClock::new("2024-03-05T10:00:00Z".parse().unwrap()));
        let engine = Arc::new(SnapshotEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            clock.clone(),
        ));
        let resolver = Arc::new(SecurityResolver::new(store.clone(), clock.clone()));
        let plaid = Arc::new(PlaidSyncService::new(
            Arc::new(StubPlaidClient),
            store.clone(),
            engine.clone(),
            resolver.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            clock.clone(),
        ));
        let simplefin = Arc::new(SimpleFinSyncService::new(
            client,
            store.clone(),
            engine,
            resolver,
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            clock.clone(),
        ));
        Arc::new(SyncScheduler::new(
            store,
            plaid,
            simplefin,
            SchedulerConfig { interval },
        ))
    }

    #[tokio::test]
    async fn one_items_failure_never_touches_its_siblings() {
        let store = Arc::new(MemoryStore::new());
        for id in ["item-1", "item-2", "item-3"] {
            store.insert_item(simplefin_item(id));
        }
        let client = Arc::new(PanickySimpleFinClient {
            panic_for: Some("item-2".to_string()),
            calls: AtomicUsize::new(0),
        });
        let scheduler = scheduler_with(client.clone(), store.clone(), Duration::from_secs(3600));

        let summary = scheduler.run_cycle().await;
        assert_eq!(summary.items, 3);
        assert_eq!(summary.jobs_succeeded, 2);
        assert_eq!(summary.jobs_failed, 1);
        assert!(store.account("acc-item-1").is_some());
        assert!(store.account("acc-item-2").is_none());
        assert!(store.account("acc-item-3").is_some());

        // The next cycle still runs and retries every item.
        let summary = scheduler.run_cycle().await;
        assert_eq!(summary.items, 3);
        assert_eq!(summary.jobs_failed, 1);
        assert_eq!(client.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn the_loop_keeps_cycling_until_stopped() {
        let store = Arc::new(MemoryStore::new());
        store.insert_item(simplefin_item("item-1"));
        let client = Arc::new(PanickySimpleFinClient {
            panic_for: None,
            calls: AtomicUsize::new(0),
        });
        let scheduler = scheduler_with(client.clone(), store.clone(), Duration::from_secs(3600));

        let (task, handle) = scheduler.spawn();

        // First cycle fires immediately.
        while client.calls.load(Ordering::SeqCst) < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // The next fires one interval after the previous cycle completed.
        while client.calls.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }

        handle.stop();
        task.await.unwrap();
        assert!(store.account("acc-item-1").is_some());
    }
}
