use async_trait::async_trait;

use super::provider_errors::ProviderError;
use super::provider_models::{DateWindow, HoldingsFetch, TransactionDelta, WindowFetch};
use crate::accounts::Account;
use crate::items::Item;
use crate::transactions::InvestmentTransaction;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Black-box client for the cursor-delta provider (Plaid).
///
/// Pagination, transport and auth live behind this trait; a hung call is
/// the client's responsibility to time out. The sync routines treat any
/// failure as an eventual per-item error.
#[async_trait]
pub trait PlaidApiClient: Send + Sync {
    async fn fetch_accounts(&self, item: &Item) -> ProviderResult<Vec<Account>>;

    async fn fetch_holdings(&self, item: &Item) -> ProviderResult<HoldingsFetch>;

    /// Fetches everything that changed since `cursor`. A `None` cursor asks
    /// for the provider's full initial backfill (two years).
    async fn fetch_transaction_delta(
        &self,
        item: &Item,
        cursor: Option<&str>,
    ) -> ProviderResult<TransactionDelta>;

    async fn fetch_investment_transactions(
        &self,
        item: &Item,
        window: DateWindow,
    ) -> ProviderResult<Vec<InvestmentTransaction>>;
}

/// Black-box client for the windowed full-snapshot provider (SimpleFin).
/// No delta API exists; every call returns the complete window.
#[async_trait]
pub trait SimpleFinApiClient: Send + Sync {
    async fn fetch_window(&self, item: &Item, window: DateWindow) -> ProviderResult<WindowFetch>;
}
