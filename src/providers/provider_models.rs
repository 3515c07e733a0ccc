use chrono::NaiveDate;

use crate::accounts::Account;
use crate::holdings::Holding;
use crate::securities::Security;
use crate::transactions::{InvestmentTransaction, Transaction};

/// Inclusive date window a fetch is bounded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Accounts, holdings and securities returned by an investments fetch.
/// Security ids are the provider's own and must be resolved to canonical
/// ids before the holdings are processed.
#[derive(Debug, Clone, Default)]
pub struct HoldingsFetch {
    pub accounts: Vec<Account>,
    pub holdings: Vec<Holding>,
    pub securities: Vec<Security>,
}

/// Transaction deltas from a cursor-style provider.
#[derive(Debug, Clone, Default)]
pub struct TransactionDelta {
    pub added: Vec<Transaction>,
    pub modified: Vec<Transaction>,
    /// Ids of transactions the provider reports as removed.
    pub removed: Vec<String>,
    pub next_cursor: Option<String>,
}

/// Full window of data from a snapshot-style provider.
#[derive(Debug, Clone, Default)]
pub struct WindowFetch {
    pub accounts: Vec<Account>,
    pub holdings: Vec<Holding>,
    pub securities: Vec<Security>,
    pub transactions: Vec<Transaction>,
    pub investment_transactions: Vec<InvestmentTransaction>,
}
