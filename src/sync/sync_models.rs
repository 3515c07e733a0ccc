use serde::{Deserialize, Serialize};

/// Counts from one accounts-and-holdings sync leg for one item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSyncSummary {
    pub accounts_upserted: usize,
    pub holdings_upserted: usize,
    pub holdings_removed: usize,
    pub securities_upserted: usize,
    pub snapshots_written: usize,
    pub item_flagged: bool,
    pub errors: Vec<(String, String)>,
}

/// Counts from one cash-transaction sync leg for one item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSyncSummary {
    pub upserted: usize,
    pub removed: usize,
    pub splits_removed: usize,
    pub cursor_advanced: bool,
    pub item_flagged: bool,
    pub errors: Vec<(String, String)>,
}

/// Counts from one investment-transaction sync leg for one item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentSyncSummary {
    pub upserted: usize,
    pub removed: usize,
    pub item_flagged: bool,
    pub errors: Vec<(String, String)>,
}

/// Everything one combined full-window sync produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSyncSummary {
    pub accounts: AccountSyncSummary,
    pub transactions: TransactionSyncSummary,
    pub investments: InvestmentSyncSummary,
}

impl ItemSyncSummary {
    pub fn has_errors(&self) -> bool {
        !self.accounts.errors.is_empty()
            || !self.transactions.errors.is_empty()
            || !self.investments.errors.is_empty()
    }
}
