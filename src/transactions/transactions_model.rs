use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// User-owned labeling on a transaction; survives every re-sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLabel {
    pub category: Option<String>,
    pub memo: Option<String>,
}

impl TransactionLabel {
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.memo.is_none()
    }
}

/// A cash transaction as reconciled against the provider feed.
///
/// Providers retire a transaction's id when it transitions from pending to
/// posted; the matching helpers below detect that churn so the row is
/// updated in place instead of duplicated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    pub pending_transaction_id: Option<String>,
    pub name: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub pending: bool,
    pub iso_currency_code: Option<String>,
    pub label: TransactionLabel,
}

/// A user-created split of a transaction across budget categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSplit {
    pub id: String,
    pub transaction_id: String,
    pub amount: Decimal,
    pub label: TransactionLabel,
}

/// An investment activity (buy, sell, dividend, fee, ...) keyed by the
/// provider's id. The provider's type vocabulary passes through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentTransaction {
    pub id: String,
    pub account_id: String,
    pub security_id: Option<String>,
    pub name: String,
    pub amount: Decimal,
    pub quantity: Decimal,
    pub price: Decimal,
    pub date: NaiveDate,
    pub kind: String,
    pub iso_currency_code: Option<String>,
}
