use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::accounts::Account;
use crate::holdings::Holding;
use crate::securities::Security;

/// Builds the per-day snapshot key. At most one snapshot exists per entity
/// per calendar day: a later sync on the same day overwrites rather than
/// duplicates that day's row.
pub fn snapshot_id(entity_id: &str, date: NaiveDate) -> String {
    format!("{}-{}", entity_id, date.format("%Y-%m-%d"))
}

/// Point-in-time capture of an account's balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub id: String,
    pub account_id: String,
    pub date: NaiveDate,
    pub available: Option<Decimal>,
    pub current: Option<Decimal>,
    pub limit: Option<Decimal>,
    pub currency: Option<String>,
}

impl AccountSnapshot {
    pub fn capture(account: &Account, date: NaiveDate) -> Self {
        Self {
            id: snapshot_id(&account.id, date),
            account_id: account.id.clone(),
            date,
            available: account.balances.available,
            current: account.balances.current,
            limit: account.balances.limit,
            currency: account.balances.iso_currency_code.clone(),
        }
    }
}

/// Point-in-time capture of a holding's valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingSnapshot {
    pub id: String,
    pub holding_id: String,
    pub account_id: String,
    pub date: NaiveDate,
    pub quantity: Decimal,
    pub value: Option<Decimal>,
    pub cost_basis: Option<Decimal>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
}

impl HoldingSnapshot {
    pub fn capture(holding: &Holding, date: NaiveDate) -> Self {
        Self {
            id: snapshot_id(&holding.id, date),
            holding_id: holding.id.clone(),
            account_id: holding.account_id.clone(),
            date,
            quantity: holding.quantity,
            value: holding.institution_value,
            cost_basis: holding.cost_basis,
            price: holding.institution_price,
            currency: holding.iso_currency_code.clone(),
        }
    }
}

/// Point-in-time capture of a security's closing price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySnapshot {
    pub id: String,
    pub security_id: String,
    pub date: NaiveDate,
    pub close_price: Option<Decimal>,
    pub close_price_as_of: Option<NaiveDate>,
    pub currency: Option<String>,
}

impl SecuritySnapshot {
    pub fn capture(security: &Security, date: NaiveDate) -> Self {
        Self {
            id: snapshot_id(&security.id, date),
            security_id: security.id.clone(),
            date,
            close_price: security.close_price,
            close_price_as_of: security.close_price_as_of,
            currency: security.currency.clone(),
        }
    }
}

/// A dated, immutable capture of one entity's externally observable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Snapshot {
    Account(AccountSnapshot),
    Holding(HoldingSnapshot),
    Security(SecuritySnapshot),
}

impl Snapshot {
    pub fn id(&self) -> &str {
        match self {
            Snapshot::Account(snapshot) => &snapshot.id,
            Snapshot::Holding(snapshot) => &snapshot.id,
            Snapshot::Security(snapshot) => &snapshot.id,
        }
    }

    pub fn entity_id(&self) -> &str {
        match self {
            Snapshot::Account(snapshot) => &snapshot.account_id,
            Snapshot::Holding(snapshot) => &snapshot.holding_id,
            Snapshot::Security(snapshot) => &snapshot.security_id,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Snapshot::Account(snapshot) => snapshot.date,
            Snapshot::Holding(snapshot) => snapshot.date,
            Snapshot::Security(snapshot) => snapshot.date,
        }
    }
}
