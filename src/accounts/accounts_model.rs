use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance figures as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balances {
    pub available: Option<Decimal>,
    pub current: Option<Decimal>,
    pub limit: Option<Decimal>,
    pub iso_currency_code: Option<String>,
}

/// Per-account chart display preferences, owned by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphOptions {
    pub color: Option<String>,
    pub sort_order: Option<i32>,
}

/// Domain model for a synced account.
///
/// Provider fields are refreshed on every sync. The user-edited block
/// (`custom_name`, `hide`, `budget_label`, `graph_options`) belongs to the
/// stored record and must survive every re-sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub item_id: String,
    pub institution_id: Option<String>,
    pub name: String,
    pub official_name: Option<String>,
    pub mask: Option<String>,
    pub account_type: String,
    pub account_subtype: Option<String>,
    pub balances: Balances,

    pub custom_name: Option<String>,
    pub hide: bool,
    pub budget_label: Option<String>,
    pub graph_options: Option<GraphOptions>,
}

/// Typed patch carrying only the user-edited fields of an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEdits {
    pub custom_name: Option<String>,
    pub hide: Option<bool>,
    pub budget_label: Option<String>,
    pub graph_options: Option<GraphOptions>,
}

impl Account {
    /// Extracts the user-edited fields of a stored account.
    pub fn edits(&self) -> AccountEdits {
        AccountEdits {
            custom_name: self.custom_name.clone(),
            hide: Some(self.hide),
            budget_label: self.budget_label.clone(),
            graph_options: self.graph_options.clone(),
        }
    }

    /// Applies a stored record's edits onto a freshly fetched account.
    /// Provider fields keep the fetched values; only the user-owned block
    /// is copied over, field by field.
    pub fn apply_edits(&mut self, edits: AccountEdits) {
        if let Some(custom_name) = edits.custom_name {
            self.custom_name = Some(custom_name);
        }
        if let Some(hide) = edits.hide {
            self.hide = hide;
        }
        if let Some(budget_label) = edits.budget_label {
            self.budget_label = Some(budget_label);
        }
        if let Some(graph_options) = edits.graph_options {
            self.graph_options = Some(graph_options);
        }
    }

    /// Whether the externally observable state matches `other`. User edits
    /// are excluded: renaming an account must not fabricate a snapshot.
    pub fn observably_equal(&self, other: &Account) -> bool {
        self.balances == other.balances
            && self.name == other.name
            && self.official_name == other.official_name
            && self.mask == other.mask
            && self.account_type == other.account_type
            && self.account_subtype == other.account_subtype
            && self.institution_id == other.institution_id
    }
}
