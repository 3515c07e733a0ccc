use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External data provider a linked item syncs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provider {
    Plaid,
    SimpleFin,
}

/// Health of a linked item's provider connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ItemStatus {
    Good,
    Bad,
}

/// A single linked institution login, tracked with its own sync bookmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub provider: Provider,
    pub institution_id: Option<String>,
    pub institution_name: Option<String>,
    pub status: ItemStatus,
    /// Opaque delta bookmark handed back by the provider; advanced only
    /// after a successful transaction write.
    pub transactions_cursor: Option<String>,
    /// End of the last successfully synced window.
    pub last_synced_at: Option<DateTime<Utc>>,
    pub supports_investments: bool,
}

impl Item {
    /// Whether this item has never completed a sync.
    pub fn is_first_sync(&self) -> bool {
        self.last_synced_at.is_none()
    }
}
