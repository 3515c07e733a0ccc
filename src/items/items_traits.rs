use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::items_model::{Item, ItemStatus};
use crate::errors::Result;

/// Contract the sync routines and scheduler use to enumerate linked items
/// and persist their sync bookkeeping.
#[async_trait]
pub trait ItemRegistryTrait: Send + Sync {
    fn list_items(&self) -> Result<Vec<Item>>;
    fn get_item(&self, item_id: &str) -> Result<Item>;
    async fn update_cursor(&self, item_id: &str, cursor: Option<String>) -> Result<()>;
    async fn update_last_synced(&self, item_id: &str, synced_at: DateTime<Utc>) -> Result<()>;
    async fn update_status(&self, item_id: &str, status: ItemStatus) -> Result<()>;
}
