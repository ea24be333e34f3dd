//! Item service: input validation in front of the item repository.
//!
//! A thin gatekeeper; it adds no logic beyond validation and delegation, so
//! bad input never reaches the repository.

use crate::error::{ApiError, ApiResult};
use gophkeeper_store::VaultStore;
use gophkeeper_store::models::{Change, ItemRow, ItemVersion, UpsertIntent};
use std::sync::Arc;
use uuid::Uuid;

/// Operations over encrypted items with versioning.
pub struct ItemService {
    store: Arc<dyn VaultStore>,
    max_batch: usize,
}

impl ItemService {
    pub fn new(store: Arc<dyn VaultStore>, max_batch: usize) -> Self {
        let max_batch = if max_batch == 0 {
            gophkeeper_core::DEFAULT_MAX_BATCH
        } else {
            max_batch
        };
        Self { store, max_batch }
    }

    /// Create or update items atomically and return new versions.
    pub async fn upsert(
        &self,
        user_id: Uuid,
        intents: Vec<UpsertIntent>,
    ) -> ApiResult<Vec<ItemVersion>> {
        if user_id.is_nil() {
            return Err(ApiError::Validation("empty user id".to_string()));
        }
        if intents.is_empty() {
            return Ok(Vec::new());
        }
        if intents.len() > self.max_batch {
            return Err(ApiError::Validation(format!(
                "batch too large ({} > {})",
                intents.len(),
                self.max_batch
            )));
        }
        for (i, intent) in intents.iter().enumerate() {
            if intent.id.is_nil() {
                return Err(ApiError::Validation(format!("item[{i}]: empty id")));
            }
            if intent.base_ver < 0 {
                return Err(ApiError::Validation(format!(
                    "item[{i}]: negative base_ver"
                )));
            }
            if intent.blob_enc.is_empty() {
                return Err(ApiError::Validation(format!("item[{i}]: empty blob")));
            }
        }
        Ok(self.store.upsert_batch(user_id, &intents).await?)
    }

    /// Tombstone an item with optimistic concurrency.
    pub async fn delete(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        base_ver: i64,
    ) -> ApiResult<ItemVersion> {
        if user_id.is_nil() || item_id.is_nil() {
            return Err(ApiError::Validation("empty user or item id".to_string()));
        }
        if base_ver < 0 {
            return Err(ApiError::Validation("negative base_ver".to_string()));
        }
        Ok(self.store.delete_item(user_id, item_id, base_ver).await?)
    }

    /// All changes with `ver > since_ver` for delta sync.
    pub async fn get_changes(&self, user_id: Uuid, since_ver: i64) -> ApiResult<Vec<Change>> {
        if user_id.is_nil() {
            return Err(ApiError::Validation("empty user id".to_string()));
        }
        if since_ver < 0 {
            return Err(ApiError::Validation("negative since_ver".to_string()));
        }
        Ok(self.store.get_changes_since(user_id, since_ver).await?)
    }

    /// Fetch a single item by id.
    pub async fn get_one(&self, user_id: Uuid, item_id: Uuid) -> ApiResult<ItemRow> {
        if user_id.is_nil() || item_id.is_nil() {
            return Err(ApiError::Validation("empty user or item id".to_string()));
        }
        Ok(self.store.get_item(user_id, item_id).await?)
    }
}
