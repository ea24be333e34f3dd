//! Item repository: versioned access to encrypted records.

use crate::error::StoreResult;
use crate::models::{Change, ItemRow, ItemVersion, UpsertIntent};
use async_trait::async_trait;
use uuid::Uuid;

/// Versioned access to encrypted items.
///
/// Version semantics: `ver` is strictly monotonic per `(user, item)` and
/// increments by one on every committed mutation. `ver = 0` never appears in
/// a stored row; it is only valid as the `base_ver` of a create intent.
#[async_trait]
pub trait ItemRepo: Send + Sync {
    /// Insert or update items under optimistic concurrency.
    ///
    /// The batch is atomic: a base version mismatch on any intent aborts the
    /// whole transaction with a version conflict naming the failing index,
    /// and nothing is persisted.
    async fn upsert_batch(
        &self,
        user_id: Uuid,
        intents: &[UpsertIntent],
    ) -> StoreResult<Vec<ItemVersion>>;

    /// Tombstone an item (`deleted = true`, `ver + 1`) with a base version
    /// check. The stored payload is left in place so clients that have not
    /// observed the deletion can still fetch it.
    async fn delete_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        base_ver: i64,
    ) -> StoreResult<ItemVersion>;

    /// All changes with `ver > since_ver`, ordered by `ver` ascending.
    /// Tombstoned rows come back without payload.
    async fn get_changes_since(&self, user_id: Uuid, since_ver: i64) -> StoreResult<Vec<Change>>;

    /// Fetch a single item (tombstones included).
    async fn get_item(&self, user_id: Uuid, item_id: Uuid) -> StoreResult<ItemRow>;

    /// The largest `ver` present for the user, or 0.
    async fn get_max_version(&self, user_id: Uuid) -> StoreResult<i64>;
}
