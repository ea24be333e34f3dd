//! User repository.

use crate::error::StoreResult;
use crate::models::UserRow;
use async_trait::async_trait;
use uuid::Uuid;

/// User row lifecycle. All fields except `wrapped_dek` are immutable after
/// creation; `wrapped_dek` transitions exactly once from empty to non-empty.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a new user. A duplicate username fails with `AlreadyExists`.
    async fn create_user(&self, user: &UserRow) -> StoreResult<()>;

    /// Load a user by id.
    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<UserRow>;

    /// Load a user by username.
    async fn get_user_by_username(&self, username: &str) -> StoreResult<UserRow>;

    /// Store the wrapped DEK only if none is set yet. Implemented as a
    /// single conditional UPDATE so two racing bootstraps cannot both win;
    /// the loser gets a version conflict.
    async fn set_wrapped_dek_if_empty(&self, id: Uuid, wrapped: &[u8]) -> StoreResult<()>;
}
