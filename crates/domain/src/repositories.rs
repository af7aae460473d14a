//! Backing store abstraction.
//!
//! Every method is owner-scoped and atomic. The store is the source of truth;
//! nothing here knows about the cache.

use async_trait::async_trait;
use taskcache_errors::TaskCacheResult;

use crate::entities::{NewTask, Task};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Persists a new task and returns the id assigned by the store.
    async fn create(&self, owner_id: i64, task: &NewTask) -> TaskCacheResult<i64>;
    async fn list_all(&self, owner_id: i64) -> TaskCacheResult<Vec<Task>>;
    async fn find_by_id(&self, owner_id: i64, id: i64) -> TaskCacheResult<Option<Task>>;
    /// Fails with `TaskNotFound` when no row matches; never inserts.
    async fn update_description(
        &self,
        owner_id: i64,
        id: i64,
        description: &str,
    ) -> TaskCacheResult<()>;
    /// Fails with `TaskNotFound` when no row matches.
    async fn delete(&self, owner_id: i64, id: i64) -> TaskCacheResult<()>;
}
