use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use taskcache_errors::TaskCacheResult;

/// Interface for a shared, hash-structured key-value cache.
///
/// A key holds a map of string fields to string values and carries a single
/// time-to-live for the whole map. Expiry is enforced by the store.
#[async_trait]
pub trait HashCacheStore: Send + Sync {
    async fn hash_set_many(&self, key: &str, fields: &[(String, String)]) -> TaskCacheResult<()>;
    async fn hash_set_one(&self, key: &str, field: &str, value: &str) -> TaskCacheResult<()>;
    async fn hash_get_one(&self, key: &str, field: &str) -> TaskCacheResult<Option<String>>;
    /// An absent or expired key yields an empty map.
    async fn hash_get_all(&self, key: &str) -> TaskCacheResult<HashMap<String, String>>;
    /// Returns whether the field existed. The key's TTL is left as is.
    async fn hash_delete_field(&self, key: &str, field: &str) -> TaskCacheResult<bool>;
    async fn expire_after(&self, key: &str, ttl: Duration) -> TaskCacheResult<()>;
    async fn health_check(&self) -> TaskCacheResult<bool>;

    /// Writes the fields and resets the TTL of the key.
    ///
    /// Stores that can do so override this to apply both in one atomic step.
    async fn hash_set_with_ttl(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> TaskCacheResult<()> {
        self.hash_set_many(key, fields).await?;
        self.expire_after(key, ttl).await
    }
}
