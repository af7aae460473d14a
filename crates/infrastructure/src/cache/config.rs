//! Orchestrator settings derived from the cache configuration

use std::time::Duration;
use taskcache_config::CacheConfig;

/// Settings handed to [`super::CachedTaskStore`] at construction.
#[derive(Debug, Clone)]
pub struct TaskCacheSettings {
    /// TTL applied to an owner's hash on every read or write
    pub ttl: Duration,
    /// Namespace prepended to cache keys
    pub key_prefix: Option<String>,
    /// Share one backing-store load between concurrent cold misses
    pub coalesce_misses: bool,
    /// Require the completeness field before trusting a full-hash read
    pub track_completeness: bool,
}

impl Default for TaskCacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            key_prefix: None,
            coalesce_misses: false,
            track_completeness: false,
        }
    }
}

impl TaskCacheSettings {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.task_ttl_seconds),
            key_prefix: config.key_prefix.clone(),
            coalesce_misses: config.coalesce_misses,
            track_completeness: config.track_completeness,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_coalesced_misses(mut self, enabled: bool) -> Self {
        self.coalesce_misses = enabled;
        self
    }

    pub fn with_completeness_tracking(mut self, enabled: bool) -> Self {
        self.track_completeness = enabled;
        self
    }

    pub fn key_for(&self, owner_id: i64) -> String {
        super::namespaced_tasks_key(self.key_prefix.as_deref(), owner_id)
    }
}
