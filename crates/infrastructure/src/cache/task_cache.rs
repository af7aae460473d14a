//! Cache-aside orchestration of task operations
//!
//! The backing store is always the source of truth. Durable failures abort an
//! operation before the cache is touched; cache failures after a commit are
//! returned as the outcome's warning and logged once per operation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use taskcache_domain::entities::{NewTask, Task};
use taskcache_domain::ports::HashCacheStore;
use taskcache_domain::repositories::TaskRepository;
use taskcache_domain::services::TaskOperations;
use taskcache_domain::value_objects::CacheOutcome;
use taskcache_errors::{TaskCacheError, TaskCacheResult};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::codec::{decode_hash, decode_task, encode_task, encode_tasks};
use super::config::TaskCacheSettings;
use super::single_flight::SingleFlight;
use super::{task_field, CacheStats, COMPLETENESS_FIELD};

/// Task operations backed by a repository and fronted by a hash cache
pub struct CachedTaskStore {
    /// Source of truth
    inner: Arc<dyn TaskRepository>,
    cache: Arc<dyn HashCacheStore>,
    settings: TaskCacheSettings,
    stats: Arc<RwLock<CacheStats>>,
    list_loads: SingleFlight<CacheOutcome<Vec<Task>>>,
    task_loads: SingleFlight<CacheOutcome<Task>>,
}

impl CachedTaskStore {
    pub fn new(
        inner: Arc<dyn TaskRepository>,
        cache: Arc<dyn HashCacheStore>,
        settings: TaskCacheSettings,
    ) -> Self {
        Self {
            inner,
            cache,
            settings,
            stats: Arc::new(RwLock::new(CacheStats::default())),
            list_loads: SingleFlight::new(),
            task_loads: SingleFlight::new(),
        }
    }

    pub fn settings(&self) -> &TaskCacheSettings {
        &self.settings
    }

    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    pub async fn cache_health(&self) -> TaskCacheResult<bool> {
        self.cache.health_check().await
    }

    async fn record_hit(&self) {
        metrics::counter!("taskcache_cache_hits_total").increment(1);
        self.stats.write().await.hits += 1;
    }

    async fn record_miss(&self) {
        metrics::counter!("taskcache_cache_misses_total").increment(1);
        self.stats.write().await.misses += 1;
    }

    async fn record_error(&self) {
        metrics::counter!("taskcache_cache_errors_total").increment(1);
        self.stats.write().await.errors += 1;
    }

    /// Whether a full-hash read may stand in for the backing store.
    fn is_trusted_collection(&self, fields: &HashMap<String, String>) -> bool {
        if self.settings.track_completeness {
            fields.contains_key(COMPLETENESS_FIELD)
        } else {
            // A marker left behind by completeness tracking is not data.
            fields.keys().any(|field| field != COMPLETENESS_FIELD)
        }
    }

    /// Writes fields and resets the key TTL in one step.
    async fn write_through(&self, key: &str, fields: &[(String, String)]) -> Option<TaskCacheError> {
        if fields.is_empty() {
            return None;
        }
        match self
            .cache
            .hash_set_with_ttl(key, fields, self.settings.ttl)
            .await
        {
            Ok(()) => {
                metrics::counter!("taskcache_cache_write_throughs_total").increment(1);
                self.stats.write().await.write_throughs += 1;
                None
            }
            Err(e) => {
                self.record_error().await;
                Some(e)
            }
        }
    }

    async fn refresh_ttl(&self, key: &str) -> Option<TaskCacheError> {
        match self.cache.expire_after(key, self.settings.ttl).await {
            Ok(()) => None,
            Err(e) => {
                self.record_error().await;
                Some(e)
            }
        }
    }

    async fn read_all(&self, key: &str) -> Result<HashMap<String, String>, TaskCacheError> {
        let result = self.cache.hash_get_all(key).await;
        if result.is_err() {
            self.record_error().await;
        }
        result
    }

    async fn read_one(&self, key: &str, field: &str) -> Result<Option<String>, TaskCacheError> {
        let result = self.cache.hash_get_one(key, field).await;
        if result.is_err() {
            self.record_error().await;
        }
        result
    }

    /// Drops the completeness marker so the next full read goes to the
    /// backing store. Only needed once the hash may be missing a row.
    async fn forget_completeness(&self, key: &str) {
        if !self.settings.track_completeness {
            return;
        }
        if let Err(e) = self.cache.hash_delete_field(key, COMPLETENESS_FIELD).await {
            self.record_error().await;
            debug!("Could not clear completeness marker on {}: {}", key, e);
        }
    }

    /// Best-effort removal of a field that may now be stale.
    async fn evict(&self, key: &str, field: &str) {
        match self.cache.hash_delete_field(key, field).await {
            Ok(_) => {
                metrics::counter!("taskcache_cache_invalidations_total").increment(1);
                self.stats.write().await.invalidations += 1;
                debug!("Evicted {} field {}", key, field);
            }
            Err(e) => {
                self.record_error().await;
                debug!("Could not evict {} field {}: {}", key, field, e);
            }
        }
        self.forget_completeness(key).await;
    }

    fn finish<T>(&self, operation: &str, owner_id: i64, outcome: CacheOutcome<T>) -> CacheOutcome<T> {
        if let Some(error) = outcome.warning() {
            warn!(
                operation,
                owner_id,
                error = %error,
                "Cache out of step with backing store; returning durable result"
            );
        }
        outcome
    }

    async fn load_all(&self, owner_id: i64, key: &str) -> TaskCacheResult<CacheOutcome<Vec<Task>>> {
        let tasks = self.inner.list_all(owner_id).await?;
        let mut fields = encode_tasks(&tasks)?;
        if self.settings.track_completeness {
            fields.push((
                COMPLETENESS_FIELD.to_string(),
                Utc::now().timestamp().to_string(),
            ));
        }
        let warning = self.write_through(key, &fields).await;
        debug!("Loaded {} tasks for owner {} from backing store", tasks.len(), owner_id);
        Ok(CacheOutcome {
            value: tasks,
            cache_error: warning,
        })
    }

    async fn load_one(
        &self,
        owner_id: i64,
        id: i64,
        key: &str,
        field: &str,
    ) -> TaskCacheResult<CacheOutcome<Task>> {
        let task = self
            .inner
            .find_by_id(owner_id, id)
            .await?
            .ok_or_else(|| TaskCacheError::task_not_found(owner_id, id))?;
        let value = encode_task(&task)?;
        let warning = self
            .write_through(key, &[(field.to_string(), value)])
            .await;
        Ok(CacheOutcome {
            value: task,
            cache_error: warning,
        })
    }
}

#[async_trait]
impl TaskOperations for CachedTaskStore {
    #[instrument(skip(self, task))]
    async fn create_task(&self, owner_id: i64, task: NewTask) -> TaskCacheResult<CacheOutcome<i64>> {
        let id = self.inner.create(owner_id, &task).await?;
        let key = self.settings.key_for(owner_id);
        let record = task.into_task(id, owner_id);
        let value = encode_task(&record)?;

        let warning = self.write_through(&key, &[(task_field(id), value)]).await;
        if warning.is_some() {
            self.forget_completeness(&key).await;
        }
        Ok(self.finish(
            "create_task",
            owner_id,
            CacheOutcome::clean(id).with_warning(warning),
        ))
    }

    #[instrument(skip(self))]
    async fn get_all_tasks(&self, owner_id: i64) -> TaskCacheResult<CacheOutcome<Vec<Task>>> {
        let key = self.settings.key_for(owner_id);

        let read_warning = match self.read_all(&key).await {
            Ok(fields) if self.is_trusted_collection(&fields) => {
                let tasks = decode_hash(&key, owner_id, &fields)?;
                self.record_hit().await;
                debug!("Cache hit for {} ({} tasks)", key, tasks.len());
                let warning = self.refresh_ttl(&key).await;
                return Ok(self.finish(
                    "get_all_tasks",
                    owner_id,
                    CacheOutcome::clean(tasks).with_warning(warning),
                ));
            }
            Ok(_) => None,
            Err(e) => Some(e),
        };

        self.record_miss().await;
        debug!("Cache miss for {}", key);

        let loaded = if self.settings.coalesce_misses {
            self.list_loads
                .run(&key, || self.load_all(owner_id, &key))
                .await?
        } else {
            self.load_all(owner_id, &key).await?
        };

        // The read failure is reported ahead of any write-through failure.
        let outcome = CacheOutcome::clean(loaded.value)
            .with_warning(read_warning)
            .with_warning(loaded.cache_error);
        Ok(self.finish("get_all_tasks", owner_id, outcome))
    }

    #[instrument(skip(self))]
    async fn get_task_by_id(&self, owner_id: i64, id: i64) -> TaskCacheResult<CacheOutcome<Task>> {
        let key = self.settings.key_for(owner_id);
        let field = task_field(id);

        let read_warning = match self.read_one(&key, &field).await {
            Ok(Some(raw)) => {
                let task = decode_task(&key, &field, owner_id, &raw)?;
                self.record_hit().await;
                debug!("Cache hit for {} field {}", key, field);
                let warning = self.refresh_ttl(&key).await;
                return Ok(self.finish(
                    "get_task_by_id",
                    owner_id,
                    CacheOutcome::clean(task).with_warning(warning),
                ));
            }
            Ok(None) => None,
            Err(e) => Some(e),
        };

        self.record_miss().await;
        debug!("Cache miss for {} field {}", key, field);

        let loaded = if self.settings.coalesce_misses {
            let flight_key = format!("{key}#{field}");
            self.task_loads
                .run(&flight_key, || self.load_one(owner_id, id, &key, &field))
                .await?
        } else {
            self.load_one(owner_id, id, &key, &field).await?
        };

        let outcome = CacheOutcome::clean(loaded.value)
            .with_warning(read_warning)
            .with_warning(loaded.cache_error);
        Ok(self.finish("get_task_by_id", owner_id, outcome))
    }

    #[instrument(skip(self, description))]
    async fn update_task(
        &self,
        owner_id: i64,
        id: i64,
        description: &str,
    ) -> TaskCacheResult<CacheOutcome<()>> {
        self.inner
            .update_description(owner_id, id, description)
            .await?;

        let key = self.settings.key_for(owner_id);
        let field = task_field(id);

        // The cached field is rewritten from a fresh row, never from the request.
        let warning = match self.inner.find_by_id(owner_id, id).await {
            Ok(Some(task)) => {
                let value = encode_task(&task)?;
                self.write_through(&key, &[(field.clone(), value)]).await
            }
            // Deleted between the update and the re-read.
            Ok(None) => Some(TaskCacheError::cache_store(format!(
                "task {id} of owner {owner_id} vanished before its cache entry could be rewritten"
            ))),
            Err(e) => Some(e),
        };

        if warning.is_some() {
            self.evict(&key, &field).await;
        }
        Ok(self.finish(
            "update_task",
            owner_id,
            CacheOutcome::clean(()).with_warning(warning),
        ))
    }

    #[instrument(skip(self))]
    async fn delete_task(&self, owner_id: i64, id: i64) -> TaskCacheResult<CacheOutcome<()>> {
        self.inner.delete(owner_id, id).await?;

        let key = self.settings.key_for(owner_id);
        let field = task_field(id);

        let warning = match self.cache.hash_delete_field(&key, &field).await {
            Ok(removed) => {
                metrics::counter!("taskcache_cache_invalidations_total").increment(1);
                self.stats.write().await.invalidations += 1;
                debug!("Removed {} field {} (present: {})", key, field, removed);
                None
            }
            Err(e) => {
                self.record_error().await;
                self.forget_completeness(&key).await;
                Some(e)
            }
        };
        Ok(self.finish(
            "delete_task",
            owner_id,
            CacheOutcome::clean(()).with_warning(warning),
        ))
    }
}
