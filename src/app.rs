use std::sync::Arc;

use serde::Serialize;
use taskcache_config::AppConfig;
use taskcache_domain::ports::HashCacheStore;
use taskcache_domain::services::TaskService;
use taskcache_errors::TaskCacheResult;
use taskcache_infrastructure::{
    cache::{CachedTaskStore, InMemoryHashStore, RedisHashStore, TaskCacheSettings},
    database::DatabaseManager,
};
use tracing::{info, warn};

/// Health of both stores
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub database: bool,
    pub cache: bool,
    pub cache_backend: &'static str,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.database && self.cache
    }
}

/// Wired application: backing store, cache store and the task service
pub struct Application {
    database: DatabaseManager,
    cache: Arc<dyn HashCacheStore>,
    cache_backend: &'static str,
    tasks: Arc<CachedTaskStore>,
    service: TaskService,
}

impl Application {
    pub async fn build(config: &AppConfig) -> TaskCacheResult<Self> {
        info!("Initialising task cache application");

        let database = DatabaseManager::new(&config.database).await?;
        database.run_migrations().await?;

        let (cache, cache_backend): (Arc<dyn HashCacheStore>, &'static str) =
            if config.cache.enabled {
                (Arc::new(RedisHashStore::new(&config.cache).await?), "redis")
            } else {
                info!("Redis cache disabled, using in-process hash store");
                (Arc::new(InMemoryHashStore::new()), "memory")
            };

        let settings = TaskCacheSettings::from_config(&config.cache);
        info!(
            ttl_seconds = settings.ttl.as_secs(),
            coalesce_misses = settings.coalesce_misses,
            track_completeness = settings.track_completeness,
            "Cache-aside settings"
        );

        let tasks = Arc::new(CachedTaskStore::new(
            database.task_repository(),
            cache.clone(),
            settings,
        ));
        let service = TaskService::new(tasks.clone());

        Ok(Self {
            database,
            cache,
            cache_backend,
            tasks,
            service,
        })
    }

    pub fn service(&self) -> &TaskService {
        &self.service
    }

    pub fn tasks(&self) -> &Arc<CachedTaskStore> {
        &self.tasks
    }

    pub async fn health(&self) -> HealthReport {
        let database = match self.database.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Database health check failed: {}", e);
                false
            }
        };
        let cache = match self.cache.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!("Cache health check failed: {}", e);
                false
            }
        };
        HealthReport {
            database,
            cache,
            cache_backend: self.cache_backend,
        }
    }

    pub async fn shutdown(&self) {
        let stats = self.tasks.stats().await;
        info!(
            hits = stats.hits,
            misses = stats.misses,
            errors = stats.errors,
            hit_rate = stats.hit_rate(),
            miss_rate = stats.miss_rate(),
            error_rate = stats.error_rate(),
            "Shutting down"
        );
        self.database.close().await;
    }
}
