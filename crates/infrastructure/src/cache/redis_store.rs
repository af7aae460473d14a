//! Redis-backed hash cache

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use taskcache_config::CacheConfig;
use taskcache_domain::ports::HashCacheStore;
use taskcache_errors::{TaskCacheError, TaskCacheResult};
use tracing::{debug, error, info, instrument};

use crate::timeout_handler::TimeoutUtils;

/// Redis hash store sharing one multiplexed connection
#[derive(Clone)]
pub struct RedisHashStore {
    connection: ConnectionManager,
    command_timeout: Duration,
}

fn redis_error(command: &str, key: &str, err: redis::RedisError) -> TaskCacheError {
    error!("Redis {} failed for {}: {}", command, key, err);
    TaskCacheError::cache_store(format!("{command} {key}: {err}"))
}

/// Whole seconds for EXPIRE, never below one. A TTL that does not fit a
/// signed seconds count is refused, since Redis deletes the key on a
/// negative one.
fn expire_seconds(key: &str, ttl: Duration) -> TaskCacheResult<i64> {
    i64::try_from(ttl.as_secs().max(1)).map_err(|_| {
        TaskCacheError::cache_store(format!("EXPIRE {key}: ttl {ttl:?} is out of range"))
    })
}

impl RedisHashStore {
    pub async fn new(config: &CacheConfig) -> TaskCacheResult<Self> {
        info!("Connecting to Redis cache at {}", config.redis_url);

        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| TaskCacheError::config_error(format!("invalid redis url: {e}")))?;

        let connect = async {
            client
                .get_connection_manager()
                .await
                .map_err(|e| TaskCacheError::cache_store(e.to_string()))
        };
        let connection = TimeoutUtils::custom(
            connect,
            Duration::from_secs(config.connection_timeout_seconds),
            "redis_connect",
        )
        .await
        .map_err(Self::as_cache_error)?;

        let store = Self {
            connection,
            command_timeout: Duration::from_secs(config.command_timeout_seconds),
        };
        store.health_check().await?;

        info!("Redis cache connection established");
        Ok(store)
    }

    pub fn from_connection(connection: ConnectionManager, command_timeout: Duration) -> Self {
        Self {
            connection,
            command_timeout,
        }
    }

    fn as_cache_error(err: TaskCacheError) -> TaskCacheError {
        match err {
            TaskCacheError::Timeout(msg) => TaskCacheError::cache_store(msg),
            other => other,
        }
    }

    async fn run<T, F>(&self, command: &str, operation: F) -> TaskCacheResult<T>
    where
        F: Future<Output = TaskCacheResult<T>>,
    {
        TimeoutUtils::custom(operation, self.command_timeout, command)
            .await
            .map_err(Self::as_cache_error)
    }
}

#[async_trait]
impl HashCacheStore for RedisHashStore {
    #[instrument(skip(self, entries), fields(field_count = entries.len()))]
    async fn hash_set_many(&self, key: &str, entries: &[(String, String)]) -> TaskCacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in entries {
            cmd.arg(field).arg(value);
        }
        self.run("HSET", async {
            cmd.query_async::<i64>(&mut conn)
                .await
                .map(|_| ())
                .map_err(|e| redis_error("HSET", key, e))
        })
        .await
    }

    #[instrument(skip(self, value))]
    async fn hash_set_one(&self, key: &str, field: &str, value: &str) -> TaskCacheResult<()> {
        let mut conn = self.connection.clone();
        self.run("HSET", async {
            redis::cmd("HSET")
                .arg(key)
                .arg(field)
                .arg(value)
                .query_async::<i64>(&mut conn)
                .await
                .map(|_| ())
                .map_err(|e| redis_error("HSET", key, e))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn hash_get_one(&self, key: &str, field: &str) -> TaskCacheResult<Option<String>> {
        let mut conn = self.connection.clone();
        let value = self
            .run("HGET", async {
                redis::cmd("HGET")
                    .arg(key)
                    .arg(field)
                    .query_async::<Option<String>>(&mut conn)
                    .await
                    .map_err(|e| redis_error("HGET", key, e))
            })
            .await?;
        debug!("HGET {} {} -> {}", key, field, if value.is_some() { "hit" } else { "miss" });
        Ok(value)
    }

    #[instrument(skip(self))]
    async fn hash_get_all(&self, key: &str) -> TaskCacheResult<HashMap<String, String>> {
        let mut conn = self.connection.clone();
        self.run("HGETALL", async {
            redis::cmd("HGETALL")
                .arg(key)
                .query_async::<HashMap<String, String>>(&mut conn)
                .await
                .map_err(|e| redis_error("HGETALL", key, e))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn hash_delete_field(&self, key: &str, field: &str) -> TaskCacheResult<bool> {
        let mut conn = self.connection.clone();
        self.run("HDEL", async {
            redis::cmd("HDEL")
                .arg(key)
                .arg(field)
                .query_async::<i64>(&mut conn)
                .await
                .map(|removed| removed > 0)
                .map_err(|e| redis_error("HDEL", key, e))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn expire_after(&self, key: &str, ttl: Duration) -> TaskCacheResult<()> {
        let seconds = expire_seconds(key, ttl)?;
        let mut conn = self.connection.clone();
        self.run("EXPIRE", async {
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(seconds)
                .query_async::<i64>(&mut conn)
                .await
                .map(|_| ())
                .map_err(|e| redis_error("EXPIRE", key, e))
        })
        .await
    }

    async fn health_check(&self) -> TaskCacheResult<bool> {
        let mut conn = self.connection.clone();
        let pong = self
            .run("PING", async {
                redis::cmd("PING")
                    .query_async::<String>(&mut conn)
                    .await
                    .map_err(|e| redis_error("PING", "", e))
            })
            .await?;
        Ok(pong == "PONG")
    }

    /// HSET and EXPIRE in one MULTI/EXEC so the fields never outlive the TTL.
    #[instrument(skip(self, entries), fields(field_count = entries.len()))]
    async fn hash_set_with_ttl(
        &self,
        key: &str,
        entries: &[(String, String)],
        ttl: Duration,
    ) -> TaskCacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let seconds = expire_seconds(key, ttl)?;
        let mut conn = self.connection.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("HSET").arg(key);
        for (field, value) in entries {
            pipe.arg(field).arg(value);
        }
        pipe.ignore();
        pipe.cmd("EXPIRE").arg(key).arg(seconds).ignore();

        self.run("HSET+EXPIRE", async {
            pipe.query_async::<()>(&mut conn)
                .await
                .map_err(|e| redis_error("HSET+EXPIRE", key, e))
        })
        .await
    }
}
