use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// Longest accepted task hash TTL (30 days).
pub const MAX_TASK_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Cache configuration.
///
/// With `enabled = false` the embedded in-memory hash store is used; the
/// cache-aside policy itself does not change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub redis_url: String,
    /// Namespace prepended to every key, e.g. `prod` gives `prod:user:7:tasks`.
    #[serde(default)]
    pub key_prefix: Option<String>,
    /// TTL of an owner's task hash, reset by every access.
    pub task_ttl_seconds: u64,
    pub connection_timeout_seconds: u64,
    pub command_timeout_seconds: u64,
    /// Share one backing-store load between concurrent cold misses of a key.
    #[serde(default)]
    pub coalesce_misses: bool,
    /// Only trust a full-hash read when the collection was loaded as a whole.
    #[serde(default)]
    pub track_completeness: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: None,
            task_ttl_seconds: 60,
            connection_timeout_seconds: 5,
            command_timeout_seconds: 3,
            coalesce_misses: false,
            track_completeness: false,
        }
    }
}

impl ConfigValidator for CacheConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.enabled {
            ValidationUtils::validate_not_empty(&self.redis_url, "cache.redis_url")?;

            if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://") {
                return Err(crate::ConfigError::Validation(
                    "cache.redis_url must start with redis:// or rediss://".to_string(),
                ));
            }

            ValidationUtils::validate_timeout_seconds(
                self.connection_timeout_seconds,
                "cache.connection_timeout_seconds",
            )?;
            ValidationUtils::validate_timeout_seconds(
                self.command_timeout_seconds,
                "cache.command_timeout_seconds",
            )?;
        }

        if let Some(prefix) = &self.key_prefix {
            ValidationUtils::validate_not_empty(prefix, "cache.key_prefix")?;
        }

        if self.task_ttl_seconds == 0 {
            return Err(crate::ConfigError::Validation(
                "cache.task_ttl_seconds must be greater than 0".to_string(),
            ));
        }
        if self.task_ttl_seconds > MAX_TASK_TTL_SECONDS {
            return Err(crate::ConfigError::Validation(format!(
                "cache.task_ttl_seconds must not exceed {MAX_TASK_TTL_SECONDS}"
            )));
        }

        Ok(())
    }
}
