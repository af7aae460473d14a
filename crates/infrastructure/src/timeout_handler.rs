//! Timeout handling for store client calls.
//!
//! The cache-aside layer imposes no deadlines itself; each store client wraps
//! its own calls here.

use std::future::Future;
use std::time::Duration;
use taskcache_errors::{TaskCacheError, TaskCacheResult};
use tokio::time::timeout;
use tracing::error;

/// Default deadline for database calls.
pub const DEFAULT_DATABASE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TimeoutUtils;

impl TimeoutUtils {
    /// Execute database operation with default timeout
    pub async fn database<F, T>(operation: F, operation_name: &str) -> TaskCacheResult<T>
    where
        F: Future<Output = TaskCacheResult<T>>,
    {
        Self::custom(operation, DEFAULT_DATABASE_TIMEOUT, operation_name).await
    }

    /// Execute with custom timeout duration
    pub async fn custom<F, T>(
        operation: F,
        timeout_duration: Duration,
        operation_name: &str,
    ) -> TaskCacheResult<T>
    where
        F: Future<Output = TaskCacheResult<T>>,
    {
        match timeout(timeout_duration, operation).await {
            Ok(result) => result,
            Err(_) => {
                let error_msg =
                    format!("operation '{operation_name}' timed out after {timeout_duration:?}");
                error!("{}", error_msg);
                Err(TaskCacheError::Timeout(error_msg))
            }
        }
    }
}
