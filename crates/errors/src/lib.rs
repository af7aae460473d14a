use thiserror::Error;

/// Broad classification exposed to callers of the task operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    StoreUnavailable,
    MalformedData,
    InvalidInput,
    Configuration,
    Internal,
}

#[derive(Debug, Clone, Error)]
pub enum TaskCacheError {
    #[error("backing store error: {0}")]
    BackingStore(String),
    #[error("task not found: owner {owner_id}, id {id}")]
    TaskNotFound { owner_id: i64, id: i64 },
    #[error("cache store error: {0}")]
    CacheStore(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type TaskCacheResult<T> = Result<T, TaskCacheError>;

impl TaskCacheError {
    pub fn backing_store<S: Into<String>>(msg: S) -> Self {
        Self::BackingStore(msg.into())
    }
    pub fn cache_store<S: Into<String>>(msg: S) -> Self {
        Self::CacheStore(msg.into())
    }
    pub fn task_not_found(owner_id: i64, id: i64) -> Self {
        Self::TaskNotFound { owner_id, id }
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskCacheError::TaskNotFound { .. } => ErrorKind::NotFound,
            TaskCacheError::BackingStore(_)
            | TaskCacheError::CacheStore(_)
            | TaskCacheError::Timeout(_) => ErrorKind::StoreUnavailable,
            TaskCacheError::Serialization(_) => ErrorKind::MalformedData,
            TaskCacheError::Validation(_) => ErrorKind::InvalidInput,
            TaskCacheError::Configuration(_) => ErrorKind::Configuration,
            TaskCacheError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TaskCacheError::TaskNotFound { .. })
    }

    /// Cache failures are warning-class once the durable write committed.
    pub fn is_cache_error(&self) -> bool {
        matches!(self, TaskCacheError::CacheStore(_))
    }

    pub fn is_durability_error(&self) -> bool {
        matches!(self, TaskCacheError::BackingStore(_))
    }

    /// Whether a caller may reasonably retry. Nothing inside the crate retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TaskCacheError::BackingStore(_)
                | TaskCacheError::CacheStore(_)
                | TaskCacheError::Timeout(_)
        )
    }

    pub fn user_message(&self) -> &str {
        match self {
            TaskCacheError::TaskNotFound { .. } => "the requested task does not exist",
            TaskCacheError::Validation(_) => "the request is invalid",
            TaskCacheError::Serialization(_) => "stored task data is malformed",
            TaskCacheError::BackingStore(_)
            | TaskCacheError::CacheStore(_)
            | TaskCacheError::Timeout(_) => "storage is temporarily unavailable, please retry",
            _ => "internal server error",
        }
    }
}

impl From<sqlx::Error> for TaskCacheError {
    fn from(err: sqlx::Error) -> Self {
        TaskCacheError::BackingStore(err.to_string())
    }
}

impl From<serde_json::Error> for TaskCacheError {
    fn from(err: serde_json::Error) -> Self {
        TaskCacheError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for TaskCacheError {
    fn from(err: anyhow::Error) -> Self {
        TaskCacheError::Internal(err.to_string())
    }
}
