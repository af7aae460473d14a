use taskcache_errors::TaskCacheError;

/// Result of a task operation whose durable part succeeded.
///
/// `cache_error` is set when the cache could not be brought in line with the
/// backing store. The value is still authoritative; the error is a
/// warning-class signal for observability.
#[derive(Debug, Clone)]
pub struct CacheOutcome<T> {
    pub value: T,
    pub cache_error: Option<TaskCacheError>,
}

impl<T> CacheOutcome<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            cache_error: None,
        }
    }

    pub fn degraded(value: T, cache_error: TaskCacheError) -> Self {
        Self {
            value,
            cache_error: Some(cache_error),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn is_degraded(&self) -> bool {
        self.cache_error.is_some()
    }

    pub fn warning(&self) -> Option<&TaskCacheError> {
        self.cache_error.as_ref()
    }

    /// Keeps the first warning if one is already recorded.
    pub fn with_warning(mut self, cache_error: Option<TaskCacheError>) -> Self {
        if self.cache_error.is_none() {
            self.cache_error = cache_error;
        }
        self
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CacheOutcome<U> {
        CacheOutcome {
            value: f(self.value),
            cache_error: self.cache_error,
        }
    }
}
