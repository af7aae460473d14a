//! Caller-facing task operations and the validation layer in front of them.

use std::sync::Arc;

use async_trait::async_trait;
use taskcache_errors::{TaskCacheError, TaskCacheResult};

use crate::entities::{NewTask, Task};
use crate::value_objects::CacheOutcome;

/// Descriptions must be shorter than this many bytes.
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// The five owner-scoped task operations.
///
/// `Err` means the durable part failed or the data is malformed. `Ok` carries
/// the durable result plus any warning-class cache failure.
#[async_trait]
pub trait TaskOperations: Send + Sync {
    async fn create_task(&self, owner_id: i64, task: NewTask) -> TaskCacheResult<CacheOutcome<i64>>;
    async fn get_all_tasks(&self, owner_id: i64) -> TaskCacheResult<CacheOutcome<Vec<Task>>>;
    async fn get_task_by_id(&self, owner_id: i64, id: i64) -> TaskCacheResult<CacheOutcome<Task>>;
    async fn update_task(
        &self,
        owner_id: i64,
        id: i64,
        description: &str,
    ) -> TaskCacheResult<CacheOutcome<()>>;
    async fn delete_task(&self, owner_id: i64, id: i64) -> TaskCacheResult<CacheOutcome<()>>;
}

/// Validates input shape before delegating to the cache-aside layer.
#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn TaskOperations>,
}

impl TaskService {
    pub fn new(tasks: Arc<dyn TaskOperations>) -> Self {
        Self { tasks }
    }

    pub async fn create_task(
        &self,
        owner_id: i64,
        task: NewTask,
    ) -> TaskCacheResult<CacheOutcome<i64>> {
        validate_owner(owner_id)?;
        validate_description(&task.description)?;
        self.tasks.create_task(owner_id, task).await
    }

    pub async fn get_all_tasks(&self, owner_id: i64) -> TaskCacheResult<CacheOutcome<Vec<Task>>> {
        validate_owner(owner_id)?;
        self.tasks.get_all_tasks(owner_id).await
    }

    pub async fn get_task_by_id(
        &self,
        owner_id: i64,
        id: i64,
    ) -> TaskCacheResult<CacheOutcome<Task>> {
        validate_owner(owner_id)?;
        validate_task_id(id)?;
        self.tasks.get_task_by_id(owner_id, id).await
    }

    pub async fn update_task(
        &self,
        owner_id: i64,
        id: i64,
        description: &str,
    ) -> TaskCacheResult<CacheOutcome<()>> {
        validate_owner(owner_id)?;
        validate_task_id(id)?;
        validate_description(description)?;
        self.tasks.update_task(owner_id, id, description).await
    }

    pub async fn delete_task(&self, owner_id: i64, id: i64) -> TaskCacheResult<CacheOutcome<()>> {
        validate_owner(owner_id)?;
        validate_task_id(id)?;
        self.tasks.delete_task(owner_id, id).await
    }
}

pub fn validate_description(description: &str) -> TaskCacheResult<()> {
    if description.is_empty() || description.len() >= MAX_DESCRIPTION_LEN {
        return Err(TaskCacheError::validation_error(format!(
            "description length must be between 1 and {} bytes, got {}",
            MAX_DESCRIPTION_LEN - 1,
            description.len()
        )));
    }
    Ok(())
}

pub fn validate_task_id(id: i64) -> TaskCacheResult<()> {
    if id <= 0 {
        return Err(TaskCacheError::validation_error(format!(
            "task id must be positive, got {id}"
        )));
    }
    Ok(())
}

pub fn validate_owner(owner_id: i64) -> TaskCacheResult<()> {
    if owner_id <= 0 {
        return Err(TaskCacheError::validation_error(format!(
            "owner id must be positive, got {owner_id}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingOperations {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TaskOperations for CountingOperations {
        async fn create_task(
            &self,
            _owner_id: i64,
            _task: NewTask,
        ) -> TaskCacheResult<CacheOutcome<i64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CacheOutcome::clean(1))
        }

        async fn get_all_tasks(&self, _owner_id: i64) -> TaskCacheResult<CacheOutcome<Vec<Task>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CacheOutcome::clean(vec![]))
        }

        async fn get_task_by_id(
            &self,
            owner_id: i64,
            id: i64,
        ) -> TaskCacheResult<CacheOutcome<Task>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CacheOutcome::clean(Task::new(id, "x", owner_id)))
        }

        async fn update_task(
            &self,
            _owner_id: i64,
            _id: i64,
            _description: &str,
        ) -> TaskCacheResult<CacheOutcome<()>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CacheOutcome::clean(()))
        }

        async fn delete_task(&self, _owner_id: i64, _id: i64) -> TaskCacheResult<CacheOutcome<()>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CacheOutcome::clean(()))
        }
    }

    fn service() -> (TaskService, Arc<CountingOperations>) {
        let ops = Arc::new(CountingOperations::default());
        (TaskService::new(ops.clone()), ops)
    }

    #[test]
    fn test_description_bounds() {
        assert!(validate_description("a").is_ok());
        assert!(validate_description(&"a".repeat(999)).is_ok());
        assert!(validate_description("").is_err());
        assert!(validate_description(&"a".repeat(1000)).is_err());
    }

    #[test]
    fn test_id_bounds() {
        assert!(validate_task_id(1).is_ok());
        assert!(validate_task_id(0).is_err());
        assert!(validate_task_id(-3).is_err());
        assert!(validate_owner(0).is_err());
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_operations() {
        let (svc, ops) = service();

        let err = svc.create_task(7, NewTask::new("")).await.unwrap_err();
        assert!(matches!(err, TaskCacheError::Validation(_)));
        assert!(svc.get_task_by_id(7, 0).await.is_err());
        assert!(svc.update_task(7, 1, &"x".repeat(1000)).await.is_err());
        assert!(svc.delete_task(7, -1).await.is_err());
        assert!(svc.get_all_tasks(0).await.is_err());

        assert_eq!(ops.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_input_is_delegated() {
        let (svc, ops) = service();

        assert_eq!(svc.create_task(7, NewTask::new("buy milk")).await.unwrap().value, 1);
        assert!(svc.get_all_tasks(7).await.unwrap().value.is_empty());
        assert_eq!(svc.get_task_by_id(7, 3).await.unwrap().value.id, 3);
        assert!(svc.update_task(7, 3, "buy oat milk").await.is_ok());
        assert!(svc.delete_task(7, 3).await.is_ok());

        assert_eq!(ops.calls.load(Ordering::SeqCst), 5);
    }
}
