use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use taskcache_domain::entities::Task;
use taskcache_domain::services::TaskOperations;
use taskcache_infrastructure::cache::{CachedTaskStore, InMemoryHashStore, TaskCacheSettings};
use taskcache_testing_utils::{MockTaskRepository, TaskBuilder};

const CALLERS: usize = 16;

fn slow_repo(tasks: Vec<Task>) -> Arc<MockTaskRepository> {
    Arc::new(MockTaskRepository::with_tasks(tasks).with_latency(Duration::from_millis(50)))
}

#[tokio::test]
async fn test_uncoalesced_misses_each_query_backing_store() -> Result<()> {
    let repo = slow_repo(TaskBuilder::many(7, 3));
    let store = CachedTaskStore::new(
        repo.clone(),
        Arc::new(InMemoryHashStore::new()),
        TaskCacheSettings::default(),
    );

    let results = join_all((0..CALLERS).map(|_| store.get_all_tasks(7))).await;
    for result in results {
        assert_eq!(result?.value.len(), 3);
    }
    // Idempotent repopulation, one query per caller.
    assert_eq!(repo.list_calls(), CALLERS);
    Ok(())
}

#[tokio::test]
async fn test_coalesced_misses_share_one_query() -> Result<()> {
    let repo = slow_repo(TaskBuilder::many(7, 3));
    let store = CachedTaskStore::new(
        repo.clone(),
        Arc::new(InMemoryHashStore::new()),
        TaskCacheSettings::default().with_coalesced_misses(true),
    );

    let results = join_all((0..CALLERS).map(|_| store.get_all_tasks(7))).await;
    for result in results {
        assert_eq!(result?.value.len(), 3);
    }
    assert_eq!(repo.list_calls(), 1);

    store.get_all_tasks(7).await?;
    assert_eq!(repo.list_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_coalescing_is_per_owner() -> Result<()> {
    let mut tasks = TaskBuilder::many(7, 2);
    tasks.push(Task::new(10, "other owner", 8));
    let repo = slow_repo(tasks);
    let store = CachedTaskStore::new(
        repo.clone(),
        Arc::new(InMemoryHashStore::new()),
        TaskCacheSettings::default().with_coalesced_misses(true),
    );

    let (seven, eight) = tokio::join!(store.get_all_tasks(7), store.get_all_tasks(8));
    assert_eq!(seven?.value.len(), 2);
    assert_eq!(eight?.value, vec![Task::new(10, "other owner", 8)]);
    assert_eq!(repo.list_calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_coalesced_failure_reaches_every_caller_and_is_not_cached() {
    let repo = slow_repo(TaskBuilder::many(7, 1));
    repo.fail_lists(true);
    let store = CachedTaskStore::new(
        repo.clone(),
        Arc::new(InMemoryHashStore::new()),
        TaskCacheSettings::default().with_coalesced_misses(true),
    );

    let results = join_all((0..4).map(|_| store.get_all_tasks(7))).await;
    assert!(results.iter().all(|r| r.as_ref().is_err_and(|e| e.is_durability_error())));
    assert_eq!(repo.list_calls(), 1);

    repo.fail_lists(false);
    assert_eq!(store.get_all_tasks(7).await.map(|o| o.value.len()).ok(), Some(1));
    assert_eq!(repo.list_calls(), 2);
}
