//! Interaction tests with strict mocks: any cache call not expected panics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::{mock, predicate::eq, Sequence};
use taskcache_domain::entities::{NewTask, Task};
use taskcache_domain::ports::HashCacheStore;
use taskcache_domain::repositories::TaskRepository;
use taskcache_domain::services::TaskOperations;
use taskcache_domain::{TaskCacheError, TaskCacheResult};
use taskcache_infrastructure::cache::{encode_task, CachedTaskStore, TaskCacheSettings};

mock! {
    pub Repo {}

    #[async_trait]
    impl TaskRepository for Repo {
        async fn create(&self, owner_id: i64, task: &NewTask) -> TaskCacheResult<i64>;
        async fn list_all(&self, owner_id: i64) -> TaskCacheResult<Vec<Task>>;
        async fn find_by_id(&self, owner_id: i64, id: i64) -> TaskCacheResult<Option<Task>>;
        async fn update_description(&self, owner_id: i64, id: i64, description: &str) -> TaskCacheResult<()>;
        async fn delete(&self, owner_id: i64, id: i64) -> TaskCacheResult<()>;
    }
}

mock! {
    pub Cache {}

    #[async_trait]
    impl HashCacheStore for Cache {
        async fn hash_set_many(&self, key: &str, fields: &[(String, String)]) -> TaskCacheResult<()>;
        async fn hash_set_one(&self, key: &str, field: &str, value: &str) -> TaskCacheResult<()>;
        async fn hash_get_one(&self, key: &str, field: &str) -> TaskCacheResult<Option<String>>;
        async fn hash_get_all(&self, key: &str) -> TaskCacheResult<HashMap<String, String>>;
        async fn hash_delete_field(&self, key: &str, field: &str) -> TaskCacheResult<bool>;
        async fn expire_after(&self, key: &str, ttl: Duration) -> TaskCacheResult<()>;
        async fn health_check(&self) -> TaskCacheResult<bool>;
        async fn hash_set_with_ttl(&self, key: &str, fields: &[(String, String)], ttl: Duration) -> TaskCacheResult<()>;
    }
}

fn down() -> TaskCacheError {
    TaskCacheError::backing_store("connection refused")
}

fn store(repo: MockRepo, cache: MockCache) -> CachedTaskStore {
    CachedTaskStore::new(Arc::new(repo), Arc::new(cache), TaskCacheSettings::default())
}

#[tokio::test]
async fn test_no_cache_call_after_failed_create() {
    let mut repo = MockRepo::new();
    repo.expect_create().times(1).returning(|_, _| Err(down()));

    let err = store(repo, MockCache::new())
        .create_task(7, NewTask::new("x"))
        .await
        .unwrap_err();
    assert!(err.is_durability_error());
}

#[tokio::test]
async fn test_no_cache_call_after_failed_update() {
    let mut repo = MockRepo::new();
    repo.expect_update_description()
        .times(1)
        .returning(|_, _, _| Err(down()));

    let err = store(repo, MockCache::new())
        .update_task(7, 1, "x")
        .await
        .unwrap_err();
    assert!(err.is_durability_error());
}

#[tokio::test]
async fn test_no_cache_call_after_failed_delete() {
    let mut repo = MockRepo::new();
    repo.expect_delete()
        .with(eq(7), eq(1))
        .times(1)
        .returning(|owner_id, id| Err(TaskCacheError::task_not_found(owner_id, id)));

    let err = store(repo, MockCache::new()).delete_task(7, 1).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_create_writes_full_record_with_ttl() {
    let mut seq = Sequence::new();
    let mut repo = MockRepo::new();
    let mut cache = MockCache::new();

    repo.expect_create()
        .withf(|owner_id, task| *owner_id == 7 && task.description == "buy milk")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(41));

    let expected = vec![(
        "41".to_string(),
        encode_task(&Task::new(41, "buy milk", 7)).unwrap(),
    )];
    cache
        .expect_hash_set_with_ttl()
        .withf(move |key, fields, ttl| {
            key == "user:7:tasks" && fields == expected.as_slice() && *ttl == Duration::from_secs(60)
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(()));

    let outcome = store(repo, cache)
        .create_task(7, NewTask::new("buy milk"))
        .await
        .unwrap();
    assert_eq!(outcome.value, 41);
    assert!(!outcome.is_degraded());
}

#[tokio::test]
async fn test_update_rereads_before_write_through() {
    let mut seq = Sequence::new();
    let mut repo = MockRepo::new();
    let mut cache = MockCache::new();

    repo.expect_update_description()
        .withf(|owner_id, id, description| *owner_id == 7 && *id == 1 && description == "new")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(()));
    repo.expect_find_by_id()
        .with(eq(7), eq(1))
        .times(1)
        .in_sequence(&mut seq)
        // The stored row is what gets cached, not the request text.
        .returning(|_, _| Ok(Some(Task::new(1, "new (normalised)", 7))));
    cache
        .expect_hash_set_with_ttl()
        .withf(|key, fields, _| {
            key == "user:7:tasks"
                && fields.len() == 1
                && fields[0].0 == "1"
                && fields[0].1.contains("new (normalised)")
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(()));

    let outcome = store(repo, cache).update_task(7, 1, "new").await.unwrap();
    assert!(!outcome.is_degraded());
}

#[tokio::test]
async fn test_row_gone_after_update_evicts_with_cache_warning() {
    let mut seq = Sequence::new();
    let mut repo = MockRepo::new();
    let mut cache = MockCache::new();

    repo.expect_update_description()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(()));
    repo.expect_find_by_id()
        .with(eq(7), eq(1))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(None));
    cache
        .expect_hash_delete_field()
        .withf(|key, field| key == "user:7:tasks" && field == "1")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(true));

    let outcome = store(repo, cache).update_task(7, 1, "new").await.unwrap();
    let warning = outcome.warning().expect("missing row is reported");
    assert!(warning.is_cache_error());
    assert!(!warning.is_not_found());
}

#[tokio::test]
async fn test_delete_removes_field_only_after_commit() {
    let mut seq = Sequence::new();
    let mut repo = MockRepo::new();
    let mut cache = MockCache::new();

    repo.expect_delete()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    cache
        .expect_hash_delete_field()
        .withf(|key, field| key == "user:7:tasks" && field == "2")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(true));

    let outcome = store(repo, cache).delete_task(7, 2).await.unwrap();
    assert!(!outcome.is_degraded());
}

#[tokio::test]
async fn test_hit_refreshes_ttl_without_backing_store() {
    let mut cache = MockCache::new();
    let raw = encode_task(&Task::new(3, "cached", 7)).unwrap();

    cache
        .expect_hash_get_one()
        .withf(|key, field| key == "user:7:tasks" && field == "3")
        .times(1)
        .returning(move |_, _| Ok(Some(raw.clone())));
    cache
        .expect_expire_after()
        .withf(|key, ttl| key == "user:7:tasks" && *ttl == Duration::from_secs(60))
        .times(1)
        .returning(|_, _| Ok(()));

    let outcome = store(MockRepo::new(), cache)
        .get_task_by_id(7, 3)
        .await
        .unwrap();
    assert_eq!(outcome.value, Task::new(3, "cached", 7));
}

#[tokio::test]
async fn test_empty_list_skips_cache_write() {
    let mut repo = MockRepo::new();
    let mut cache = MockCache::new();

    cache
        .expect_hash_get_all()
        .times(1)
        .returning(|_| Ok(HashMap::new()));
    repo.expect_list_all()
        .with(eq(7))
        .times(1)
        .returning(|_| Ok(Vec::new()));

    let outcome = store(repo, cache).get_all_tasks(7).await.unwrap();
    assert!(outcome.value.is_empty());
}
