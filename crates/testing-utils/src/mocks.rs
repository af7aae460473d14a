//! Test doubles for the backing store and the cache store
//!
//! Both doubles count calls per operation and can be told to fail, so tests
//! can assert which side of the cache-aside layer was touched.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use taskcache_domain::entities::{NewTask, Task};
use taskcache_domain::ports::HashCacheStore;
use taskcache_domain::repositories::TaskRepository;
use taskcache_errors::{TaskCacheError, TaskCacheResult};

fn injected(operation: &str) -> TaskCacheError {
    TaskCacheError::backing_store(format!("injected {operation} failure"))
}

fn injected_cache(operation: &str) -> TaskCacheError {
    TaskCacheError::cache_store(format!("injected {operation} failure"))
}

/// In-memory TaskRepository with call counters and failure switches
#[derive(Debug)]
pub struct MockTaskRepository {
    tasks: Mutex<BTreeMap<i64, Task>>,
    next_id: Mutex<i64>,
    latency: Duration,

    create_calls: AtomicUsize,
    list_calls: AtomicUsize,
    find_calls: AtomicUsize,
    update_calls: AtomicUsize,
    delete_calls: AtomicUsize,

    fail_creates: AtomicBool,
    fail_lists: AtomicBool,
    fail_finds: AtomicBool,
    fail_updates: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockTaskRepository {
    pub fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let max_id = tasks.iter().map(|t| t.id).max().unwrap_or(0);
        let task_map = tasks.into_iter().map(|t| (t.id, t)).collect();

        Self {
            tasks: Mutex::new(task_map),
            next_id: Mutex::new(max_id + 1),
            latency: Duration::ZERO,
            create_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            find_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            fail_creates: AtomicBool::new(false),
            fail_lists: AtomicBool::new(false),
            fail_finds: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Every call sleeps this long before touching the data.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Writes a row directly, bypassing counters and the cache layer.
    pub fn insert(&self, task: Task) {
        let mut next_id = self.next_id.lock().unwrap();
        if task.id >= *next_id {
            *next_id = task.id + 1;
        }
        self.tasks.lock().unwrap().insert(task.id, task);
    }

    pub fn get(&self, owner_id: i64, id: i64) -> Option<Task> {
        self.tasks
            .lock()
            .unwrap()
            .get(&id)
            .filter(|t| t.owner_id == owner_id)
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.create_calls()
            + self.list_calls()
            + self.find_calls()
            + self.update_calls()
            + self.delete_calls()
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn fail_finds(&self, fail: bool) {
        self.fail_finds.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for MockTaskRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskRepository for MockTaskRepository {
    async fn create(&self, owner_id: i64, task: &NewTask) -> TaskCacheResult<i64> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(injected("create"));
        }

        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        self.tasks
            .lock()
            .unwrap()
            .insert(id, task.clone().into_task(id, owner_id));
        Ok(id)
    }

    async fn list_all(&self, owner_id: i64) -> TaskCacheResult<Vec<Task>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(injected("list"));
        }

        Ok(self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, owner_id: i64, id: i64) -> TaskCacheResult<Option<Task>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_finds.load(Ordering::SeqCst) {
            return Err(injected("find"));
        }
        Ok(self.get(owner_id, id))
    }

    async fn update_description(
        &self,
        owner_id: i64,
        id: i64,
        description: &str,
    ) -> TaskCacheResult<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(injected("update"));
        }

        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(&id).filter(|t| t.owner_id == owner_id) {
            Some(task) => {
                task.description = description.to_string();
                Ok(())
            }
            None => Err(TaskCacheError::task_not_found(owner_id, id)),
        }
    }

    async fn delete(&self, owner_id: i64, id: i64) -> TaskCacheResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }

        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get(&id) {
            Some(task) if task.owner_id == owner_id => {
                tasks.remove(&id);
                Ok(())
            }
            _ => Err(TaskCacheError::task_not_found(owner_id, id)),
        }
    }
}

/// Cache store decorator that fails selected command groups on demand
pub struct FaultInjectingCacheStore<S> {
    inner: Arc<S>,

    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
    fail_expires: AtomicBool,

    read_calls: AtomicUsize,
    write_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    expire_calls: AtomicUsize,
    last_ttl: Mutex<Option<Duration>>,
}

impl<S: HashCacheStore> FaultInjectingCacheStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            fail_expires: AtomicBool::new(false),
            read_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            expire_calls: AtomicUsize::new(0),
            last_ttl: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_expires(&self, fail: bool) {
        self.fail_expires.store(fail, Ordering::SeqCst);
    }

    /// Makes every command fail, as if the endpoint were down.
    pub fn fail_all(&self, fail: bool) {
        self.fail_reads(fail);
        self.fail_writes(fail);
        self.fail_deletes(fail);
        self.fail_expires(fail);
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn expire_calls(&self) -> usize {
        self.expire_calls.load(Ordering::SeqCst)
    }

    /// TTL passed by the most recent write or expire.
    pub fn last_ttl(&self) -> Option<Duration> {
        *self.last_ttl.lock().unwrap()
    }

    fn begin_read(&self, operation: &str) -> TaskCacheResult<()> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected_cache(operation));
        }
        Ok(())
    }

    fn begin_write(&self, operation: &str) -> TaskCacheResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_cache(operation));
        }
        Ok(())
    }

    fn begin_expire(&self, ttl: Duration) -> TaskCacheResult<()> {
        self.expire_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_expires.load(Ordering::SeqCst) {
            return Err(injected_cache("EXPIRE"));
        }
        *self.last_ttl.lock().unwrap() = Some(ttl);
        Ok(())
    }
}

#[async_trait]
impl<S: HashCacheStore> HashCacheStore for FaultInjectingCacheStore<S> {
    async fn hash_set_many(&self, key: &str, fields: &[(String, String)]) -> TaskCacheResult<()> {
        self.begin_write("HSET")?;
        self.inner.hash_set_many(key, fields).await
    }

    async fn hash_set_one(&self, key: &str, field: &str, value: &str) -> TaskCacheResult<()> {
        self.begin_write("HSET")?;
        self.inner.hash_set_one(key, field, value).await
    }

    async fn hash_get_one(&self, key: &str, field: &str) -> TaskCacheResult<Option<String>> {
        self.begin_read("HGET")?;
        self.inner.hash_get_one(key, field).await
    }

    async fn hash_get_all(&self, key: &str) -> TaskCacheResult<HashMap<String, String>> {
        self.begin_read("HGETALL")?;
        self.inner.hash_get_all(key).await
    }

    async fn hash_delete_field(&self, key: &str, field: &str) -> TaskCacheResult<bool> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected_cache("HDEL"));
        }
        self.inner.hash_delete_field(key, field).await
    }

    async fn expire_after(&self, key: &str, ttl: Duration) -> TaskCacheResult<()> {
        self.begin_expire(ttl)?;
        self.inner.expire_after(key, ttl).await
    }

    async fn health_check(&self) -> TaskCacheResult<bool> {
        self.begin_read("PING")?;
        self.inner.health_check().await
    }

    /// Counts as one write; the combined step fails as a whole.
    async fn hash_set_with_ttl(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> TaskCacheResult<()> {
        self.begin_write("HSET+EXPIRE")?;
        *self.last_ttl.lock().unwrap() = Some(ttl);
        self.inner.hash_set_with_ttl(key, fields, ttl).await
    }
}
