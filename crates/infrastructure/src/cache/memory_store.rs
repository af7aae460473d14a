//! In-process hash cache with per-key expiry
//!
//! Mirrors the Redis hash commands the task cache uses, including their TTL
//! rules, so the orchestrator can run without a Redis server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use taskcache_domain::ports::HashCacheStore;
use taskcache_errors::{TaskCacheError, TaskCacheResult};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Every this many writes, expired keys are swept from the whole map.
const SWEEP_INTERVAL: u64 = 256;

#[derive(Debug, Default)]
struct HashEntry {
    fields: HashMap<String, String>,
    expires_at: Option<Instant>,
}

impl HashEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryHashStore {
    entries: RwLock<HashMap<String, HashEntry>>,
    writes: AtomicU64,
}

impl InMemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining time-to-live of a key. `None` for a missing key or one
    /// without expiry.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    pub async fn field_count(&self, key: &str) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map_or(0, |entry| entry.fields.len())
    }

    fn deadline(key: &str, now: Instant, ttl: Duration) -> TaskCacheResult<Instant> {
        now.checked_add(ttl).ok_or_else(|| {
            TaskCacheError::cache_store(format!("EXPIRE {key}: ttl {ttl:?} is out of range"))
        })
    }

    fn purge_if_expired(entries: &mut HashMap<String, HashEntry>, key: &str, now: Instant) {
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            debug!("Evicting expired key {}", key);
            entries.remove(key);
        }
    }

    /// Counts a write and periodically drops every expired key, so keys
    /// nobody reads again do not pile up.
    fn note_write(&self, entries: &mut HashMap<String, HashEntry>, now: Instant) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_INTERVAL != 0 {
            return;
        }
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let swept = before - entries.len();
        if swept > 0 {
            debug!("Swept {} expired keys", swept);
        }
    }

    /// Drops `key` if a read found it expired.
    async fn purge_after_read(&self, key: &str, now: Instant) {
        let mut entries = self.entries.write().await;
        Self::purge_if_expired(&mut entries, key, now);
    }

    async fn write_fields(
        &self,
        key: &str,
        fields: &[(String, String)],
        deadline: Option<Instant>,
    ) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        self.note_write(&mut entries, now);
        Self::purge_if_expired(&mut entries, key, now);
        let entry = entries.entry(key.to_string()).or_default();
        for (field, value) in fields {
            entry.fields.insert(field.clone(), value.clone());
        }
        if deadline.is_some() {
            entry.expires_at = deadline;
        }
    }
}

#[async_trait]
impl HashCacheStore for InMemoryHashStore {
    async fn hash_set_many(&self, key: &str, fields: &[(String, String)]) -> TaskCacheResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        self.write_fields(key, fields, None).await;
        Ok(())
    }

    async fn hash_set_one(&self, key: &str, field: &str, value: &str) -> TaskCacheResult<()> {
        self.hash_set_many(key, &[(field.to_string(), value.to_string())])
            .await
    }

    async fn hash_get_one(&self, key: &str, field: &str) -> TaskCacheResult<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_expired(now) => {}
                Some(entry) => return Ok(entry.fields.get(field).cloned()),
                None => return Ok(None),
            }
        }
        self.purge_after_read(key, now).await;
        Ok(None)
    }

    async fn hash_get_all(&self, key: &str) -> TaskCacheResult<HashMap<String, String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_expired(now) => {}
                Some(entry) => return Ok(entry.fields.clone()),
                None => return Ok(HashMap::new()),
            }
        }
        self.purge_after_read(key, now).await;
        Ok(HashMap::new())
    }

    async fn hash_delete_field(&self, key: &str, field: &str) -> TaskCacheResult<bool> {
        let mut entries = self.entries.write().await;
        Self::purge_if_expired(&mut entries, key, Instant::now());

        let Some(entry) = entries.get_mut(key) else {
            return Ok(false);
        };
        let removed = entry.fields.remove(field).is_some();
        if entry.fields.is_empty() {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn expire_after(&self, key: &str, ttl: Duration) -> TaskCacheResult<()> {
        let now = Instant::now();
        let deadline = Self::deadline(key, now, ttl)?;
        let mut entries = self.entries.write().await;
        Self::purge_if_expired(&mut entries, key, now);
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(deadline);
        }
        Ok(())
    }

    async fn health_check(&self) -> TaskCacheResult<bool> {
        Ok(true)
    }

    /// Fields and deadline are applied under one lock; an out-of-range TTL
    /// is rejected before anything is written.
    async fn hash_set_with_ttl(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> TaskCacheResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let deadline = Self::deadline(key, Instant::now(), ttl)?;
        self.write_fields(key, fields, Some(deadline)).await;
        Ok(())
    }
}
