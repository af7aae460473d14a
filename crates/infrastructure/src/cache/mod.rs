//! Cache-aside caching for owner-scoped task lists
//!
//! Each owner's tasks live in one hash at `user:<owner_id>:tasks`. Fields are
//! decimal task ids, values are JSON-encoded records, and the whole hash
//! shares one TTL that every access resets.

pub mod codec;
pub mod config;
pub mod memory_store;
pub mod redis_store;
pub mod single_flight;
pub mod task_cache;

pub use codec::*;
pub use config::*;
pub use memory_store::*;
pub use redis_store::*;
pub use single_flight::*;
pub use task_cache::*;

/// Field marking that the hash holds the owner's complete collection.
///
/// Task fields are decimal ids, so an underscore-led name cannot collide.
pub const COMPLETENESS_FIELD: &str = "_complete";

/// Cache key for an owner's task hash
pub fn owner_tasks_key(owner_id: i64) -> String {
    format!("user:{owner_id}:tasks")
}

/// Cache key with an optional namespace prefix
pub fn namespaced_tasks_key(prefix: Option<&str>, owner_id: i64) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, owner_tasks_key(owner_id)),
        _ => owner_tasks_key(owner_id),
    }
}

/// Hash field for a task
pub fn task_field(task_id: i64) -> String {
    task_id.to_string()
}

/// Cache statistics and metrics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub write_throughs: u64,
    pub invalidations: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }

    pub fn error_rate(&self) -> f64 {
        let total_ops = self.hits + self.misses + self.write_throughs + self.invalidations;
        if total_ops == 0 {
            0.0
        } else {
            self.errors as f64 / total_ops as f64
        }
    }
}
