//! Coalescing of concurrent loads for the same key
//!
//! The first caller for a key runs the load; callers arriving while it is in
//! flight wait for its result instead of issuing their own.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use taskcache_errors::{TaskCacheError, TaskCacheResult};
use tokio::sync::broadcast;
use tracing::debug;

type FlightMap<V> = Mutex<HashMap<String, broadcast::Sender<TaskCacheResult<V>>>>;

enum Role<V> {
    Leader(broadcast::Sender<TaskCacheResult<V>>),
    Follower(broadcast::Receiver<TaskCacheResult<V>>),
}

/// Removes the flight entry when the leader finishes or is cancelled.
struct InFlightGuard<'a, V> {
    flights: &'a FlightMap<V>,
    key: &'a str,
}

impl<V> Drop for InFlightGuard<'_, V> {
    fn drop(&mut self) {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.key);
    }
}

pub struct SingleFlight<V> {
    flights: FlightMap<V>,
}

impl<V> Default for SingleFlight<V> {
    fn default() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone> SingleFlight<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `load` unless a load for `key` is already in flight, in which
    /// case the in-flight result is shared. A follower whose leader is
    /// cancelled retries and may become the leader itself.
    pub async fn run<F, Fut>(&self, key: &str, load: F) -> TaskCacheResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TaskCacheResult<V>>,
    {
        let mut load = Some(load);

        loop {
            let role = {
                let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
                let existing = flights.get(key).map(broadcast::Sender::subscribe);
                match existing {
                    Some(receiver) => Role::Follower(receiver),
                    None => {
                        let (sender, _) = broadcast::channel(1);
                        flights.insert(key.to_string(), sender.clone());
                        Role::Leader(sender)
                    }
                }
            };

            match role {
                Role::Leader(sender) => {
                    let guard = InFlightGuard {
                        flights: &self.flights,
                        key,
                    };
                    let load = load.take().ok_or_else(|| {
                        TaskCacheError::Internal(format!("load for {key} already consumed"))
                    })?;
                    let result = load().await;
                    // Later callers start a fresh load rather than joining a finished one.
                    drop(guard);
                    let _ = sender.send(result.clone());
                    return result;
                }
                Role::Follower(mut receiver) => match receiver.recv().await {
                    Ok(result) => {
                        debug!("Shared in-flight load for {}", key);
                        return result;
                    }
                    Err(_) => continue,
                },
            }
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
