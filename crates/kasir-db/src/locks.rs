//! # Keyed Locks
//!
//! In-process serialization of writers that touch the same stock row or the
//! same document.
//!
//! ## Lock Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Acquire → Connect → Commit                         │
//! │                                                                         │
//! │  operation needs keys {stock:B:p2, stock:A:p9, invoice:TOK-..}         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  sort + dedup  →  invoice:TOK-..  <  stock:A:p9  <  stock:B:p2          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  lock each in order, one shared deadline (lock_timeout)                │
//! │       │          └── deadline hit → EngineError::Busy { resource }     │
//! │       ▼                                                                 │
//! │  pool.begin_with("BEGIN IMMEDIATE") ... commit                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  drop LockSet → guards released, idle entries pruned                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation takes its whole key set in one `acquire` call and before
//! it takes a database connection, so two operations can never wait on each
//! other in opposite order.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::engine::error::{EngineError, EngineResult};

type Registry = HashMap<String, Arc<Mutex<()>>>;

/// Registry of per-key async mutexes. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    registry: Arc<StdMutex<Registry>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every key, in ascending order, within `timeout`.
    pub async fn acquire<I, K>(&self, keys: I, timeout: Duration) -> EngineResult<LockSet>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        let deadline = Instant::now() + timeout;
        let mut set = LockSet {
            keys: Vec::with_capacity(keys.len()),
            guards: Vec::with_capacity(keys.len()),
            registry: Arc::clone(&self.registry),
        };

        for key in keys {
            let mutex = {
                let mut registry = self.lock_registry();
                Arc::clone(registry.entry(key.clone()).or_default())
            };
            // Registered before the wait so a timed-out key is pruned too.
            set.keys.push(key.clone());

            match timeout_at(deadline, mutex.lock_owned()).await {
                Ok(guard) => set.guards.push(guard),
                Err(_) => {
                    warn!(resource = %key, "Lock acquisition timed out");
                    return Err(EngineError::Busy { resource: key });
                }
            }
        }

        debug!(keys = ?set.keys, "Locks acquired");
        Ok(set)
    }

    /// Number of keys currently registered (held or awaited).
    pub fn registered(&self) -> usize {
        self.lock_registry().len()
    }

    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Guards for one operation's keys. Released on drop.
#[derive(Debug)]
pub struct LockSet {
    keys: Vec<String>,
    guards: Vec<OwnedMutexGuard<()>>,
    registry: Arc<StdMutex<Registry>>,
}

impl LockSet {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for LockSet {
    fn drop(&mut self) {
        self.guards.clear();

        let mut registry = self
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for key in &self.keys {
            // Only the registry's own handle left: nobody holds or awaits it.
            let idle = registry
                .get(key)
                .is_some_and(|mutex| Arc::strong_count(mutex) == 1);
            if idle {
                registry.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keys_are_sorted_and_deduplicated() {
        let locks = KeyedLocks::new();
        let set = locks
            .acquire(["stock:b:1", "invoice:X", "stock:a:9", "stock:b:1"], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(set.keys(), ["invoice:X", "stock:a:9", "stock:b:1"]);
    }

    #[tokio::test]
    async fn test_held_key_times_out_as_busy() {
        let locks = KeyedLocks::new();
        let _held = locks.acquire(["stock:a:1"], Duration::from_secs(1)).await.unwrap();

        let err = locks
            .acquire(["stock:a:1"], Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Busy { ref resource } if resource == "stock:a:1"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_release_prunes_registry() {
        let locks = KeyedLocks::new();
        {
            let _set = locks
                .acquire(["stock:a:1", "stock:a:2"], Duration::from_secs(1))
                .await
                .unwrap();
            assert_eq!(locks.registered(), 2);
        }
        assert_eq!(locks.registered(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waiters_run_one_at_a_time() {
        let locks = KeyedLocks::new();
        let counter = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let locks = locks.clone();
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let _set = locks.acquire(["stock:s:p"], Duration::from_secs(5)).await.unwrap();
                let mut log = counter.lock().await;
                log.push(i);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(counter.lock().await.len(), 8);
        assert_eq!(locks.registered(), 0);
    }
}
