//! Remote store abstraction
//!
//! The engine talks to the shared key-value store through [`StoreAdapter`]
//! and [`ItemHandle`]. A handle's read behavior is configured by a
//! [`ReadMode`] before value extraction, which is how the tiers of the read
//! pipeline see different views of the same row. Per-key exclusive locks use
//! SET-NX-EX semantics with a bounded TTL so a crashed leader can never
//! wedge a key forever.

use crate::error::Result;
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

pub mod memory;

pub use memory::{InMemoryStore, MemoryStoreConfig, MemoryStoreStats};

/// Upper bound on lock TTLs accepted by adapters, in seconds.
pub const MAX_LOCK_TTL_SECS: u64 = 300;

/// Tag prepended to a payload key to derive its lock key.
///
/// Keeps lock rows in a namespace distinct from payload rows.
pub const LOCK_KEY_TAG: &str = "sp/";

/// Read behavior of an item handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Report a miss once `now >= hard_expires_at - soft`, letting the
    /// engine rebuild inside the soft window while the row still exists.
    Precompute { soft: Duration },
    /// Return the previously stored value even when it is past expiry and
    /// another process holds the recomputation lock.
    Old,
    /// Poll for a fresh value while another process recomputes, bounded by
    /// `pause * max_attempts`.
    Sleep { pause: Duration, max_attempts: u32 },
}

/// Creation and hard-expiry wall-clock timestamps of a stored entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStamps {
    pub created_at: SystemTime,
    pub hard_expires_at: SystemTime,
}

/// Handle to a single store row
///
/// Obtained from [`StoreAdapter::item`]. Configure a mode, then `read`;
/// `is_hit` reflects the last read.
#[async_trait]
pub trait ItemHandle: Send + Sync {
    /// The payload key this handle addresses.
    fn key_string(&self) -> &str;

    /// Configure the read behavior. Takes effect on the next `read`.
    fn set_mode(&mut self, mode: ReadMode);

    /// Extract the value under the configured mode.
    async fn read(&mut self) -> Result<Option<Vec<u8>>>;

    /// Whether the last `read` observed a fresh value under its mode.
    fn is_hit(&self) -> bool;

    /// Creation and hard-expiry timestamps of the underlying entry.
    async fn timestamps(&mut self) -> Result<Option<EntryStamps>>;

    /// Store a payload and set its hard expiry `ttl` from now.
    async fn save(&mut self, payload: &[u8], ttl: Duration) -> Result<()>;
}

/// Abstraction over the remote key-value store
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Open a handle to the row for `key_string`.
    async fn item(&self, key_string: &str) -> Result<Box<dyn ItemHandle>>;

    /// Open handles for several keys at once.
    ///
    /// Adapters with a batched wire protocol should override this; the
    /// default loops [`item`](Self::item).
    async fn items(&self, key_strings: &[String]) -> Result<Vec<Box<dyn ItemHandle>>> {
        let mut handles = Vec::with_capacity(key_strings.len());
        for key_string in key_strings {
            handles.push(self.item(key_string).await?);
        }
        Ok(handles)
    }

    /// Attempt to acquire the per-key exclusive lock.
    ///
    /// SET-NX-EX semantics: returns `true` for at most one concurrent holder
    /// per key. `ttl` must lie in `(0, MAX_LOCK_TTL_SECS]` seconds; the
    /// adapter rejects out-of-range TTLs.
    async fn try_lock(&self, key_string: &str, ttl: Duration) -> Result<bool>;

    /// Release the per-key lock.
    ///
    /// Releasing a lock that is not held is not an error.
    async fn unlock(&self, key_string: &str) -> Result<()>;

    /// Remove exactly one entry. No prefix walk.
    async fn delete_exact(&self, key_string: &str) -> Result<()>;

    /// Remove all entries whose key string begins with `prefix_string`.
    async fn clear_by_prefix(&self, prefix_string: &str) -> Result<()>;
}

/// Scoped ownership of a per-key lock
///
/// The leader path holds one of these while recomputing. Dropping the guard
/// on any exit path (normal return, error, panic, cancelled future) issues
/// the release; the lock TTL remains the backstop if the process dies
/// outright.
pub struct LockGuard {
    store: Arc<dyn StoreAdapter>,
    key_string: String,
    released: bool,
}

impl LockGuard {
    /// Wrap an already-acquired lock.
    pub fn new(store: Arc<dyn StoreAdapter>, key_string: String) -> Self {
        Self {
            store,
            key_string,
            released: false,
        }
    }

    /// Release the lock now and observe the outcome.
    pub async fn release(mut self) {
        self.released = true;
        if let Err(error) = self.store.unlock(&self.key_string).await {
            warn!("failed to release lock for '{}': {error}", self.key_string);
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = Arc::clone(&self.store);
        let key_string = std::mem::take(&mut self.key_string);
        // Release must not be skipped on cancellation or panic; the unlock
        // is async, so it is handed to the runtime.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(error) = store.unlock(&key_string).await {
                    warn!("failed to release lock for '{key_string}': {error}");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    fn store() -> Arc<dyn StoreAdapter> {
        Arc::new(InMemoryStore::new(Arc::new(SystemClock)))
    }

    #[tokio::test]
    async fn test_guard_explicit_release() {
        let store = store();
        assert!(store.try_lock("k", Duration::from_secs(30)).await.unwrap());

        let guard = LockGuard::new(Arc::clone(&store), "k".to_string());
        guard.release().await;

        assert!(store.try_lock("k", Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let store = store();
        assert!(store.try_lock("k", Duration::from_secs(30)).await.unwrap());

        drop(LockGuard::new(Arc::clone(&store), "k".to_string()));
        // The release runs as a spawned task.
        tokio::task::yield_now().await;

        assert!(store.try_lock("k", Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test]
    async fn test_default_items_loops_item() {
        let store = store();
        let keys = vec!["a/b/1".to_string(), "a/b/2".to_string()];
        let handles = store.items(&keys).await.unwrap();
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].key_string(), "a/b/1");
        assert_eq!(handles[1].key_string(), "a/b/2");
    }
}
