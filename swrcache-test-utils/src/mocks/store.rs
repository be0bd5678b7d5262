//! Recording store wrapper
//!
//! Wraps any store adapter, counting mutations and lock traffic, with
//! switchable failure injection. Tests assert single-flight and fail-open
//! non-persistence by inspecting the counters.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swrcache_core::{EntryStamps, ItemHandle, ReadMode, Result, StoreAdapter, StoreError};

#[derive(Default)]
struct Counters {
    saves: AtomicUsize,
    deletes: AtomicUsize,
    prefix_clears: Mutex<Vec<String>>,
    lock_attempts: AtomicUsize,
    locks_granted: AtomicUsize,
    unlocks: AtomicUsize,
    fail_reads: AtomicBool,
    fail_locks: AtomicBool,
}

/// Store adapter that records operations against an inner adapter
pub struct RecordingStore {
    inner: Arc<dyn StoreAdapter>,
    counters: Arc<Counters>,
}

impl RecordingStore {
    pub fn new(inner: Arc<dyn StoreAdapter>) -> Self {
        Self {
            inner,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Number of `save` calls observed.
    pub fn saves(&self) -> usize {
        self.counters.saves.load(Ordering::SeqCst)
    }

    /// Number of `delete_exact` calls observed.
    pub fn deletes(&self) -> usize {
        self.counters.deletes.load(Ordering::SeqCst)
    }

    /// Prefixes passed to `clear_by_prefix`, in order.
    pub fn prefix_clears(&self) -> Vec<String> {
        self.counters.prefix_clears.lock().unwrap().clone()
    }

    /// Number of `try_lock` calls observed.
    pub fn lock_attempts(&self) -> usize {
        self.counters.lock_attempts.load(Ordering::SeqCst)
    }

    /// Number of `try_lock` calls that acquired the lock.
    pub fn locks_granted(&self) -> usize {
        self.counters.locks_granted.load(Ordering::SeqCst)
    }

    /// Number of `unlock` calls observed.
    pub fn unlocks(&self) -> usize {
        self.counters.unlocks.load(Ordering::SeqCst)
    }

    /// Make every handle read fail until switched back.
    pub fn fail_reads(&self, fail: bool) {
        self.counters.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every lock acquisition fail until switched back.
    pub fn fail_locks(&self, fail: bool) {
        self.counters.fail_locks.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreAdapter for RecordingStore {
    async fn item(&self, key_string: &str) -> Result<Box<dyn ItemHandle>> {
        let inner = self.inner.item(key_string).await?;
        Ok(Box::new(RecordingHandle {
            inner,
            counters: Arc::clone(&self.counters),
        }))
    }

    async fn try_lock(&self, key_string: &str, ttl: Duration) -> Result<bool> {
        self.counters.lock_attempts.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_locks.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("injected lock failure").into());
        }

        let granted = self.inner.try_lock(key_string, ttl).await?;
        if granted {
            self.counters.locks_granted.fetch_add(1, Ordering::SeqCst);
        }
        Ok(granted)
    }

    async fn unlock(&self, key_string: &str) -> Result<()> {
        self.counters.unlocks.fetch_add(1, Ordering::SeqCst);
        self.inner.unlock(key_string).await
    }

    async fn delete_exact(&self, key_string: &str) -> Result<()> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_exact(key_string).await
    }

    async fn clear_by_prefix(&self, prefix_string: &str) -> Result<()> {
        self.counters
            .prefix_clears
            .lock()
            .unwrap()
            .push(prefix_string.to_string());
        self.inner.clear_by_prefix(prefix_string).await
    }
}

struct RecordingHandle {
    inner: Box<dyn ItemHandle>,
    counters: Arc<Counters>,
}

#[async_trait]
impl ItemHandle for RecordingHandle {
    fn key_string(&self) -> &str {
        self.inner.key_string()
    }

    fn set_mode(&mut self, mode: ReadMode) {
        self.inner.set_mode(mode);
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        if self.counters.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("injected read failure").into());
        }
        self.inner.read().await
    }

    fn is_hit(&self) -> bool {
        self.inner.is_hit()
    }

    async fn timestamps(&mut self) -> Result<Option<EntryStamps>> {
        self.inner.timestamps().await
    }

    async fn save(&mut self, payload: &[u8], ttl: Duration) -> Result<()> {
        self.counters.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(payload, ttl).await
    }
}
