//! In-memory store adapter
//!
//! Reference implementation of the store contract, backed by tokio-guarded
//! maps. It is the adapter used throughout the test suites and documents the
//! semantics networked adapters must reproduce: rows are retained for a
//! grace window past hard expiry so `Old`-mode reads can serve stale values,
//! and locks expire on their own TTL.

use crate::clock::Clock;
use crate::error::{Result, StoreError};
use crate::store::{
    EntryStamps, ItemHandle, ReadMode, StoreAdapter, LOCK_KEY_TAG, MAX_LOCK_TTL_SECS,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{Mutex, RwLock};

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// How long a row remains readable in `Old` mode past its hard expiry.
    pub stale_grace: Duration,
    /// Upper bound on accepted lock TTLs.
    pub max_lock_ttl: Duration,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            stale_grace: Duration::from_secs(600),
            max_lock_ttl: Duration::from_secs(MAX_LOCK_TTL_SECS),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredRow {
    payload: Vec<u8>,
    created_at: SystemTime,
    hard_expires_at: SystemTime,
}

/// Counts exposed for assertions and diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub entry_count: usize,
    pub lock_count: usize,
}

/// Map-backed store adapter
pub struct InMemoryStore {
    rows: Arc<RwLock<HashMap<String, StoredRow>>>,
    locks: Arc<Mutex<HashMap<String, SystemTime>>>,
    clock: Arc<dyn Clock>,
    config: MemoryStoreConfig,
}

impl InMemoryStore {
    /// Create a store with default configuration.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(clock, MemoryStoreConfig::default())
    }

    /// Create a store with custom configuration.
    pub fn with_config(clock: Arc<dyn Clock>, config: MemoryStoreConfig) -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            locks: Arc::new(Mutex::new(HashMap::new())),
            clock,
            config,
        }
    }

    /// Current entry and lock counts.
    pub async fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            entry_count: self.rows.read().await.len(),
            lock_count: self.locks.lock().await.len(),
        }
    }

    /// Whether the lock for `key_string` is currently held.
    pub async fn is_locked(&self, key_string: &str) -> bool {
        let lock_key = format!("{LOCK_KEY_TAG}{key_string}");
        let now = self.clock.now();
        self.locks
            .lock()
            .await
            .get(&lock_key)
            .is_some_and(|expires_at| now < *expires_at)
    }

}

#[async_trait]
impl StoreAdapter for InMemoryStore {
    async fn item(&self, key_string: &str) -> Result<Box<dyn ItemHandle>> {
        Ok(Box::new(MemoryItemHandle {
            key_string: key_string.to_string(),
            mode: ReadMode::Precompute {
                soft: Duration::ZERO,
            },
            hit: false,
            row: None,
            rows: Arc::clone(&self.rows),
            locks: Arc::clone(&self.locks),
            clock: Arc::clone(&self.clock),
            stale_grace: self.config.stale_grace,
        }))
    }

    async fn try_lock(&self, key_string: &str, ttl: Duration) -> Result<bool> {
        if ttl.is_zero() || ttl > self.config.max_lock_ttl {
            return Err(
                StoreError::ttl_out_of_range(ttl, self.config.max_lock_ttl.as_secs()).into(),
            );
        }

        let lock_key = format!("{LOCK_KEY_TAG}{key_string}");
        let now = self.clock.now();
        let mut locks = self.locks.lock().await;

        if let Some(expires_at) = locks.get(&lock_key) {
            if now < *expires_at {
                return Ok(false);
            }
            // Expired lock from a dead holder; claim it.
        }

        locks.insert(lock_key, now + ttl);
        Ok(true)
    }

    async fn unlock(&self, key_string: &str) -> Result<()> {
        let lock_key = format!("{LOCK_KEY_TAG}{key_string}");
        self.locks.lock().await.remove(&lock_key);
        Ok(())
    }

    async fn delete_exact(&self, key_string: &str) -> Result<()> {
        self.rows.write().await.remove(key_string);
        Ok(())
    }

    async fn clear_by_prefix(&self, prefix_string: &str) -> Result<()> {
        self.rows
            .write()
            .await
            .retain(|key_string, _| !key_string.starts_with(prefix_string));
        Ok(())
    }
}

struct MemoryItemHandle {
    key_string: String,
    mode: ReadMode,
    hit: bool,
    row: Option<StoredRow>,
    rows: Arc<RwLock<HashMap<String, StoredRow>>>,
    locks: Arc<Mutex<HashMap<String, SystemTime>>>,
    clock: Arc<dyn Clock>,
    stale_grace: Duration,
}

impl MemoryItemHandle {
    async fn load(&self) -> Option<StoredRow> {
        let now = self.clock.now();
        let rows = self.rows.read().await;
        rows.get(&self.key_string)
            .filter(|row| now < row.hard_expires_at + self.stale_grace)
            .cloned()
    }

    async fn lock_held(&self) -> bool {
        let lock_key = format!("{LOCK_KEY_TAG}{}", self.key_string);
        let now = self.clock.now();
        self.locks
            .lock()
            .await
            .get(&lock_key)
            .is_some_and(|expires_at| now < *expires_at)
    }

    fn soft_expiry(row: &StoredRow, soft: Duration) -> SystemTime {
        let derived = row.hard_expires_at - soft;
        derived.max(row.created_at)
    }
}

#[async_trait]
impl ItemHandle for MemoryItemHandle {
    fn key_string(&self) -> &str {
        &self.key_string
    }

    fn set_mode(&mut self, mode: ReadMode) {
        self.mode = mode;
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        match self.mode {
            ReadMode::Precompute { soft } => {
                let now = self.clock.now();
                let row = self.load().await;
                self.row = row.clone();

                match row {
                    Some(row) if now < row.hard_expires_at => {
                        self.hit = now < Self::soft_expiry(&row, soft);
                        Ok(Some(row.payload))
                    }
                    _ => {
                        self.hit = false;
                        Ok(None)
                    }
                }
            }
            ReadMode::Old => {
                // Serve whatever is physically present, expired or not.
                let row = self.load().await;
                self.row = row.clone();
                self.hit = row.is_some();
                Ok(row.map(|row| row.payload))
            }
            ReadMode::Sleep { pause, max_attempts } => {
                for attempt in 0..=max_attempts {
                    let now = self.clock.now();
                    if let Some(row) = self.load().await {
                        if now < row.hard_expires_at {
                            self.row = Some(row.clone());
                            self.hit = true;
                            return Ok(Some(row.payload));
                        }
                    }

                    if attempt == max_attempts {
                        break;
                    }
                    // Once the holder is gone with nothing fresh written,
                    // further waiting cannot produce a value.
                    if attempt > 0 && !self.lock_held().await {
                        break;
                    }
                    tokio::time::sleep(pause).await;
                }

                self.hit = false;
                Ok(None)
            }
        }
    }

    fn is_hit(&self) -> bool {
        self.hit
    }

    async fn timestamps(&mut self) -> Result<Option<EntryStamps>> {
        let row = match &self.row {
            Some(row) => Some(row.clone()),
            None => self.load().await,
        };

        Ok(row.map(|row| EntryStamps {
            created_at: row.created_at,
            hard_expires_at: row.hard_expires_at,
        }))
    }

    async fn save(&mut self, payload: &[u8], ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        let row = StoredRow {
            payload: payload.to_vec(),
            created_at: now,
            hard_expires_at: now + ttl,
        };

        let mut rows = self.rows.write().await;
        // Drop rows past their retention window while we hold the write lock.
        let stale_grace = self.stale_grace;
        rows.retain(|_, existing| now < existing.hard_expires_at + stale_grace);
        rows.insert(self.key_string.clone(), row.clone());
        self.row = Some(row);

        Ok(())
    }
}
