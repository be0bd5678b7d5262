//! Mock loaders
//!
//! Configurable stand-ins for the application's source-data resolution:
//! counting invocations (for single-flight assertions), failing on demand,
//! and resolving slowly to widen race windows.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use swrcache_core::{Key, Loader, LoaderError, Result};

/// Loader returning a fixed value and counting every resolution
pub struct CountingLoader<V> {
    value: Mutex<V>,
    resolved: AtomicUsize,
    delay: Option<Duration>,
}

impl<V: Clone> CountingLoader<V> {
    /// Resolve instantly to `value`.
    pub fn new(value: V) -> Self {
        Self {
            value: Mutex::new(value),
            resolved: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Resolve to `value` after sleeping `delay`.
    ///
    /// The sleep keeps the per-key lock held long enough for concurrent
    /// callers to land in the follower tiers.
    pub fn with_delay(value: V, delay: Duration) -> Self {
        Self {
            value: Mutex::new(value),
            resolved: AtomicUsize::new(0),
            delay: Some(delay),
        }
    }

    /// How many times `resolve` ran.
    pub fn resolutions(&self) -> usize {
        self.resolved.load(Ordering::SeqCst)
    }

    /// Change the value returned by subsequent resolutions.
    pub fn set_value(&self, value: V) {
        *self.value.lock().unwrap() = value;
    }
}

#[async_trait]
impl<V: Clone + Send + Sync> Loader<V> for CountingLoader<V> {
    async fn resolve(&self, _key: &Key) -> Result<V> {
        self.resolved.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.value.lock().unwrap().clone())
    }
}

/// Loader that always fails
pub struct FailingLoader {
    message: String,
    resolved: AtomicUsize,
}

impl FailingLoader {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            resolved: AtomicUsize::new(0),
        }
    }

    /// How many times `resolve` ran.
    pub fn resolutions(&self) -> usize {
        self.resolved.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<V: Send + Sync> Loader<V> for FailingLoader {
    async fn resolve(&self, key: &Key) -> Result<V> {
        self.resolved.fetch_add(1, Ordering::SeqCst);
        Err(LoaderError::failed(key.as_str(), self.message.clone()).into())
    }
}

/// Loader that resolves distinct values per call, after a delay
///
/// Useful when a test must distinguish the leader's value from a fail-open
/// caller's independently computed one.
pub struct SlowLoader {
    prefix: String,
    delay: Duration,
    resolved: AtomicUsize,
}

impl SlowLoader {
    pub fn new(prefix: &str, delay: Duration) -> Self {
        Self {
            prefix: prefix.to_string(),
            delay,
            resolved: AtomicUsize::new(0),
        }
    }

    /// How many times `resolve` ran.
    pub fn resolutions(&self) -> usize {
        self.resolved.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Loader<String> for SlowLoader {
    async fn resolve(&self, _key: &Key) -> Result<String> {
        let call = self.resolved.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(format!("{}-{}", self.prefix, call))
    }
}
