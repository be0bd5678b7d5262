//! The read/refresh/invalidate orchestrator
//!
//! [`CacheEngine`] sits between application code and the shared store and
//! implements the five-tier read pipeline:
//!
//! 1. fresh hit from the store
//! 2. leader recompute under the per-key lock (single-flight)
//! 3. follower serves the stale value
//! 4. follower waits, bounded, for the leader's save
//! 5. fail-open compute (never persisted) or fail-closed miss
//!
//! Store failures never escape `get`: each tier treats them as "no data
//! here" and the pipeline moves on. Loader failures become misses with a
//! `loader_failed` cause.

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, ValidationError};
use crate::events::{AsyncEvent, EventBus, EventHandler};
use crate::jitter::{Jitter, ProportionalJitter};
use crate::key::{Key, KeyPrefix, Selector};
use crate::loader::Loader;
use crate::metrics::{counters, MetricsSink, NullSink};
use crate::policy::{FailMode, GetPolicy, InvalidateMode, InvalidatePolicy, RefreshMode};
use crate::result::ValueResult;
use crate::store::{EntryStamps, ItemHandle, LockGuard, ReadMode, StoreAdapter, MAX_LOCK_TTL_SECS};
use async_trait::async_trait;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Policy used by `get` and `put` when the caller does not pass one.
    pub default_policy: GetPolicy,
    /// TTL of the per-key recomputation lock. Must lie in (0, 300] seconds.
    pub lock_ttl: Duration,
    /// Pause between follower wait attempts.
    pub sleep_pause: Duration,
    /// Maximum follower wait attempts; the wait is bounded by
    /// `sleep_pause * sleep_attempts`.
    pub sleep_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_policy: GetPolicy::default(),
            lock_ttl: Duration::from_secs(30),
            sleep_pause: Duration::from_millis(150),
            sleep_attempts: 6,
        }
    }
}

impl EngineConfig {
    /// Configuration with short windows for fast tests.
    pub fn test() -> Self {
        Self {
            default_policy: GetPolicy::new(600, 60).expect("test policy is valid"),
            lock_ttl: Duration::from_secs(5),
            sleep_pause: Duration::from_millis(150),
            sleep_attempts: 6,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.lock_ttl.is_zero() || self.lock_ttl > Duration::from_secs(MAX_LOCK_TTL_SECS) {
            return Err(ValidationError::policy_out_of_range(
                "lock_ttl",
                "must lie in (0, 300] seconds",
            )
            .into());
        }
        if self.sleep_attempts == 0 {
            return Err(ValidationError::policy_out_of_range(
                "sleep_attempts",
                "must be at least 1",
            )
            .into());
        }
        Ok(())
    }
}

/// Stale-while-revalidate cache engine
///
/// Polymorphic over its capability set: store adapter, loader, jitter,
/// metrics sink, clock, and an optional event bus for deferred write-side
/// operations. All fields are immutable after construction, so a single
/// engine is shared freely across tasks.
pub struct CacheEngine<V> {
    store: Arc<dyn StoreAdapter>,
    loader: Arc<dyn Loader<V>>,
    jitter: Arc<dyn Jitter>,
    metrics: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
    bus: Option<Arc<dyn EventBus>>,
    config: EngineConfig,
}

impl<V> CacheEngine<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create an engine over a store and loader.
    ///
    /// Defaults: proportional jitter, discarded metrics, system clock, no
    /// event bus.
    pub fn new(
        store: Arc<dyn StoreAdapter>,
        loader: Arc<dyn Loader<V>>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            loader,
            jitter: Arc::new(ProportionalJitter::default()),
            metrics: Arc::new(NullSink),
            clock: Arc::new(SystemClock),
            bus: None,
            config,
        })
    }

    /// Replace the jitter.
    pub fn with_jitter(mut self, jitter: Arc<dyn Jitter>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace the metrics sink.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach an event bus for ASYNC write-side modes.
    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Read with the default policy.
    pub async fn get(&self, key: &Key) -> ValueResult<V> {
        self.get_with_policy(key, self.config.default_policy).await
    }

    /// Read with an explicit policy.
    pub async fn get_with_policy(&self, key: &Key, policy: GetPolicy) -> ValueResult<V> {
        if let Some(result) = self.read_fresh(key, &policy).await {
            return result;
        }
        self.tail_tiers(key, &policy).await
    }

    /// Read several keys, batching the fresh-hit reads against the store.
    ///
    /// Outcomes are per-key isolated: one key's failure never affects the
    /// others' entries in the result map.
    pub async fn get_many(&self, keys: &[Key]) -> HashMap<Key, ValueResult<V>> {
        let policy = self.config.default_policy;
        let mut results = HashMap::with_capacity(keys.len());
        let mut missed: Vec<&Key> = Vec::new();

        let key_strings: Vec<String> = keys.iter().map(|key| key.as_str().to_string()).collect();
        match self.store.items(&key_strings).await {
            Ok(handles) => {
                for (key, mut handle) in keys.iter().zip(handles) {
                    match self.extract_fresh(handle.as_mut(), key, &policy).await {
                        Some(result) => {
                            results.insert(key.clone(), result);
                        }
                        None => missed.push(key),
                    }
                }
            }
            Err(error) => {
                warn!("batched read failed, degrading to per-key pipeline: {error}");
                missed.extend(keys.iter());
            }
        }

        for key in missed {
            let result = self.tail_tiers(key, &policy).await;
            results.insert(key.clone(), result);
        }

        results
    }

    /// Write a value under the default policy's TTL windows.
    pub async fn put(&self, key: &Key, value: &V) -> Result<()> {
        self.put_with_policy(key, value, self.config.default_policy).await
    }

    /// Write a value under an explicit policy.
    pub async fn put_with_policy(&self, key: &Key, value: &V, policy: GetPolicy) -> Result<()> {
        self.save_value(key, value, &policy).await
    }

    /// Recompute a key from source.
    ///
    /// SYNC resolves and saves on the caller; ASYNC enqueues and returns.
    pub async fn refresh(&self, key: &Key, mode: RefreshMode) -> Result<()> {
        match mode {
            RefreshMode::Sync => {
                let value = self.loader.resolve(key).await?;
                self.put(key, &value).await
            }
            RefreshMode::Async => self.dispatch_or_run(AsyncEvent {
                selector: Selector::from(key.clone()),
                exact: false,
                refresh: true,
            }).await,
        }
    }

    /// Remove every entry under the selector's namespace prefix.
    ///
    /// With `cascade_namespaces` the clear widens to the whole domain/facet
    /// subtree, covering all schema versions and locales under it.
    pub async fn invalidate(&self, selector: &Selector, policy: InvalidatePolicy) -> Result<()> {
        let prefix = if policy.cascade_namespaces() {
            selector.to_prefix().subtree()
        } else {
            selector.to_prefix()
        };

        match policy.mode() {
            InvalidateMode::DeleteSync | InvalidateMode::Default => {
                self.clear_prefix(&prefix).await
            }
            InvalidateMode::RefreshSync => match selector.as_key() {
                Some(key) => self.refresh(key, RefreshMode::Sync).await,
                None => {
                    // A bare prefix cannot be re-resolved; the closest
                    // correct behavior is to drop the subtree so the next
                    // readers rebuild it.
                    debug!(
                        "refresh invalidation on prefix '{}' degrades to delete",
                        prefix.prefix_string()
                    );
                    self.clear_prefix(&prefix).await
                }
            },
            InvalidateMode::DeleteAsync => self.dispatch_or_run(AsyncEvent {
                selector: Selector::from(prefix),
                exact: false,
                refresh: false,
            }).await,
            InvalidateMode::RefreshAsync => self.dispatch_or_run(AsyncEvent {
                selector: selector.clone(),
                exact: false,
                refresh: true,
            }).await,
        }
    }

    /// Remove exactly one entry.
    pub async fn invalidate_exact(&self, key: &Key, mode: InvalidateMode) -> Result<()> {
        match mode {
            InvalidateMode::DeleteSync | InvalidateMode::Default => {
                self.store.delete_exact(key.as_str()).await
            }
            InvalidateMode::RefreshSync => self.refresh(key, RefreshMode::Sync).await,
            InvalidateMode::DeleteAsync => self.dispatch_or_run(AsyncEvent {
                selector: Selector::from(key.clone()),
                exact: true,
                refresh: false,
            }).await,
            InvalidateMode::RefreshAsync => self.dispatch_or_run(AsyncEvent {
                selector: Selector::from(key.clone()),
                exact: true,
                refresh: true,
            }).await,
        }
    }

    /// Drop every entry under a namespace prefix.
    ///
    /// Alias for a prefix-scoped synchronous invalidation.
    pub async fn bump_namespace(&self, prefix: &KeyPrefix) -> Result<()> {
        self.clear_prefix(prefix).await
    }

    // ----- read pipeline tiers -----

    /// Tier 1: fresh hit through a precompute-window read.
    async fn read_fresh(&self, key: &Key, policy: &GetPolicy) -> Option<ValueResult<V>> {
        let mut handle = match self.store.item(key.as_str()).await {
            Ok(handle) => handle,
            Err(error) => {
                warn!("store read failed for '{key}': {error}");
                return None;
            }
        };
        self.extract_fresh(handle.as_mut(), key, policy).await
    }

    /// Tiers 2-5, applied after a tier-1 miss.
    async fn tail_tiers(&self, key: &Key, policy: &GetPolicy) -> ValueResult<V> {
        if let Some(result) = self.lead_compute(key, policy).await {
            return result;
        }
        if let Some(result) = self.serve_stale(key, policy).await {
            return result;
        }
        if let Some(result) = self.wait_for_fresh(key, policy).await {
            return result;
        }
        self.fail_last(key, policy).await
    }

    /// Shared tier-1 body: read a handle in precompute mode and build a
    /// fresh hit if the store reports one.
    async fn extract_fresh(
        &self,
        handle: &mut dyn ItemHandle,
        key: &Key,
        policy: &GetPolicy,
    ) -> Option<ValueResult<V>> {
        handle.set_mode(ReadMode::Precompute {
            soft: policy.soft_window(),
        });

        let payload = match handle.read().await {
            Ok(payload) => payload,
            Err(error) => {
                warn!("store read failed for '{key}': {error}");
                return None;
            }
        };

        if !handle.is_hit() {
            debug!("'{key}': no fresh value, entering recompute path");
            return None;
        }

        let value = self.decode(payload?.as_slice(), key)?;
        let stamps = match handle.timestamps().await {
            Ok(stamps) => stamps?,
            Err(error) => {
                warn!("store timestamps failed for '{key}': {error}");
                return None;
            }
        };

        self.metrics.increment(counters::CACHE_HIT, &[("state", "fresh")]);
        Some(ValueResult::hit(
            value,
            stamps.created_at,
            self.soft_expiry(&stamps, policy),
        ))
    }

    /// Tier 2: win the per-key lock and recompute.
    async fn lead_compute(&self, key: &Key, policy: &GetPolicy) -> Option<ValueResult<V>> {
        let locked = match self.store.try_lock(key.as_str(), self.config.lock_ttl).await {
            Ok(locked) => locked,
            Err(error) => {
                // A failing lock acquisition means another leader may exist;
                // follow the follower tiers.
                debug!("lock acquisition failed for '{key}': {error}");
                false
            }
        };
        if !locked {
            return None;
        }

        let guard = LockGuard::new(Arc::clone(&self.store), key.as_str().to_string());
        debug!("'{key}': lock acquired, resolving from source");

        let value = match self.loader.resolve(key).await {
            Ok(value) => value,
            Err(error) => {
                warn!("loader failed for '{key}': {error}");
                self.metrics
                    .increment(counters::CACHE_MISS, &[("cause", "loader_failed")]);
                guard.release().await;
                return Some(ValueResult::miss());
            }
        };

        if let Err(error) = self.save_value(key, &value, policy).await {
            // The computed value is still correct for this caller.
            warn!("save failed for '{key}': {error}");
        }

        let now = self.clock.now();
        let hard_expires_at = now + policy.hard_ttl();
        let stamps = EntryStamps {
            created_at: now,
            hard_expires_at,
        };

        self.metrics.increment(counters::CACHE_FILL, &[]);
        guard.release().await;
        Some(ValueResult::hit(value, now, self.soft_expiry(&stamps, policy)))
    }

    /// Tier 3: follower serves the previously stored value.
    async fn serve_stale(&self, key: &Key, policy: &GetPolicy) -> Option<ValueResult<V>> {
        let mut handle = self.store.item(key.as_str()).await.ok()?;
        handle.set_mode(ReadMode::Old);

        let payload = match handle.read().await {
            Ok(payload) => payload?,
            Err(error) => {
                warn!("stale read failed for '{key}': {error}");
                return None;
            }
        };
        let value = self.decode(&payload, key)?;
        let stamps = handle.timestamps().await.ok().flatten()?;

        debug!("'{key}': serving stale value while the leader recomputes");
        self.metrics.increment(counters::CACHE_HIT, &[("state", "stale")]);
        Some(ValueResult::stale(
            value,
            stamps.created_at,
            self.soft_expiry(&stamps, policy),
        ))
    }

    /// Tier 4: follower waits, bounded, for the leader's save.
    async fn wait_for_fresh(&self, key: &Key, policy: &GetPolicy) -> Option<ValueResult<V>> {
        let mut handle = self.store.item(key.as_str()).await.ok()?;
        handle.set_mode(ReadMode::Sleep {
            pause: self.config.sleep_pause,
            max_attempts: self.config.sleep_attempts,
        });

        let payload = match handle.read().await {
            Ok(payload) => payload,
            Err(error) => {
                warn!("wait read failed for '{key}': {error}");
                return None;
            }
        };
        if !handle.is_hit() {
            return None;
        }

        let value = self.decode(payload?.as_slice(), key)?;
        let stamps = handle.timestamps().await.ok().flatten()?;

        self.metrics
            .increment(counters::CACHE_HIT, &[("state", "fresh_after_sleep")]);
        Some(ValueResult::hit(
            value,
            stamps.created_at,
            self.soft_expiry(&stamps, policy),
        ))
    }

    /// Tier 5: fail-open compute (never persisted) or fail-closed miss.
    async fn fail_last(&self, key: &Key, policy: &GetPolicy) -> ValueResult<V> {
        match policy.fail_mode() {
            FailMode::Open => {
                debug!("'{key}': recovery exhausted, computing without the cache");
                match self.loader.resolve(key).await {
                    Ok(value) => {
                        // Deliberately not saved: the racing leader's write
                        // wins the store.
                        let now = self.clock.now();
                        let stamps = EntryStamps {
                            created_at: now,
                            hard_expires_at: now + policy.hard_ttl(),
                        };
                        self.metrics
                            .increment(counters::CACHE_MISS, &[("cause", "precompute_race")]);
                        ValueResult::hit(value, now, self.soft_expiry(&stamps, policy))
                    }
                    Err(error) => {
                        warn!("loader failed for '{key}': {error}");
                        self.metrics
                            .increment(counters::CACHE_MISS, &[("cause", "loader_failed")]);
                        ValueResult::miss()
                    }
                }
            }
            FailMode::Closed => {
                self.metrics.increment(
                    counters::CACHE_MISS,
                    &[("cause", "precompute_race_fail_closed")],
                );
                ValueResult::miss()
            }
        }
    }

    // ----- shared plumbing -----

    async fn save_value(&self, key: &Key, value: &V, policy: &GetPolicy) -> Result<()> {
        let ttl_secs = self.jitter.apply(policy.hard_secs(), key);
        let payload = serde_json::to_vec(value)?;
        let mut handle = self.store.item(key.as_str()).await?;
        handle.save(&payload, Duration::from_secs(ttl_secs)).await
    }

    fn decode(&self, payload: &[u8], key: &Key) -> Option<V> {
        match serde_json::from_slice(payload) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!("undecodable payload for '{key}': {error}");
                None
            }
        }
    }

    fn soft_expiry(&self, stamps: &EntryStamps, policy: &GetPolicy) -> SystemTime {
        let derived = stamps.hard_expires_at - policy.soft_window();
        derived.max(stamps.created_at)
    }

    async fn clear_prefix(&self, prefix: &KeyPrefix) -> Result<()> {
        // The trailing separator keeps sibling namespaces with a shared
        // textual prefix out of the clear.
        self.store
            .clear_by_prefix(&format!("{}/", prefix.prefix_string()))
            .await
    }

    async fn dispatch_or_run(&self, event: AsyncEvent) -> Result<()> {
        match &self.bus {
            Some(bus) => bus.dispatch(event),
            None => {
                // Without a bus the deferred form degrades to the
                // synchronous counterpart on the caller.
                debug!(
                    "no event bus configured; applying '{}' synchronously",
                    event.selector.prefix_string()
                );
                self.handle_event(event).await
            }
        }
    }
}

#[async_trait]
impl<V> EventHandler for CacheEngine<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Replay a bus event as its synchronous counterpart.
    ///
    /// Never dispatches further events, which is what keeps the bus free of
    /// handler-generated loops.
    async fn handle_event(&self, event: AsyncEvent) -> Result<()> {
        if event.refresh {
            return match event.selector.as_key() {
                Some(key) => self.refresh(key, RefreshMode::Sync).await,
                None => {
                    let prefix = event.selector.to_prefix();
                    debug!(
                        "refresh event on prefix '{}' degrades to delete",
                        prefix.prefix_string()
                    );
                    self.clear_prefix(&prefix).await
                }
            };
        }

        if event.exact {
            match event.selector.as_key() {
                Some(key) => self.store.delete_exact(key.as_str()).await,
                None => {
                    let prefix = event.selector.to_prefix();
                    self.clear_prefix(&prefix).await
                }
            }
        } else {
            self.clear_prefix(&event.selector.to_prefix()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::FnLoader;
    use crate::store::InMemoryStore;

    fn engine_with(config: EngineConfig) -> Result<CacheEngine<String>> {
        let store = Arc::new(InMemoryStore::new(Arc::new(SystemClock)));
        let loader = Arc::new(FnLoader::new(|_key: &Key| async { Ok(String::new()) }));
        CacheEngine::new(store, loader, config)
    }

    #[tokio::test]
    async fn test_lock_ttl_is_validated_at_construction() {
        let mut config = EngineConfig::default();
        config.lock_ttl = Duration::ZERO;
        assert!(engine_with(config).is_err());

        let mut config = EngineConfig::default();
        config.lock_ttl = Duration::from_secs(301);
        assert!(engine_with(config).is_err());

        let mut config = EngineConfig::default();
        config.lock_ttl = Duration::from_secs(300);
        assert!(engine_with(config).is_ok());
    }

    #[tokio::test]
    async fn test_sleep_attempts_must_be_positive() {
        let mut config = EngineConfig::default();
        config.sleep_attempts = 0;
        assert!(engine_with(config).is_err());
    }

    #[test]
    fn test_wait_bound_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sleep_pause, Duration::from_millis(150));
        assert_eq!(config.sleep_attempts, 6);
    }
}
