//! End-to-end read pipeline scenarios against the in-memory store
//!
//! Wall-clock time is driven by a manual clock; waiting tiers run under
//! tokio's paused time.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use swrcache_core::{
    CacheEngine, EngineConfig, FailMode, GetPolicy, InMemoryStore, Key, NoJitter, ReadMode,
    StoreAdapter,
};
use swrcache_test_utils::{keys, CountingLoader, FailingLoader, ManualClock, RecordingSink, RecordingStore};

fn epoch(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

struct Harness {
    engine: CacheEngine<String>,
    store: Arc<RecordingStore>,
    loader: Arc<CountingLoader<String>>,
    clock: Arc<ManualClock>,
    metrics: Arc<RecordingSink>,
}

fn harness(loader: Arc<CountingLoader<String>>, policy: GetPolicy) -> Harness {
    let clock = Arc::new(ManualClock::at_epoch_secs(1000));
    let store = Arc::new(RecordingStore::new(Arc::new(InMemoryStore::new(
        clock.clone(),
    ))));
    let metrics = Arc::new(RecordingSink::new());

    let config = EngineConfig {
        default_policy: policy,
        ..EngineConfig::test()
    };
    let engine = CacheEngine::new(store.clone(), loader.clone(), config)
        .unwrap()
        .with_jitter(Arc::new(NoJitter))
        .with_clock(clock.clone())
        .with_metrics(metrics.clone());

    Harness {
        engine,
        store,
        loader,
        clock,
        metrics,
    }
}

fn default_harness() -> Harness {
    harness(
        Arc::new(CountingLoader::new("loaded".to_string())),
        GetPolicy::new(600, 60).unwrap(),
    )
}

/// Write a row directly to the store, bypassing the engine.
async fn seed(store: &dyn StoreAdapter, key: &Key, value: &str, ttl_secs: u64) {
    let payload = serde_json::to_vec(&value.to_string()).unwrap();
    let mut handle = store.item(key.as_str()).await.unwrap();
    handle
        .save(&payload, Duration::from_secs(ttl_secs))
        .await
        .unwrap();
}

#[tokio::test]
async fn fresh_hit_reports_stored_timestamps() {
    // S1: created at 1000, hard expiry 1600, soft window 60, read at 1500.
    let h = default_harness();
    let key = keys::product_item("12345");
    seed(h.store.as_ref(), &key, "value", 600).await;

    h.clock.advance(Duration::from_secs(500));
    let result = h.engine.get(&key).await;

    assert!(result.is_hit());
    assert_eq!(result.value().unwrap(), "value");
    assert_eq!(result.created_at(), Some(epoch(1000)));
    assert_eq!(result.soft_expires_at(), Some(epoch(1540)));
    assert_eq!(h.metrics.count("cache_hit", &[("state", "fresh")]), 1);
    assert_eq!(h.loader.resolutions(), 0);
}

#[tokio::test]
async fn leader_computes_on_miss() {
    // S2: absent key, single caller becomes the leader.
    let h = default_harness();
    let key = keys::product_item("12345");

    let result = h.engine.get(&key).await;

    assert!(result.is_hit());
    assert_eq!(result.value().unwrap(), "loaded");
    assert_eq!(result.created_at(), Some(epoch(1000)));
    assert_eq!(result.soft_expires_at(), Some(epoch(1540)));
    assert_eq!(h.loader.resolutions(), 1);
    assert_eq!(h.store.saves(), 1);
    assert_eq!(h.metrics.count("cache_fill", &[]), 1);

    // The lock was released: a second miss can elect a new leader.
    assert_eq!(h.store.locks_granted(), 1);
    assert!(h.store.unlocks() >= 1);
}

#[tokio::test]
async fn follower_serves_stale_while_leader_holds_lock() {
    // S3: entry past hard expiry, lock held by another process.
    let h = default_harness();
    let key = keys::product_item("12345");
    seed(h.store.as_ref(), &key, "value", 600).await;

    h.clock.advance(Duration::from_secs(700)); // now = 1700 > 1600
    assert!(h
        .store
        .try_lock(key.as_str(), Duration::from_secs(30))
        .await
        .unwrap());

    let result = h.engine.get(&key).await;

    assert!(result.is_stale());
    assert_eq!(result.value().unwrap(), "value");
    assert_eq!(result.created_at(), Some(epoch(1000)));
    assert_eq!(result.soft_expires_at(), Some(epoch(1540)));
    assert_eq!(h.metrics.count("cache_hit", &[("state", "stale")]), 1);
    assert_eq!(h.loader.resolutions(), 0);
}

#[tokio::test(start_paused = true)]
async fn follower_waits_for_leader_save() {
    // S4: nothing stale to serve; the leader saves mid-wait.
    let h = default_harness();
    let key = keys::product_item("12345");

    assert!(h
        .store
        .try_lock(key.as_str(), Duration::from_secs(30))
        .await
        .unwrap());

    let engine_store = h.store.clone();
    let seed_key = key.clone();
    let leader = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        seed(engine_store.as_ref(), &seed_key, "loaded", 600).await;
        engine_store.unlock(seed_key.as_str()).await.unwrap();
    });

    let result = h.engine.get(&key).await;
    leader.await.unwrap();

    assert!(result.is_hit());
    assert_eq!(result.value().unwrap(), "loaded");
    assert_eq!(
        h.metrics.count("cache_hit", &[("state", "fresh_after_sleep")]),
        1
    );
    assert_eq!(h.loader.resolutions(), 0);
}

#[tokio::test(start_paused = true)]
async fn fail_open_computes_without_persisting() {
    // S5: the leader never finishes inside the wait bound.
    let h = default_harness();
    let key = keys::product_item("12345");

    assert!(h
        .store
        .try_lock(key.as_str(), Duration::from_secs(30))
        .await
        .unwrap());

    let result = h.engine.get(&key).await;

    assert!(result.is_hit());
    assert_eq!(result.value().unwrap(), "loaded");
    // Fail-open computes for this caller only.
    assert_eq!(h.store.saves(), 0);
    assert_eq!(h.loader.resolutions(), 1);
    assert_eq!(
        h.metrics.count("cache_miss", &[("cause", "precompute_race")]),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn fail_closed_reports_miss() {
    let h = harness(
        Arc::new(CountingLoader::new("loaded".to_string())),
        GetPolicy::new(600, 60)
            .unwrap()
            .with_fail_mode(FailMode::Closed),
    );
    let key = keys::product_item("12345");

    assert!(h
        .store
        .try_lock(key.as_str(), Duration::from_secs(30))
        .await
        .unwrap());

    let result = h.engine.get(&key).await;

    assert!(result.is_miss());
    assert_eq!(h.loader.resolutions(), 0);
    assert_eq!(h.store.saves(), 0);
    assert_eq!(
        h.metrics
            .count("cache_miss", &[("cause", "precompute_race_fail_closed")]),
        1
    );
}

#[tokio::test]
async fn loader_failure_becomes_miss() {
    let clock = Arc::new(ManualClock::at_epoch_secs(1000));
    let store = Arc::new(RecordingStore::new(Arc::new(InMemoryStore::new(
        clock.clone(),
    ))));
    let metrics = Arc::new(RecordingSink::new());
    let loader = Arc::new(FailingLoader::new("upstream 503"));

    let engine: CacheEngine<String> =
        CacheEngine::new(store.clone(), loader.clone(), EngineConfig::test())
            .unwrap()
            .with_clock(clock)
            .with_metrics(metrics.clone());

    let key = keys::product_item("12345");
    let result = engine.get(&key).await;

    assert!(result.is_miss());
    assert!(result.value().is_err());
    assert_eq!(metrics.count("cache_miss", &[("cause", "loader_failed")]), 1);
    assert_eq!(store.saves(), 0);

    // The leader lock was released despite the failure.
    assert!(store.try_lock(key.as_str(), Duration::from_secs(30)).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn store_outage_fails_open() {
    let h = default_harness();
    let key = keys::product_item("12345");

    h.store.fail_reads(true);
    h.store.fail_locks(true);

    let result = h.engine.get(&key).await;

    assert!(result.is_hit());
    assert_eq!(result.value().unwrap(), "loaded");
    assert_eq!(h.store.saves(), 0);
}

#[tokio::test(start_paused = true)]
async fn store_outage_fails_closed_when_configured() {
    let h = harness(
        Arc::new(CountingLoader::new("loaded".to_string())),
        GetPolicy::new(600, 60)
            .unwrap()
            .with_fail_mode(FailMode::Closed),
    );
    let key = keys::product_item("12345");

    h.store.fail_reads(true);
    h.store.fail_locks(true);

    let result = h.engine.get(&key).await;
    assert!(result.is_miss());
    assert_eq!(h.loader.resolutions(), 0);
}

#[tokio::test]
async fn soft_window_triggers_rebuild_while_value_still_fresh() {
    // Inside the soft window the engine re-resolves even though the hard
    // expiry has not passed.
    let h = default_harness();
    let key = keys::product_item("12345");
    seed(h.store.as_ref(), &key, "old", 600).await;

    // now = 1560, inside [1540, 1600)
    h.clock.advance(Duration::from_secs(560));
    let result = h.engine.get(&key).await;

    assert!(result.is_hit());
    assert_eq!(result.value().unwrap(), "loaded");
    assert_eq!(h.loader.resolutions(), 1);
    assert_eq!(h.metrics.count("cache_fill", &[]), 1);
}

#[tokio::test]
async fn get_many_isolates_per_key_outcomes() {
    let h = default_harness();
    let cached = keys::product_item("cached");
    let missing = keys::product_item("missing");
    seed(h.store.as_ref(), &cached, "value", 600).await;

    let results = h
        .engine
        .get_many(&[cached.clone(), missing.clone()])
        .await;

    assert_eq!(results.len(), 2);
    assert!(results[&cached].is_hit());
    assert_eq!(results[&cached].value().unwrap(), "value");
    assert!(results[&missing].is_hit());
    assert_eq!(results[&missing].value().unwrap(), "loaded");
    // Only the missing key reached the loader.
    assert_eq!(h.loader.resolutions(), 1);
}

#[tokio::test]
async fn get_many_with_failing_loader_keeps_good_keys() {
    let clock = Arc::new(ManualClock::at_epoch_secs(1000));
    let inner = Arc::new(InMemoryStore::new(clock.clone()));
    let store = Arc::new(RecordingStore::new(inner));
    let loader = Arc::new(FailingLoader::new("down"));

    let engine: CacheEngine<String> =
        CacheEngine::new(store.clone(), loader, EngineConfig::test())
            .unwrap()
            .with_clock(clock)
            .with_jitter(Arc::new(NoJitter));

    let cached = keys::product_item("cached");
    let failing = keys::product_item("failing");
    seed(store.as_ref(), &cached, "value", 600).await;

    let results = engine.get_many(&[cached.clone(), failing.clone()]).await;

    assert!(results[&cached].is_hit());
    assert!(results[&failing].is_miss());
}

#[tokio::test]
async fn put_writes_through_policy_ttl() {
    let h = default_harness();
    let key = keys::product_item("12345");

    h.engine.put(&key, &"direct".to_string()).await.unwrap();
    assert_eq!(h.store.saves(), 1);

    let mut handle = h.store.item(key.as_str()).await.unwrap();
    handle.set_mode(ReadMode::Old);
    let payload = handle.read().await.unwrap().unwrap();
    assert_eq!(payload, serde_json::to_vec(&"direct".to_string()).unwrap());

    let stamps = handle.timestamps().await.unwrap().unwrap();
    assert_eq!(stamps.created_at, epoch(1000));
    assert_eq!(stamps.hard_expires_at, epoch(1600));
}
