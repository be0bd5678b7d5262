//! swrcache core library
//!
//! Stale-while-revalidate caching over a shared key-value store, with
//! single-flight stampede protection and hierarchical invalidation.
//!
//! The engine implements a five-tier read pipeline: fresh hit, leader
//! recompute under a per-key lock, follower-serves-stale, bounded follower
//! wait, and a configurable fail-open/fail-closed last resort. Write-side
//! operations run synchronously or deferred through an event bus.

pub mod clock;
pub mod engine;
pub mod error;
pub mod events;
pub mod jitter;
pub mod key;
pub mod loader;
pub mod metrics;
pub mod policy;
pub mod result;
pub mod store;

// Re-export main types
pub use clock::{Clock, SystemClock};
pub use engine::{CacheEngine, EngineConfig};
pub use error::{AccessError, Error, LoaderError, Result, StoreError, ValidationError};
pub use events::{AsyncEvent, EventBus, EventHandler, InProcessBus};
pub use jitter::{Jitter, NoJitter, ProportionalJitter};
pub use key::{IdValue, Key, KeyBuilder, KeyPrefix, Selector};
pub use loader::{FnLoader, Loader};
pub use metrics::{LogSink, MetricsSink, NullSink};
pub use policy::{FailMode, GetPolicy, InvalidateMode, InvalidatePolicy, RefreshMode};
pub use result::ValueResult;
pub use store::{
    EntryStamps, InMemoryStore, ItemHandle, LockGuard, MemoryStoreConfig, MemoryStoreStats,
    ReadMode, StoreAdapter,
};
