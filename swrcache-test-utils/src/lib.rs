//! Test utilities for swrcache
//!
//! This crate provides mock capability implementations and test-data
//! builders for exercising the cache engine without a real store, loader,
//! or wall clock.

pub mod builders;
pub mod mocks;

// Re-export commonly used types
pub use builders::keys;
pub use mocks::{
    CountingLoader, FailingLoader, ManualClock, RecordingSink, RecordingStore, SlowLoader,
};
