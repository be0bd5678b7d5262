//! Remote store error types

use std::time::Duration;
use thiserror::Error;

/// Errors raised by store adapters
///
/// The engine never propagates these to `get` callers; each tier treats a
/// store failure as "no data available" and the pipeline moves on. Adapters
/// may retry transient failures internally before raising.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store I/O failed at a non-recoverable layer
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    /// The per-key lock could not be acquired within the configured bound
    #[error("Lock acquisition timed out for key '{key}'")]
    LockTimeout { key: String },

    /// A lock TTL was outside the accepted (0, 300] second range
    #[error("Lock TTL out of range: {requested:?} (accepted range is (0, {max_secs}] seconds)")]
    TtlOutOfRange { requested: Duration, max_secs: u64 },

    /// A stored payload could not be encoded or decoded
    #[error("Payload codec failure: {message}")]
    Codec { message: String },
}

impl StoreError {
    /// Create a store unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a lock timeout error
    pub fn lock_timeout(key: &str) -> Self {
        Self::LockTimeout {
            key: key.to_string(),
        }
    }

    /// Create a lock TTL out of range error
    pub fn ttl_out_of_range(requested: Duration, max_secs: u64) -> Self {
        Self::TtlOutOfRange { requested, max_secs }
    }

    /// Create a payload codec error
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }
}
