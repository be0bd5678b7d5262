//! Read outcomes
//!
//! A read produces exactly one of three states: a fresh hit, a stale value
//! served during recomputation, or a miss. Timestamps are only defined for
//! the value-carrying states.

use crate::error::{AccessError, Result};
use std::time::SystemTime;

/// Outcome of a cache read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueResult<V> {
    /// Value exists and `now` is before its soft expiry
    Hit {
        value: V,
        created_at: SystemTime,
        soft_expires_at: SystemTime,
    },
    /// Value exists but its soft expiry has passed
    Stale {
        value: V,
        created_at: SystemTime,
        soft_expires_at: SystemTime,
    },
    /// No value available
    Miss,
}

impl<V> ValueResult<V> {
    /// Construct a fresh hit.
    pub fn hit(value: V, created_at: SystemTime, soft_expires_at: SystemTime) -> Self {
        Self::Hit {
            value,
            created_at,
            soft_expires_at,
        }
    }

    /// Construct a stale result.
    pub fn stale(value: V, created_at: SystemTime, soft_expires_at: SystemTime) -> Self {
        Self::Stale {
            value,
            created_at,
            soft_expires_at,
        }
    }

    /// Construct a miss.
    pub fn miss() -> Self {
        Self::Miss
    }

    /// Whether this is a fresh hit.
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }

    /// Whether this is a stale result.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }

    /// Whether this is a miss.
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    /// Borrow the value.
    ///
    /// Fails with a typed access error on a miss.
    pub fn value(&self) -> Result<&V> {
        match self {
            Self::Hit { value, .. } | Self::Stale { value, .. } => Ok(value),
            Self::Miss => Err(AccessError::ValueOnMiss.into()),
        }
    }

    /// Consume the result and take the value.
    pub fn into_value(self) -> Result<V> {
        match self {
            Self::Hit { value, .. } | Self::Stale { value, .. } => Ok(value),
            Self::Miss => Err(AccessError::ValueOnMiss.into()),
        }
    }

    /// Creation timestamp, when a value is present.
    pub fn created_at(&self) -> Option<SystemTime> {
        match self {
            Self::Hit { created_at, .. } | Self::Stale { created_at, .. } => Some(*created_at),
            Self::Miss => None,
        }
    }

    /// Soft expiry timestamp, when a value is present.
    pub fn soft_expires_at(&self) -> Option<SystemTime> {
        match self {
            Self::Hit { soft_expires_at, .. } | Self::Stale { soft_expires_at, .. } => {
                Some(*soft_expires_at)
            }
            Self::Miss => None,
        }
    }
}
