//! Read and invalidation policies
//!
//! Policies are immutable records. `with_*` derivations return new records
//! and re-validate; originals are never mutated.

use crate::error::{Result, ValidationError};
use std::time::Duration;

/// How a refresh request is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Resolve and save inline, on the caller
    Sync,
    /// Enqueue on the event bus; a worker performs the sync refresh later
    Async,
}

/// Behavior when every recovery tier is exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    /// Compute without the cache and serve the caller (nothing is persisted)
    Open,
    /// Report a miss
    Closed,
}

/// Read-path policy: TTL windows plus refresh and failure behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetPolicy {
    hard_secs: u64,
    soft_secs: u64,
    refresh_mode: RefreshMode,
    fail_mode: FailMode,
}

impl GetPolicy {
    /// Create a policy.
    ///
    /// `hard_secs` must be at least 1 and `soft_secs` must lie in
    /// `[0, hard_secs]`.
    pub fn new(hard_secs: u64, soft_secs: u64) -> Result<Self> {
        if hard_secs < 1 {
            return Err(
                ValidationError::policy_out_of_range("hard_secs", "must be at least 1").into(),
            );
        }
        if soft_secs > hard_secs {
            return Err(ValidationError::policy_out_of_range(
                "soft_secs",
                "must not exceed hard_secs",
            )
            .into());
        }

        Ok(Self {
            hard_secs,
            soft_secs,
            refresh_mode: RefreshMode::Sync,
            fail_mode: FailMode::Open,
        })
    }

    /// Hard TTL in seconds.
    pub fn hard_secs(&self) -> u64 {
        self.hard_secs
    }

    /// Soft (precompute) window in seconds before hard expiry.
    pub fn soft_secs(&self) -> u64 {
        self.soft_secs
    }

    /// Hard TTL as a duration.
    pub fn hard_ttl(&self) -> Duration {
        Duration::from_secs(self.hard_secs)
    }

    /// Soft window as a duration.
    pub fn soft_window(&self) -> Duration {
        Duration::from_secs(self.soft_secs)
    }

    /// Refresh execution mode.
    pub fn refresh_mode(&self) -> RefreshMode {
        self.refresh_mode
    }

    /// Exhausted-recovery behavior.
    pub fn fail_mode(&self) -> FailMode {
        self.fail_mode
    }

    /// Derive a policy with a different hard TTL.
    pub fn with_hard_secs(self, hard_secs: u64) -> Result<Self> {
        let mut derived = Self::new(hard_secs, self.soft_secs)?;
        derived.refresh_mode = self.refresh_mode;
        derived.fail_mode = self.fail_mode;
        Ok(derived)
    }

    /// Derive a policy with a different soft window.
    pub fn with_soft_secs(self, soft_secs: u64) -> Result<Self> {
        let mut derived = Self::new(self.hard_secs, soft_secs)?;
        derived.refresh_mode = self.refresh_mode;
        derived.fail_mode = self.fail_mode;
        Ok(derived)
    }

    /// Derive a policy with a different refresh mode.
    pub fn with_refresh_mode(mut self, refresh_mode: RefreshMode) -> Self {
        self.refresh_mode = refresh_mode;
        self
    }

    /// Derive a policy with a different fail mode.
    pub fn with_fail_mode(mut self, fail_mode: FailMode) -> Self {
        self.fail_mode = fail_mode;
        self
    }
}

impl Default for GetPolicy {
    /// One hour hard TTL with a one minute precompute window, fail-open.
    fn default() -> Self {
        Self {
            hard_secs: 3600,
            soft_secs: 60,
            refresh_mode: RefreshMode::Sync,
            fail_mode: FailMode::Open,
        }
    }
}

/// Invalidation execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidateMode {
    /// Delete on the caller
    DeleteSync,
    /// Enqueue a delete on the event bus
    DeleteAsync,
    /// Recompute and save on the caller
    RefreshSync,
    /// Enqueue a refresh on the event bus
    RefreshAsync,
    /// Engine default (synchronous delete)
    Default,
}

/// Invalidation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidatePolicy {
    mode: InvalidateMode,
    cascade_namespaces: bool,
}

impl InvalidatePolicy {
    /// Create a policy with the given mode, no namespace cascade.
    pub fn new(mode: InvalidateMode) -> Self {
        Self {
            mode,
            cascade_namespaces: false,
        }
    }

    /// Execution mode.
    pub fn mode(&self) -> InvalidateMode {
        self.mode
    }

    /// Whether invalidation widens to the domain/facet subtree, covering
    /// every schema version and locale partition under it.
    pub fn cascade_namespaces(&self) -> bool {
        self.cascade_namespaces
    }

    /// Derive a policy with a different mode.
    pub fn with_mode(mut self, mode: InvalidateMode) -> Self {
        self.mode = mode;
        self
    }

    /// Derive a policy with namespace cascading toggled.
    pub fn with_cascade_namespaces(mut self, cascade: bool) -> Self {
        self.cascade_namespaces = cascade;
        self
    }
}

impl Default for InvalidatePolicy {
    fn default() -> Self {
        Self::new(InvalidateMode::Default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_policy() {
        let policy = GetPolicy::new(600, 60).unwrap();
        assert_eq!(policy.hard_secs(), 600);
        assert_eq!(policy.soft_secs(), 60);
        assert_eq!(policy.refresh_mode(), RefreshMode::Sync);
        assert_eq!(policy.fail_mode(), FailMode::Open);
    }

    #[test]
    fn test_zero_hard_ttl_rejected() {
        assert!(GetPolicy::new(0, 0).is_err());
    }

    #[test]
    fn test_soft_exceeding_hard_rejected() {
        assert!(GetPolicy::new(60, 61).is_err());
        assert!(GetPolicy::new(60, 60).is_ok());
        assert!(GetPolicy::new(60, 0).is_ok());
    }

    #[test]
    fn test_with_derivations_do_not_mutate_original() {
        let original = GetPolicy::new(600, 60).unwrap();
        let derived = original.with_fail_mode(FailMode::Closed);
        assert_eq!(original.fail_mode(), FailMode::Open);
        assert_eq!(derived.fail_mode(), FailMode::Closed);

        let derived = original.with_soft_secs(120).unwrap();
        assert_eq!(original.soft_secs(), 60);
        assert_eq!(derived.soft_secs(), 120);
        assert_eq!(derived.fail_mode(), FailMode::Open);
    }

    #[test]
    fn test_with_hard_secs_revalidates() {
        let policy = GetPolicy::new(600, 300).unwrap();
        assert!(policy.with_hard_secs(100).is_err());
        assert!(policy.with_hard_secs(300).is_ok());
    }

    #[test]
    fn test_durations() {
        let policy = GetPolicy::new(600, 60).unwrap();
        assert_eq!(policy.hard_ttl(), Duration::from_secs(600));
        assert_eq!(policy.soft_window(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalidate_policy_defaults() {
        let policy = InvalidatePolicy::default();
        assert_eq!(policy.mode(), InvalidateMode::Default);
        assert!(!policy.cascade_namespaces());
    }

    #[test]
    fn test_invalidate_policy_derivations() {
        let original = InvalidatePolicy::default();
        let derived = original
            .with_mode(InvalidateMode::RefreshAsync)
            .with_cascade_namespaces(true);
        assert_eq!(original.mode(), InvalidateMode::Default);
        assert_eq!(derived.mode(), InvalidateMode::RefreshAsync);
        assert!(derived.cascade_namespaces());
    }
}
