//! Error types for the swrcache core
//!
//! This module contains all error types used throughout the library, organized
//! into logical categories for better maintainability and clarity.

use thiserror::Error;

pub mod access;
pub mod loader;
pub mod store;
pub mod validation;

pub use self::access::AccessError;
pub use self::loader::LoaderError;
pub use self::store::StoreError;
pub use self::validation::ValidationError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the swrcache core
///
/// Errors are categorized into four main types:
/// - Validation errors: key construction and policy range checks
/// - Access errors: misuse of read results (value on a miss)
/// - Store errors: failures of the remote key-value store
/// - Loader errors: failures of the application-supplied loader
///
/// Only `Validation` and `Access` errors escape the read pipeline to
/// callers; store and loader conditions are absorbed into `Miss` results
/// with metrics and structured logs.
#[derive(Error, Debug)]
pub enum Error {
    /// Key construction and policy validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Result access errors
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Remote store errors
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Loader resolution errors
    #[error(transparent)]
    Loader(#[from] LoaderError),
}

impl Error {
    /// Whether this error may be returned from `get` to the caller.
    ///
    /// Store and loader failures are converted by the engine into `Miss`
    /// results and never cross the public read surface.
    pub fn is_caller_visible(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Access(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::Store(StoreError::codec(source.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_validation_error_wrapping() {
        let error = Error::Validation(ValidationError::empty_segment("domain"));

        match error {
            Error::Validation(ValidationError::EmptySegment { segment }) => {
                assert_eq!(segment, "domain");
            }
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn test_store_error_wrapping() {
        let error = Error::Store(StoreError::unavailable("connection refused"));

        assert!(matches!(error, Error::Store(StoreError::Unavailable { .. })));
        assert!(error.to_string().contains("connection refused"));
    }

    #[test]
    fn test_caller_visibility() {
        assert!(Error::Validation(ValidationError::empty_segment("facet")).is_caller_visible());
        assert!(Error::Access(AccessError::ValueOnMiss).is_caller_visible());
        assert!(!Error::Store(StoreError::unavailable("down")).is_caller_visible());
        assert!(!Error::Loader(LoaderError::failed("a/b/1", "boom")).is_caller_visible());
    }

    #[test]
    fn test_error_display() {
        let error = Error::Access(AccessError::ValueOnMiss);
        assert!(error.to_string().contains("miss"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_error_trait_implementation() {
        let error = Error::Store(StoreError::lock_timeout("a/b/1"));
        let _: &dyn StdError = &error;
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_error() -> Result<()> {
            Err(Error::Access(AccessError::ValueOnMiss))
        }

        assert!(returns_error().is_err());
    }
}
