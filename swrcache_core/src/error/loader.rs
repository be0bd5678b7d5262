//! Loader error types

use thiserror::Error;

/// Errors raised while resolving source data for a key
///
/// The read pipeline converts these into `Miss` results tagged with a
/// `loader_failed` cause; they surface as errors only from the explicit
/// write-path operations (`refresh` with SYNC mode).
#[derive(Error, Debug)]
pub enum LoaderError {
    /// The application loader raised while resolving a key
    #[error("Loader failed for key '{key}': {message}")]
    Failed { key: String, message: String },
}

impl LoaderError {
    /// Create a loader failure error
    pub fn failed(key: &str, message: impl Into<String>) -> Self {
        Self::Failed {
            key: key.to_string(),
            message: message.into(),
        }
    }
}
