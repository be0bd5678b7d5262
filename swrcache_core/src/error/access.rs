//! Result access error types

use thiserror::Error;

/// Errors raised by misuse of a read result
#[derive(Error, Debug)]
pub enum AccessError {
    /// `value()` was called on a miss result
    #[error("Cannot read the value of a cache miss")]
    ValueOnMiss,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_on_miss_display() {
        let error = AccessError::ValueOnMiss;
        assert!(error.to_string().contains("cache miss"));
    }
}
