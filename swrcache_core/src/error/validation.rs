//! Validation related error types

use thiserror::Error;

/// Key construction and policy validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A key segment was empty or whitespace-only
    #[error("Invalid key segment '{segment}': must be non-empty after trimming")]
    EmptySegment { segment: String },

    /// A serialized key string could not be parsed back into components
    #[error("Malformed key string '{input}': {reason}")]
    MalformedKeyString { input: String, reason: String },

    /// A policy field was outside its allowed range
    #[error("Invalid policy field '{field}': {reason}")]
    PolicyOutOfRange { field: String, reason: String },

    /// A required builder field was never set
    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

impl ValidationError {
    /// Create an empty segment error
    pub fn empty_segment(segment: &str) -> Self {
        Self::EmptySegment {
            segment: segment.to_string(),
        }
    }

    /// Create a malformed key string error
    pub fn malformed_key_string(input: &str, reason: &str) -> Self {
        Self::MalformedKeyString {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a policy out of range error
    pub fn policy_out_of_range(field: &str, reason: &str) -> Self {
        Self::PolicyOutOfRange {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_segment_error() {
        let error = ValidationError::empty_segment("locale");
        assert!(error.to_string().contains("Invalid key segment"));
        assert!(error.to_string().contains("locale"));
    }

    #[test]
    fn test_malformed_key_string_error() {
        let error = ValidationError::malformed_key_string("only-one", "expected at least 3 segments");
        assert!(error.to_string().contains("Malformed key string"));
        assert!(error.to_string().contains("only-one"));
        assert!(error.to_string().contains("3 segments"));
    }

    #[test]
    fn test_policy_out_of_range_error() {
        let error = ValidationError::policy_out_of_range("soft_secs", "must not exceed hard_secs");
        assert!(error.to_string().contains("soft_secs"));
        assert!(error.to_string().contains("must not exceed"));
    }

    #[test]
    fn test_missing_field_error() {
        let error = ValidationError::missing_field("domain");
        assert!(error.to_string().contains("Missing required field"));
        assert!(error.to_string().contains("domain"));
    }
}
