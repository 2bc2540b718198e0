//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// A key segment (namespace, environment, schema version, resource) was empty
    #[error("Invalid key segment '{name}': {reason}")]
    InvalidKeySegment { name: String, reason: String },

    /// A negative cache entry was requested for a non-error status
    #[error("Status {0} is not an error status and cannot be negatively cached")]
    NotAnErrorStatus(u16),

    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl DomainError {
    /// Create an invalid key segment error
    pub fn invalid_segment(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKeySegment {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_segment_creates_correct_error() {
        let err = DomainError::invalid_segment("namespace", "must not be empty");
        match err {
            DomainError::InvalidKeySegment { name, reason } => {
                assert_eq!(name, "namespace");
                assert_eq!(reason, "must not be empty");
            },
            _ => unreachable!("Expected InvalidKeySegment error"),
        }
    }

    #[test]
    fn error_display_messages() {
        assert_eq!(
            DomainError::NotAnErrorStatus(200).to_string(),
            "Status 200 is not an error status and cannot be negatively cached"
        );
        assert_eq!(
            DomainError::ValidationError("bad".to_string()).to_string(),
            "Validation failed: bad"
        );
    }
}
